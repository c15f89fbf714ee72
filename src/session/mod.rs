//! UDP session loops
//!
//! One long-lived loop per port, each owning its socket for the lifetime of
//! the process:
//!
//! ```text
//!            ┌────────────────────┐        ┌────────────────────┐
//!  :4555 ──▶ │ ControlSession     │        │ DataSession        │ ◀── :4556
//!            │ INIT, CTRL         │        │ DATA               │
//!            │ idle-timeout stop  │        │ no timeout         │
//!            └─────────┬──────────┘        └─────────┬──────────┘
//!                      │      Arc<dyn RobotGateway>  │
//!                      └──────────────┬──────────────┘
//!                                     ▼
//!                              robot / simulator
//! ```
//!
//! Within a loop every datagram goes receive → decode → dispatch → reply (or
//! drop) before the next receive. Requests that fail to decode, arrive on the
//! wrong channel, or fail at the gateway are logged and never answered.

pub mod control;
pub mod data;

use crate::config::Verbosity;
use crate::error::{Error, Result};
use crate::gateway::RobotGateway;
use crate::protocol::{self, Request, Response};
use log::Level;
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;

pub use control::ControlSession;
pub use data::DataSession;

/// Immutable per-listener settings, fixed before the session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub port: u16,
    /// Failsafe deadline; only the control session uses it
    pub control_timeout: Option<Duration>,
    pub verbosity: Verbosity,
}

impl SessionConfig {
    /// A zero timeout is treated as "no deadline"
    pub fn new(port: u16, control_timeout: Option<Duration>, verbosity: Verbosity) -> Self {
        Self {
            port,
            control_timeout: control_timeout.filter(|t| !t.is_zero()),
            verbosity,
        }
    }

    /// Level used for per-datagram traffic logs
    fn traffic_level(&self) -> Level {
        if self.verbosity.logs_traffic() {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

/// Which requests a session serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// INIT and CTRL
    Control,
    /// DATA
    Data,
    /// All three on one shared port
    Combined,
}

impl SessionRole {
    pub fn name(self) -> &'static str {
        match self {
            SessionRole::Control => "control",
            SessionRole::Data => "data",
            SessionRole::Combined => "combined",
        }
    }

    pub fn accepts(self, request: &Request) -> bool {
        match self {
            SessionRole::Control => matches!(request, Request::Init | Request::Ctrl { .. }),
            SessionRole::Data => matches!(request, Request::Data),
            SessionRole::Combined => true,
        }
    }
}

/// Bind a session socket
pub fn bind(ip: IpAddr, port: u16) -> Result<UdpSocket> {
    let addr = SocketAddr::new(ip, port);
    UdpSocket::bind(addr).map_err(|source| Error::Bind { addr, source })
}

/// Receive deadline expired (platforms differ on the error kind)
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// A signal handler ran during the receive; nothing was received
fn is_interrupted(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::Interrupted
}

/// ICMP port-unreachable echoed back on some platforms; not a socket failure
fn is_spurious_reset(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::ConnectionReset)
}

/// Decode and role-check one datagram
fn decode_for(role: SessionRole, datagram: &[u8]) -> Option<Request> {
    let request = match protocol::decode(datagram) {
        Ok(request) => request,
        Err(e) => {
            log::warn!(
                "{} session: dropping {:?}: {}",
                role.name(),
                String::from_utf8_lossy(datagram),
                e
            );
            return None;
        }
    };

    if !role.accepts(&request) {
        let e = protocol::ParseError::UnknownRequestType(request.keyword().to_string());
        log::warn!("{} session: dropping request: {}", role.name(), e);
        return None;
    }

    Some(request)
}

/// Run a request against the gateway
fn dispatch(gateway: &dyn RobotGateway, request: Request) -> Result<Response> {
    match request {
        Request::Init => {
            gateway.zero_position_counters()?;
            Ok(Response::InitAck)
        }
        Request::Ctrl {
            right_speed,
            left_speed,
        } => {
            log::debug!(
                "Sending motor control (right, left): ({}, {})",
                right_speed,
                left_speed
            );
            gateway.set_wheel_speeds(right_speed, left_speed)?;
            Ok(Response::CtrlAck)
        }
        Request::Data => {
            let ir = gateway.read_infrared()?;
            let (encoder_right, encoder_left) = gateway.read_odometry_delta()?;
            Ok(Response::DataSnapshot {
                ir,
                encoder_right,
                encoder_left,
            })
        }
    }
}

/// Full datagram → optional reply bytes cycle shared by both sessions
fn process(
    role: SessionRole,
    config: &SessionConfig,
    gateway: &dyn RobotGateway,
    datagram: &[u8],
    peer: SocketAddr,
) -> Option<Vec<u8>> {
    log::log!(
        config.traffic_level(),
        "Handling {} request from {}: {:?}",
        role.name(),
        peer,
        String::from_utf8_lossy(datagram)
    );

    let request = decode_for(role, datagram)?;
    match dispatch(gateway, request) {
        Ok(response) => Some(protocol::encode(&response)),
        Err(e) => {
            log::error!(
                "{} session: {} from {} failed: {}",
                role.name(),
                request.keyword(),
                peer,
                e
            );
            None
        }
    }
}

/// Send a reply; any failure is a transport error
fn send_reply(
    socket: &UdpSocket,
    role: SessionRole,
    config: &SessionConfig,
    reply: &[u8],
    peer: SocketAddr,
) -> Result<()> {
    log::log!(
        config.traffic_level(),
        "Sending reply to {}: {}",
        peer,
        String::from_utf8_lossy(reply)
    );
    let sent = socket.send_to(reply, peer).map_err(|source| Error::Transport {
        session: role.name(),
        source,
    })?;
    if sent != reply.len() {
        return Err(Error::Transport {
            session: role.name(),
            source: io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} of {} reply bytes", sent, reply.len()),
            ),
        });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_zero_timeout_is_unbounded() {
        let config = SessionConfig::new(4555, Some(Duration::ZERO), Verbosity::default());
        assert_eq!(config.control_timeout, None);
    }

    #[test]
    fn test_roles() {
        let ctrl = Request::Ctrl {
            right_speed: 1,
            left_speed: 1,
        };
        assert!(SessionRole::Control.accepts(&Request::Init));
        assert!(SessionRole::Control.accepts(&ctrl));
        assert!(!SessionRole::Control.accepts(&Request::Data));
        assert!(SessionRole::Data.accepts(&Request::Data));
        assert!(!SessionRole::Data.accepts(&Request::Init));
        assert!(!SessionRole::Data.accepts(&ctrl));
        assert!(SessionRole::Combined.accepts(&Request::Data));
        assert!(SessionRole::Combined.accepts(&ctrl));
    }

    #[test]
    fn test_receive_error_classes() {
        let interrupted = io::Error::from(io::ErrorKind::Interrupted);
        assert!(is_interrupted(&interrupted));
        assert!(!is_timeout(&interrupted));
        assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_interrupted(&io::Error::from(io::ErrorKind::ConnectionRefused)));
    }

    #[test]
    fn test_bind_reports_address() {
        let taken = test_support::loopback();
        let port = taken.local_addr().unwrap().port();
        let err = bind("127.0.0.1".parse().unwrap(), port).unwrap_err();
        assert!(matches!(err, Error::Bind { addr, .. } if addr.port() == port));
    }
}
