//! Control session: INIT/CTRL requests with an idle-timeout failsafe
//!
//! # State Machine
//!
//! ```text
//!              datagram                 decode + dispatch
//!  Listening ───────────▶ Receiving ───────────────────────▶ Dispatching
//!     ▲  │                                                      │
//!     │  │ deadline expired                  reply or drop      │
//!     │  ▼                                                      │
//!  TimedOut ── stop wheels, clear deadline ──▶ Listening ◀──────┘
//! ```
//!
//! While armed the receive blocks for at most `control_timeout`; the deadline
//! restarts after every datagram, well-formed or not. On expiry the wheels
//! are stopped once and the receive becomes unbounded, so a stopped robot
//! does not spin on timeouts. The next datagram re-arms the deadline.
//!
//! A failed stop keeps the deadline armed so the stop is retried on the next
//! expiry.

use super::{
    SessionConfig, SessionRole, is_interrupted, is_spurious_reset, is_timeout, process,
    send_reply,
};
use crate::error::{Error, Result};
use crate::gateway::RobotGateway;
use crate::protocol::MAX_DATAGRAM_SIZE;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

/// How the next receive waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Fail over to a stop after this long
    Bounded(Duration),
    /// Block until the next datagram
    Unbounded,
}

impl Wait {
    fn read_timeout(self) -> Option<Duration> {
        match self {
            Wait::Bounded(timeout) => Some(timeout),
            Wait::Unbounded => None,
        }
    }
}

/// Control-channel listener
pub struct ControlSession {
    socket: UdpSocket,
    config: SessionConfig,
    role: SessionRole,
    gateway: Arc<dyn RobotGateway>,
    /// Deadline active; cleared by a successful failsafe stop
    armed: bool,
    /// Most recent sender, for logging
    last_peer: Option<SocketAddr>,
}

impl ControlSession {
    /// Create a control session on an already bound socket
    ///
    /// `role` is [`SessionRole::Control`], or [`SessionRole::Combined`] when
    /// data requests share this port.
    pub fn new(
        socket: UdpSocket,
        config: SessionConfig,
        role: SessionRole,
        gateway: Arc<dyn RobotGateway>,
    ) -> Self {
        Self {
            socket,
            config,
            role,
            gateway,
            armed: true,
            last_peer: None,
        }
    }

    /// Current receive mode
    pub fn wait(&self) -> Wait {
        match self.config.control_timeout {
            Some(timeout) if self.armed => Wait::Bounded(timeout),
            _ => Wait::Unbounded,
        }
    }

    /// Run the receive/dispatch/reply loop
    ///
    /// Only returns on a transport failure.
    pub fn run(&mut self) -> Result<()> {
        let local = self.socket.local_addr()?;
        log::info!(
            "Control session listening on {} ({}, timeout = {:?})",
            local,
            self.role.name(),
            self.config.control_timeout
        );

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let mut applied: Option<Wait> = None;

        loop {
            let wait = self.wait();
            if applied != Some(wait) {
                self.socket
                    .set_read_timeout(wait.read_timeout())
                    .map_err(|source| self.transport(source))?;
                applied = Some(wait);
            }
            log::debug!(
                "Waiting for a control request on port {} ({:?})",
                self.config.port,
                wait
            );

            match self.socket.recv_from(&mut buffer) {
                Ok((len, peer)) => {
                    if let Some(reply) = self.handle_datagram(&buffer[..len], peer) {
                        send_reply(&self.socket, self.role, &self.config, &reply, peer)?;
                    }
                }
                Err(ref e) if is_timeout(e) => self.on_timeout(),
                // Restarted receive waits a fresh full deadline
                Err(ref e) if is_interrupted(e) => continue,
                Err(ref e) if is_spurious_reset(e) => {
                    log::debug!("Ignoring connection reset on control socket: {}", e);
                }
                Err(source) => {
                    log::error!("Control session receive failed: {}", source);
                    return Err(self.transport(source));
                }
            }
        }
    }

    /// Handle one datagram, returning the reply to send (if any)
    ///
    /// Any datagram, even a malformed one, re-arms the deadline.
    pub fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        if !self.armed {
            self.armed = true;
            if let Some(timeout) = self.config.control_timeout {
                log::info!(
                    "Control traffic from {} resumed, failsafe deadline {:?} restored",
                    peer,
                    timeout
                );
            }
        }
        self.last_peer = Some(peer);
        process(
            self.role,
            &self.config,
            self.gateway.as_ref(),
            datagram,
            peer,
        )
    }

    /// Deadline expired with no datagram: failsafe stop
    pub fn on_timeout(&mut self) {
        if !self.armed {
            return;
        }
        match self.gateway.stop() {
            Ok(()) => {
                self.armed = false;
                log::warn!(
                    "No control request for {:?} (last peer: {}), wheels stopped",
                    self.config.control_timeout.unwrap_or_default(),
                    self.last_peer
                        .map_or_else(|| "none".to_string(), |p| p.to_string())
                );
            }
            Err(e) => {
                log::error!("Failsafe stop failed, will retry: {}", e);
            }
        }
    }

    fn transport(&self, source: std::io::Error) -> Error {
        Error::Transport {
            session: self.role.name(),
            source,
        }
    }
}
