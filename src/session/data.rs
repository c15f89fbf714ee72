//! Data session: DATA requests answered with telemetry snapshots
//!
//! Blocks on its socket with no deadline. Each DATA request reads the IR
//! array and the odometry delta since the previous DATA request; INIT and
//! CTRL on this port are dropped.

use super::{SessionConfig, SessionRole, is_interrupted, is_spurious_reset, process, send_reply};
use crate::error::{Error, Result};
use crate::gateway::RobotGateway;
use crate::protocol::MAX_DATAGRAM_SIZE;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

/// Telemetry listener
pub struct DataSession {
    socket: UdpSocket,
    config: SessionConfig,
    gateway: Arc<dyn RobotGateway>,
    last_peer: Option<SocketAddr>,
}

impl DataSession {
    pub fn new(socket: UdpSocket, config: SessionConfig, gateway: Arc<dyn RobotGateway>) -> Self {
        Self {
            socket,
            config,
            gateway,
            last_peer: None,
        }
    }

    /// Run the receive/dispatch/reply loop
    ///
    /// Only returns on a transport failure.
    pub fn run(&mut self) -> Result<()> {
        self.socket
            .set_read_timeout(None)
            .map_err(|source| Error::Transport {
                session: SessionRole::Data.name(),
                source,
            })?;
        log::info!("Data session listening on {}", self.socket.local_addr()?);

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            log::debug!("Waiting for a data request on port {}", self.config.port);
            match self.socket.recv_from(&mut buffer) {
                Ok((len, peer)) => {
                    if let Some(reply) = self.handle_datagram(&buffer[..len], peer) {
                        send_reply(&self.socket, SessionRole::Data, &self.config, &reply, peer)?;
                    }
                }
                Err(ref e) if is_interrupted(e) => continue,
                Err(ref e) if is_spurious_reset(e) => {
                    log::debug!("Ignoring connection reset on data socket: {}", e);
                }
                Err(source) => {
                    log::error!("Data session receive failed: {}", source);
                    return Err(Error::Transport {
                        session: SessionRole::Data.name(),
                        source,
                    });
                }
            }
        }
    }

    /// Handle one datagram, returning the reply to send (if any)
    pub fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) -> Option<Vec<u8>> {
        if self.last_peer != Some(peer) {
            log::debug!("Data client now {}", peer);
            self.last_peer = Some(peer);
        }
        process(
            SessionRole::Data,
            &self.config,
            self.gateway.as_ref(),
            datagram,
            peer,
        )
    }
}
