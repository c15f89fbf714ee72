//! Service supervisor: starts both session loops once and watches them
//!
//! # Thread Model
//!
//! ```text
//! ┌─────────────────┐ spawns ┌─────────────────┐
//! │   Main Thread   │───────▶│  udp-control    │──┐
//! │  (wait events)  │        └─────────────────┘  │ SessionExited
//! │                 │ spawns ┌─────────────────┐  ├──────────────┐
//! │                 │───────▶│  udp-data       │──┘              │
//! └────────▲────────┘        └─────────────────┘                 │
//!          │          Shutdown (signal handler)                  │
//!          └─────────────────────────────────────────────────────┘
//! ```
//!
//! Loops are never respawned. Either loop exiting is fatal: the supervisor
//! stops the wheels and returns the loop's error. A shutdown event stops the
//! wheels and returns `Ok`.

use crate::config::{Config, NetworkConfig, Verbosity};
use crate::error::{Error, Result};
use crate::gateway::RobotGateway;
use crate::session::{self, ControlSession, DataSession, SessionConfig, SessionRole};
use crossbeam_channel::{Receiver, Sender};
use std::net::{SocketAddr, UdpSocket};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Events delivered to the supervising thread
#[derive(Debug)]
pub enum ServiceEvent {
    /// Process termination requested
    Shutdown,
    /// A session loop returned or panicked
    SessionExited {
        session: &'static str,
        result: Result<()>,
    },
}

/// Cloneable handle that asks a running service to shut down
#[derive(Clone)]
pub struct ShutdownTrigger {
    events: Sender<ServiceEvent>,
}

impl ShutdownTrigger {
    pub fn fire(&self) {
        // Receiver gone means the service already finished
        let _ = self.events.send(ServiceEvent::Shutdown);
    }
}

/// Builds session configuration and owns the gateway handle
pub struct Supervisor {
    network: NetworkConfig,
    verbosity: Verbosity,
    gateway: Arc<dyn RobotGateway>,
    events_tx: Sender<ServiceEvent>,
    events_rx: Receiver<ServiceEvent>,
}

impl Supervisor {
    /// Validate the configuration and prepare to start
    pub fn new(config: &Config, gateway: Arc<dyn RobotGateway>) -> Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            network: config.network.clone(),
            verbosity: config.logging.verbosity,
            gateway,
            events_tx,
            events_rx,
        })
    }

    /// Shutdown handle usable before the loops start
    ///
    /// A shutdown fired early is delivered once the service is waited on.
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            events: self.events_tx.clone(),
        }
    }

    /// Bind the configured ports and start the session loops
    pub fn start(self) -> Result<RunningService> {
        let ip = self.network.bind_address;
        let control = session::bind(ip, self.network.control_port)?;
        let data = if self.network.shared_port() {
            None
        } else {
            Some(session::bind(ip, self.network.data_port)?)
        };
        self.start_with_sockets(control, data)
    }

    /// Start the session loops on already bound sockets
    ///
    /// Passing no data socket selects shared-port mode: the control session
    /// also serves DATA requests.
    pub fn start_with_sockets(
        self,
        control: UdpSocket,
        data: Option<UdpSocket>,
    ) -> Result<RunningService> {
        let control_addr = control.local_addr()?;
        let data_addr = match &data {
            Some(socket) => socket.local_addr()?,
            None => control_addr,
        };

        self.gateway.zero_position_counters()?;
        log::info!("Wheel position counters zeroed");

        let events_tx = self.events_tx;
        let timeout = self.network.control_timeout();

        let control_role = if data.is_some() {
            SessionRole::Control
        } else {
            SessionRole::Combined
        };
        let mut control_session = ControlSession::new(
            control,
            SessionConfig::new(control_addr.port(), timeout, self.verbosity),
            control_role,
            Arc::clone(&self.gateway),
        );
        spawn_session("udp-control", "control", events_tx.clone(), move || {
            control_session.run()
        })?;

        if let Some(data) = data {
            let mut data_session = DataSession::new(
                data,
                SessionConfig::new(data_addr.port(), None, self.verbosity),
                Arc::clone(&self.gateway),
            );
            spawn_session("udp-data", "data", events_tx.clone(), move || {
                data_session.run()
            })?;
            log::info!(
                "✓ Control on {}, data on {}",
                control_addr,
                data_addr
            );
        } else {
            log::info!("✓ Control and data sharing {}", control_addr);
        }

        Ok(RunningService {
            control_addr,
            data_addr,
            gateway: self.gateway,
            events: self.events_rx,
            events_tx,
        })
    }
}

/// Spawn a named session thread that reports its exit
fn spawn_session<F>(
    thread_name: &str,
    session: &'static str,
    events: Sender<ServiceEvent>,
    body: F,
) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(body)) {
                Ok(result) => result,
                Err(_) => Err(Error::Other(format!("{} session panicked", session))),
            };
            let _ = events.send(ServiceEvent::SessionExited { session, result });
        })
        .map_err(|e| Error::Other(format!("Failed to spawn {} session: {}", session, e)))?;
    Ok(())
}

/// Handle to the started service
pub struct RunningService {
    control_addr: SocketAddr,
    data_addr: SocketAddr,
    gateway: Arc<dyn RobotGateway>,
    events: Receiver<ServiceEvent>,
    events_tx: Sender<ServiceEvent>,
}

impl RunningService {
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Equal to [`Self::control_addr`] in shared-port mode
    pub fn data_addr(&self) -> SocketAddr {
        self.data_addr
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            events: self.events_tx.clone(),
        }
    }

    /// Block until shutdown or a session failure
    ///
    /// Issues a best-effort final stop either way.
    pub fn wait(self) -> Result<()> {
        let outcome = match self.events.recv() {
            Ok(ServiceEvent::Shutdown) => {
                log::info!("Shutting down...");
                Ok(())
            }
            Ok(ServiceEvent::SessionExited { session, result }) => {
                let error = match result {
                    Ok(()) => Error::SessionExited(session),
                    Err(e) => e,
                };
                log::error!("{} session terminated: {}", session, error);
                Err(error)
            }
            Err(_) => Err(Error::Other("supervisor event channel closed".to_string())),
        };

        match self.gateway.stop() {
            Ok(()) => log::info!("Final stop issued"),
            Err(e) => log::error!("Final stop failed: {}", e),
        }
        outcome
    }
}
