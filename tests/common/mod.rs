//! Shared helpers for loopback UDP tests

#![allow(dead_code)]

use k3driver::Result;
use k3driver::gateway::RobotGateway;
use k3driver::protocol::IR_CHANNELS;
use parking_lot::Mutex;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// Gateway call as seen by the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    SetSpeeds(i32, i32),
    Zero,
    ReadIr,
    ReadOdometry,
}

/// Gateway that records every call
pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    ir: [i32; IR_CHANNELS],
    odometry: (i32, i32),
}

impl RecordingGateway {
    pub fn new(ir: [i32; IR_CHANNELS], odometry: (i32, i32)) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            ir,
            odometry,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl RobotGateway for RecordingGateway {
    fn set_wheel_speeds(&self, right: i32, left: i32) -> Result<()> {
        self.record(Call::SetSpeeds(right, left));
        Ok(())
    }

    fn zero_position_counters(&self) -> Result<()> {
        self.record(Call::Zero);
        Ok(())
    }

    fn read_infrared(&self) -> Result<[i32; IR_CHANNELS]> {
        self.record(Call::ReadIr);
        Ok(self.ir)
    }

    fn read_odometry_delta(&self) -> Result<(i32, i32)> {
        self.record(Call::ReadOdometry);
        Ok(self.odometry)
    }
}

pub fn loopback() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").unwrap()
}

/// Test client with a bounded reply wait
pub struct Client {
    socket: UdpSocket,
}

impl Client {
    pub fn new(reply_timeout: Duration) -> Self {
        let socket = loopback();
        socket.set_read_timeout(Some(reply_timeout)).unwrap();
        Self { socket }
    }

    /// Send a datagram and return the reply, or `None` on silence
    pub fn request(&self, server: SocketAddr, datagram: &str) -> Option<String> {
        self.socket.send_to(datagram.as_bytes(), server).unwrap();
        let mut buf = [0u8; 512];
        match self.socket.recv_from(&mut buf) {
            Ok((len, _)) => Some(String::from_utf8(buf[..len].to_vec()).unwrap()),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                None
            }
            Err(e) => panic!("client receive failed: {}", e),
        }
    }
}
