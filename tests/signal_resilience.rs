//! Sessions keep serving after a signal interrupts their blocking receive
//!
//! Linux reports EINTR from a receive with `SO_RCVTIMEO` set even when the
//! handler was installed with `SA_RESTART`.

#![cfg(target_os = "linux")]

mod common;

use common::{Call, Client, RecordingGateway, loopback};
use k3driver::config::Verbosity;
use k3driver::session::{ControlSession, DataSession, SessionConfig, SessionRole};
use std::os::unix::thread::JoinHandleExt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const IR: [i32; 11] = [0; 11];

extern "C" fn ignore_signal(_: libc::c_int) {}

fn install_restarting_handler() {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = ignore_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        assert_eq!(
            libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()),
            0
        );
    }
}

fn interrupt<T>(handle: &JoinHandle<T>) {
    // Let the session reach its receive first
    thread::sleep(Duration::from_millis(100));
    for _ in 0..3 {
        let target = handle.as_pthread_t() as libc::pthread_t;
        let rc = unsafe { libc::pthread_kill(target, libc::SIGUSR1) };
        assert_eq!(rc, 0);
        thread::sleep(Duration::from_millis(20));
    }
    thread::sleep(Duration::from_millis(100));
}

#[test]
fn control_session_survives_interrupted_receive() {
    install_restarting_handler();
    let gateway = Arc::new(RecordingGateway::new(IR, (0, 0)));
    let socket = loopback();
    let server = socket.local_addr().unwrap();
    let config = SessionConfig::new(
        server.port(),
        Some(Duration::from_secs(10)),
        Verbosity::default(),
    );
    let mut session = ControlSession::new(socket, config, SessionRole::Control, gateway.clone());
    let handle = thread::spawn(move || session.run());

    interrupt(&handle);
    assert!(!handle.is_finished(), "control session exited on a signal");

    let client = Client::new(Duration::from_secs(2));
    let reply = client.request(server, "$K3DRV,REQ,CTRL,7,-7");
    assert_eq!(reply.as_deref(), Some("$K3DRV,CTRL,RES"));
    assert_eq!(gateway.count(Call::SetSpeeds(7, -7)), 1);
    // The deadline is 10 s, so no failsafe stop has fired
    assert_eq!(gateway.count(Call::SetSpeeds(0, 0)), 0);
}

#[test]
fn data_session_survives_interrupted_receive() {
    install_restarting_handler();
    let gateway = Arc::new(RecordingGateway::new(IR, (4, 5)));
    let socket = loopback();
    let server = socket.local_addr().unwrap();
    let config = SessionConfig::new(server.port(), None, Verbosity::default());
    let mut session = DataSession::new(socket, config, gateway);
    let handle = thread::spawn(move || session.run());

    interrupt(&handle);
    assert!(!handle.is_finished(), "data session exited on a signal");

    let client = Client::new(Duration::from_secs(2));
    let reply = client.request(server, "$K3DRV,REQ,DATA");
    assert_eq!(
        reply.as_deref(),
        Some("$K3DRV,RES,DATA,IR,11,0,0,0,0,0,0,0,0,0,0,0,ENC,2,4,5")
    );
}
