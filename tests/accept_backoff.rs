//! Accept loop behaviour when the process runs out of file descriptors.
//!
//! Lowers `RLIMIT_NOFILE` for the whole process, so it lives in its own test
//! binary with a single test.
#![cfg(target_os = "linux")]

mod common;

use std::fs::{self, File};
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn fd_limit() -> libc::rlimit {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    assert_eq!(rc, 0, "getrlimit failed");
    limit
}

fn set_fd_limit(limit: &libc::rlimit) {
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, limit) };
    assert_eq!(rc, 0, "setrlimit failed");
}

#[tokio::test]
async fn accept_recovers_after_descriptor_exhaustion() {
    let app = Router::new().route("/", get(|| async { "ok" }));
    let running = common::start(app, Duration::from_secs(5)).await;

    let original = fd_limit();
    let open_now = fs::read_dir("/proc/self/fd").unwrap().count() as libc::rlim_t;
    set_fd_limit(&libc::rlimit {
        rlim_cur: open_now + 32,
        rlim_max: original.rlim_max,
    });

    let mut hogs = Vec::new();
    let exhausted = loop {
        match File::open("/dev/null") {
            Ok(file) => hogs.push(file),
            Err(e) => break e,
        }
    };
    assert_eq!(exhausted.raw_os_error(), Some(libc::EMFILE));

    // One descriptor for the client; the server's accept has none left.
    hogs.pop();
    let mut client = TcpStream::connect(running.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!running.task.is_finished(), "accept loop gave up under EMFILE");

    drop(hogs);
    set_fd_limit(&original);

    client
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_string(&mut response))
        .await
        .expect("response after descriptors were freed")
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("ok"), "{response}");

    let (_, result) = running.stop().await;
    result.unwrap();
}
