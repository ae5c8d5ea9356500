//! Transfers over a real socket: client disconnects and failing tools.

use std::time::Duration;

use serve_archive::process::JobState;
use serve_archive::transmit::CHUNK_SIZE;
use serve_archive::{routes, ServerConfig, ServerState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::SpyLauncher;

const REQUEST: &[u8] = b"GET /archive/abc123/ HTTP/1.1\r\nHost: localhost\r\n\r\n";

async fn serve(state: ServerState) -> std::net::SocketAddr {
    let (addr, server) = warp::serve(routes(state)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

#[tokio::test]
async fn client_disconnect_kills_process() {
    let root = common::archive_root("abc123", b"");
    let (spy, mut terminations) = SpyLauncher::shell("exec cat /dev/zero");
    let addr = serve(ServerState::new(ServerConfig::new(root.path()), spy.clone())).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(REQUEST).await.unwrap();

    let mut buf = vec![0u8; 64 * 1024];
    let mut head = Vec::new();
    let mut received = 0;
    while received < 2 * CHUNK_SIZE {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "server closed the stream early");
        if head.is_empty() {
            head.extend_from_slice(&buf[..n]);
        }
        received += n;
    }
    assert!(head.starts_with(b"HTTP/1.1 200"));
    drop(stream);

    let state = tokio::time::timeout(Duration::from_secs(10), terminations.recv())
        .await
        .expect("process was not terminated in time");
    assert_eq!(state, Some(JobState::Killed));
    assert_eq!(spy.starts(), 1);
}

#[tokio::test]
async fn failing_tool_aborts_the_response() {
    let root = common::archive_root("abc123", b"");
    let (spy, mut terminations) = SpyLauncher::shell("head -c 300000 /dev/zero; exit 4");
    let addr = serve(ServerState::new(ServerConfig::new(root.path()), spy)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(REQUEST).await.unwrap();

    let mut response = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut response))
        .await
        .expect("connection was not closed");
    // A reset is an acceptable way to abort
    let _ = read;

    assert!(response.starts_with(b"HTTP/1.1 200"));
    assert!(
        !response.ends_with(b"0\r\n\r\n"),
        "a failed archive must not end like a complete one"
    );
    assert_eq!(terminations.recv().await, Some(JobState::Failed));
}

#[tokio::test]
async fn completed_transfer_ends_cleanly() {
    let payload = vec![7u8; CHUNK_SIZE + 5];
    let root = common::archive_root("abc123", &payload);
    let (spy, mut terminations) = SpyLauncher::shell("exec cat payload.bin");
    let addr = serve(ServerState::new(ServerConfig::new(root.path()), spy)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /archive/abc123/ HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut response))
        .await
        .expect("connection was not closed")
        .unwrap();

    assert!(response.starts_with(b"HTTP/1.1 200"));
    assert!(response.ends_with(b"0\r\n\r\n"));
    assert_eq!(terminations.recv().await, Some(JobState::Completed));
}
