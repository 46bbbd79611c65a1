use serde::{Deserialize, Serialize};
use tempfile::tempdir;

use crate::client::UnixSockClient;

use super::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Echo {
    value: u32,
}

#[tokio::test]
async fn round_trips_a_request_through_a_real_socket() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("echo.sock");

    let server = UnixSocketServer::bind(&path).unwrap();
    let token = server.shutdown_token();
    let serve_path = path.clone();
    let serve_task = tokio::spawn(async move {
        server
            .serve(|req: Echo| async move { Echo { value: req.value * 2 } })
            .await
            .unwrap();
    });

    // Give the listener a moment to bind before the client dials in.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let mut client = UnixSockClient::connect(&serve_path, 5, std::time::Duration::from_millis(50)).await.unwrap();
    let resp: Echo = client.request(&Echo { value: 21 }, None).await.unwrap();
    assert_eq!(resp, Echo { value: 42 });

    token.cancel();
    serve_task.await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn bind_unlinks_a_stale_socket_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stale.sock");
    std::fs::write(&path, b"not a socket").unwrap();

    let server = UnixSocketServer::bind(&path).unwrap();
    assert_eq!(server.path(), path);
}
