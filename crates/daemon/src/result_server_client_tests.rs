use tempfile::tempdir;
use warden_core::test_support::analysis_id;
use warden_wire::{ResultServerResponse, UnixSocketServer};

use super::*;

fn task_id() -> TaskId {
    TaskId::new(&analysis_id("m"), 1)
}

#[tokio::test]
async fn add_returns_ok_when_the_server_reports_success() {
    let dir = tempdir().unwrap();
    let sock = dir.path().join("resultserver.sock");
    let server = UnixSocketServer::bind(&sock).unwrap();
    let shutdown = server.shutdown_token();

    let serving = tokio::spawn(server.serve(|_req: ResultServerRequest| async {
        ResultServerResponse { status: "ok".into(), reason: None }
    }));

    let handle = SocketResultServerHandle::new(&sock);
    handle.add("10.0.0.5", &task_id()).await.unwrap();

    shutdown.cancel();
    let _ = serving.await;
}

#[tokio::test]
async fn add_surfaces_a_rejection_as_an_error() {
    let dir = tempdir().unwrap();
    let sock = dir.path().join("resultserver.sock");
    let server = UnixSocketServer::bind(&sock).unwrap();
    let shutdown = server.shutdown_token();

    let serving = tokio::spawn(server.serve(|_req: ResultServerRequest| async {
        ResultServerResponse { status: "error".into(), reason: Some("port exhausted".into()) }
    }));

    let handle = SocketResultServerHandle::new(&sock);
    let err = handle.add("10.0.0.5", &task_id()).await.unwrap_err();
    assert!(err.to_string().contains("port exhausted"));

    shutdown.cancel();
    let _ = serving.await;
}

#[tokio::test]
async fn remove_never_panics_when_the_socket_is_unreachable() {
    let dir = tempdir().unwrap();
    let sock = dir.path().join("resultserver.sock");
    let handle = SocketResultServerHandle::new(&sock);
    handle.remove("10.0.0.5", &task_id()).await;
}
