use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::*;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Ping {
    id: u32,
}

#[tokio::test]
async fn round_trips_a_single_message() {
    let mut buf = Vec::new();
    write_json_message(&mut buf, &Ping { id: 7 }).await.unwrap();
    assert_eq!(buf, b"{\"id\":7}\n");

    let mut reader = Cursor::new(buf);
    let msg: Ping = read_json_message(&mut reader).await.unwrap().unwrap();
    assert_eq!(msg, Ping { id: 7 });
}

#[tokio::test]
async fn reads_multiple_frames_sequentially() {
    let mut buf = Vec::new();
    write_json_message(&mut buf, &Ping { id: 1 }).await.unwrap();
    write_json_message(&mut buf, &Ping { id: 2 }).await.unwrap();

    let mut reader = Cursor::new(buf);
    let a: Ping = read_json_message(&mut reader).await.unwrap().unwrap();
    let b: Ping = read_json_message(&mut reader).await.unwrap().unwrap();
    assert_eq!(a, Ping { id: 1 });
    assert_eq!(b, Ping { id: 2 });

    let eof: Option<Ping> = read_json_message(&mut reader).await.unwrap();
    assert!(eof.is_none());
}

#[tokio::test]
async fn clean_eof_with_no_bytes_is_none() {
    let mut reader = Cursor::new(Vec::new());
    let msg: Option<Ping> = read_json_message(&mut reader).await.unwrap();
    assert!(msg.is_none());
}

#[tokio::test]
async fn eof_mid_frame_is_truncated_error() {
    let mut reader = Cursor::new(b"{\"id\":1".to_vec());
    let err = read_line_frame(&mut reader).await.unwrap_err();
    assert!(matches!(err, WireError::TruncatedFrame));
}

#[tokio::test]
async fn oversize_frame_is_rejected() {
    let mut huge = vec![b'a'; MAX_FRAME_BYTES + 1];
    huge.push(b'\n');
    let mut reader = Cursor::new(huge);
    let err = read_line_frame(&mut reader).await.unwrap_err();
    assert!(matches!(err, WireError::FrameTooLarge(_)));
}
