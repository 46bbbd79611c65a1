use std::io::Write as _;

use tempfile::tempdir;
use warden_core::test_support::analysis_id;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = zip::write::FileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

#[test]
fn unpack_writes_every_entry_under_dest_dir() {
    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("result.zip");
    std::fs::write(&zip_path, build_zip(&[("report.json", "{}"), ("logs/cuckoo.log", "hello")])).unwrap();

    let dest = dir.path().join("dest");
    unpack(&zip_path, &dest).unwrap();

    assert_eq!(std::fs::read_to_string(dest.join("report.json")).unwrap(), "{}");
    assert_eq!(std::fs::read_to_string(dest.join("logs/cuckoo.log")).unwrap(), "hello");
}

#[tokio::test]
async fn retrieve_one_downloads_extracts_and_deletes_the_zip() {
    let server = MockServer::start().await;
    let zip_bytes = build_zip(&[("report.json", r#"{"ok":true}"#)]);
    Mock::given(method("GET"))
        .and(path("/tasks/a_1/result.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let job = RetrievalJob {
        task_id: TaskId::new(&analysis_id("a"), 1),
        zip_url: format!("{}/tasks/a_1/result.zip", server.uri()).parse().unwrap(),
        dest_dir: dir.path().to_path_buf(),
    };

    retrieve_one(&reqwest::Client::new(), &job).await.unwrap();

    assert_eq!(std::fs::read_to_string(dir.path().join("report.json")).unwrap(), r#"{"ok":true}"#);
    assert!(!dir.path().join(format!(".{}.result.zip", job.task_id.as_str())).exists());
}

#[tokio::test]
async fn submit_returns_failed_when_the_download_404s() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/missing.zip")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let retriever = ResultRetriever::spawn(1, reqwest::Client::new());
    let dir = tempdir().unwrap();
    let outcome = retriever
        .submit(RetrievalJob {
            task_id: TaskId::new(&analysis_id("a"), 1),
            zip_url: format!("{}/missing.zip", server.uri()).parse().unwrap(),
            dest_dir: dir.path().to_path_buf(),
        })
        .await;

    assert!(matches!(outcome, RetrievalOutcome::Failed(_)));
    retriever.shutdown();
}

#[tokio::test]
async fn submit_after_shutdown_reports_failure_without_hanging() {
    let retriever = ResultRetriever::spawn(1, reqwest::Client::new());
    retriever.shutdown();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let dir = tempdir().unwrap();
    let outcome = retriever
        .submit(RetrievalJob {
            task_id: TaskId::new(&analysis_id("a"), 1),
            zip_url: "http://127.0.0.1:1/unused.zip".parse().unwrap(),
            dest_dir: dir.path().to_path_buf(),
        })
        .await;

    assert!(matches!(outcome, RetrievalOutcome::Failed(_)));
}
