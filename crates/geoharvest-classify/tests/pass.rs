//! Classification passes over a temporary gallery.

use geoharvest_classify::{
    Classifier, ClassificationPass, ImageRequest, MockClassifier, OpenAiClassifier, ResultsTable,
    RESULTS_FILE_NAME,
};
use geoharvest_common::{ItemKind, ItemStatus, SkipReason};
use image::{Rgb, RgbImage};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;

fn write_jpeg(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(16, 16, Rgb([20, 80, 160])).save(path).unwrap();
}

fn gallery(root: &Path) -> std::path::PathBuf {
    let gallery = root.join("preview_tiles");
    write_jpeg(&gallery.join("preview").join("S2A_1-preview.jpg"));
    write_jpeg(&gallery.join("preview").join("S2B_2-preview.jpg"));
    write_jpeg(&gallery.join("preview").join("748-962.jpg"));
    fs::write(gallery.join("preview").join("notes.txt"), b"ignored").unwrap();
    fs::write(gallery.join("stray.jpg"), b"not in a subfolder").unwrap();
    gallery
}

#[test]
fn test_rerun_appends_without_rewriting() {
    let root = tempfile::tempdir().unwrap();
    let gallery = gallery(root.path());
    let csv_path = root.path().join(RESULTS_FILE_NAME);
    let prior = "folder_name,image_name\nolder,first.jpg\nolder,second.jpg\n";
    fs::write(&csv_path, prior).unwrap();

    let mock = MockClassifier::new()
        .with_answer("S2A_1-preview.jpg", true)
        .with_answer("748-962.jpg", true);
    let table = ResultsTable::open(&csv_path).unwrap();
    let report = ClassificationPass::new(&gallery, table).run(&mock).unwrap();

    assert_eq!(
        mock.calls(),
        ["preview/748-962.jpg", "preview/S2A_1-preview.jpg", "preview/S2B_2-preview.jpg"]
    );
    assert_eq!(report.summary().done, 3);

    let content = fs::read_to_string(&csv_path).unwrap();
    assert!(content.starts_with(prior), "existing rows unchanged and first");
    assert_eq!(
        &content[prior.len()..],
        "preview,748-962.jpg\npreview,S2A_1-preview.jpg\n"
    );
}

#[test]
fn test_failures_are_negative_and_contained() {
    let root = tempfile::tempdir().unwrap();
    let gallery = gallery(root.path());
    fs::write(gallery.join("preview").join("0-corrupt.jpg"), b"garbage").unwrap();
    let csv_path = root.path().join(RESULTS_FILE_NAME);

    let mock = MockClassifier::new()
        .with_failure("748-962.jpg", "rate limited")
        .with_answer("S2B_2-preview.jpg", true);
    let table = ResultsTable::open(&csv_path).unwrap();
    let report = ClassificationPass::new(&gallery, table).run(&mock).unwrap();

    let summary = report.summary();
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.done, 2);
    assert!(report
        .find(ItemKind::Classification, "preview/0-corrupt.jpg")
        .unwrap()
        .is_failure());
    assert_eq!(mock.calls().len(), 3, "corrupt image never reaches the model");

    assert_eq!(
        fs::read_to_string(&csv_path).unwrap(),
        "folder_name,image_name\npreview,S2B_2-preview.jpg\n"
    );
}

#[test]
fn test_skip_recorded() {
    let root = tempfile::tempdir().unwrap();
    let gallery = gallery(root.path());
    let csv_path = root.path().join(RESULTS_FILE_NAME);
    fs::write(&csv_path, "folder_name,image_name\npreview,748-962.jpg\n").unwrap();

    let mock = MockClassifier::new().with_answer("748-962.jpg", true);
    let table = ResultsTable::open(&csv_path).unwrap();
    let report = ClassificationPass::new(&gallery, table)
        .with_skip_recorded(true)
        .run(&mock)
        .unwrap();

    assert_eq!(
        report.find(ItemKind::Classification, "preview/748-962.jpg").unwrap().status,
        ItemStatus::Skipped(SkipReason::AlreadyRecorded)
    );
    assert_eq!(mock.calls().len(), 2);
    assert_eq!(
        fs::read_to_string(&csv_path).unwrap(),
        "folder_name,image_name\npreview,748-962.jpg\n"
    );
}

#[test]
fn test_openai_client_against_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            head.push_str(&line);
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).unwrap();

        let reply = r#"{"choices":[{"message":{"role":"assistant","content":"{\"status\": true}"}}]}"#;
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.len(),
            reply
        )
        .unwrap();
        (head, String::from_utf8(body).unwrap())
    });

    let client = reqwest::blocking::Client::builder().no_proxy().build().unwrap();
    let classifier =
        OpenAiClassifier::with_client(format!("http://{}/v1/chat/completions", addr), "sk-test", client);
    let positive = classifier
        .classify(&ImageRequest {
            folder: "preview",
            image_name: "a.jpg",
            jpeg_base64: "QUJD",
        })
        .unwrap();
    assert!(positive);

    let (head, body) = handle.join().unwrap();
    assert!(head.starts_with("POST /v1/chat/completions"));
    assert!(head.to_ascii_lowercase().contains("authorization: bearer sk-test"));
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["content"][1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
}
