//! File sink append-or-create semantics

use dynamo::dynamo::config::Config;
use dynamo::dynamo::record::{FieldKind, FieldSpec, FieldValue, Record, RecordSchema};
use dynamo::dynamo::sink::{DataSink, FileSink};
use std::path::Path;

fn config(dir: &Path, format: &str, filename: &str) -> Config {
    Config::from_pairs([
        ("Handlers.File.Path", dir.to_str().unwrap()),
        ("Handlers.File.Filename", filename),
        ("Serialization.Format", format),
    ])
}

fn event_schema() -> RecordSchema {
    RecordSchema::new(
        "Event",
        vec![
            FieldSpec::new("id", FieldKind::String),
            FieldSpec::new("name", FieldKind::String),
        ],
    )
}

fn sink(dir: &Path, format: &str, filename: &str) -> FileSink {
    FileSink::from_config(&config(dir, format, filename), event_schema()).unwrap()
}

fn record(id: &str, name: &str) -> Record {
    Record::new()
        .with("id", FieldValue::String(id.into()))
        .with("name", FieldValue::String(name.into()))
}

#[tokio::test]
async fn test_xml_header_then_crlf_on_append() {
    let dir = tempfile::tempdir().unwrap();
    let sink = sink(dir.path(), "xml", "events");

    sink.send(&record("1", "ada")).await.unwrap();
    sink.send(&record("2", "grace")).await.unwrap();
    sink.close().await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("events.xml")).unwrap();
    assert_eq!(
        contents,
        "<xml version=\"1.0\">\
         <Event><id>1</id><name>ada</name></Event>\r\n\
         <Event><id>2</id><name>grace</name></Event>"
    );
}

#[tokio::test]
async fn test_append_to_existing_file_across_sinks() {
    let dir = tempfile::tempdir().unwrap();

    let first = sink(dir.path(), "json", "events");
    first.send(&record("1", "ada")).await.unwrap();
    first.close().await.unwrap();

    // A fresh sink over the same path prepends the separator before its
    // first record because the file already has content
    let second = sink(dir.path(), "json", "events");
    second.send(&record("2", "grace")).await.unwrap();
    second.close().await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("events.json")).unwrap();
    assert_eq!(
        contents,
        "{\"id\":\"1\",\"name\":\"ada\"}\r\n{\"id\":\"2\",\"name\":\"grace\"}"
    );
}

#[tokio::test]
async fn test_explicit_extension_kept() {
    let dir = tempfile::tempdir().unwrap();
    let sink = sink(dir.path(), "json", "events.log");

    sink.send(&record("1", "ada")).await.unwrap();
    sink.close().await.unwrap();

    assert!(dir.path().join("events.log").exists());
}

#[tokio::test]
async fn test_tab_text_gets_tsv_extension() {
    let dir = tempfile::tempdir().unwrap();
    let sink = sink(dir.path(), "text", "events");

    sink.send(&record("42", "ada")).await.unwrap();
    sink.close().await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("events.tsv")).unwrap();
    assert_eq!(contents, "42\tada\t");
}

#[tokio::test]
async fn test_concurrent_sends_never_interleave_records() {
    let dir = tempfile::tempdir().unwrap();
    let sink = std::sync::Arc::new(sink(dir.path(), "json", "events"));

    let mut handles = Vec::new();
    for i in 0..64 {
        let sink = std::sync::Arc::clone(&sink);
        handles.push(tokio::spawn(async move {
            sink.send(&record(&i.to_string(), "worker")).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    sink.close().await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("events.json")).unwrap();
    let lines: Vec<&str> = contents.split("\r\n").collect();
    assert_eq!(lines.len(), 64);
    for line in lines {
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["name"], "worker");
    }
}
