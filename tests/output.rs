// tests/output.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;

use hdlrun::exec::output::{OutputStream, for_each_line};
use hdlrun::exec::rewrite_file_markers;

type TestResult = Result<(), Box<dyn Error>>;

async fn collect(input: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    for_each_line(input, OutputStream::Stdout, |l| lines.push(l.to_string())).await;
    lines
}

#[test]
fn file_markers_become_locators() {
    assert_eq!(
        rewrite_file_markers("Error (12007): File: /work/top.v Line: 4"),
        "Error (12007): file:///work/top.v Line: 4"
    );
    assert_eq!(
        rewrite_file_markers("File: a.v and File: b.v"),
        "file://a.v and file://b.v"
    );
    assert_eq!(rewrite_file_markers("Info: nothing here"), "Info: nothing here");
    // Marker needs its trailing space.
    assert_eq!(rewrite_file_markers("File:a.v"), "File:a.v");
}

#[tokio::test]
async fn lines_are_split_without_terminators() -> TestResult {
    init_tracing();
    assert_eq!(collect(b"one\ntwo\r\nthree").await, ["one", "two", "three"]);
    assert_eq!(collect(b"\n\n").await, ["", ""]);
    assert!(collect(b"").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_does_not_end_the_stream() -> TestResult {
    init_tracing();
    let lines = collect(b"ok\n\xff\xfe bad\nafter\n").await;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "ok");
    assert!(lines[1].ends_with(" bad"));
    assert!(lines[1].contains('\u{FFFD}'));
    assert_eq!(lines[2], "after");
    Ok(())
}
