//! Tests for the json sink

use std::io::{BufRead, BufReader};

use super::*;
use flowline_flow::{decode_line, Flow};
use flowline_pipeline::testing::run_segment;

#[tokio::test]
async fn test_writes_lines_and_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flows.json");
    let segment = JsonFactory
        .create(
            &SegmentConfig::from_pairs([("filename", path.to_str().unwrap())]),
            &[],
        )
        .unwrap();

    let input = vec![
        Flow {
            proto: 6,
            bytes: 100,
            ..Default::default()
        },
        Flow {
            proto: 17,
            bytes: 200,
            ..Default::default()
        },
    ];
    let (out, _) = run_segment(segment, input.clone()).await;
    assert_eq!(out, input, "sink passes flows through unchanged");

    let file = std::fs::File::open(&path).unwrap();
    let lines: Vec<String> = BufReader::new(file).lines().map(|l| l.unwrap()).collect();
    assert_eq!(lines.len(), 2);
    let decoded = decode_line(&lines[0]).unwrap();
    assert_eq!(decoded, input[0], "written lines decode back");
}

#[test]
fn test_unwritable_filename_fails_construction() {
    assert!(JsonFactory
        .create(
            &SegmentConfig::from_pairs([("filename", "/no/such/dir/flows.json")]),
            &[]
        )
        .is_err());
}
