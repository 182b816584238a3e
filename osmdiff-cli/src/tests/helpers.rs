//! Payloads and capture helpers shared by the CLI tests.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tempfile::TempDir;

pub(super) const CREATE_BENCH: &str = concat!(
    r#"<osm version="0.6" generator="Overpass API">"#,
    r#"<action type="create">"#,
    r#"<node id="11" version="1" timestamp="2018-01-10T02:40:30Z" changeset="5" uid="7" user="mapper" lat="51.5" lon="-0.12">"#,
    r#"<tag k="amenity" v="bench"/>"#,
    r#"</node>"#,
    r#"</action>"#,
    r#"</osm>"#,
);

pub(super) const UNTAGGED_CREATE: &str = concat!(
    r#"<osm>"#,
    r#"<action type="create">"#,
    r#"<node id="12" version="1" timestamp="2018-01-10T02:40:30Z" lat="51.6" lon="-0.13"/>"#,
    r#"</action>"#,
    r#"</osm>"#,
);

pub(super) const MISMATCHED: &str = "<osm><action type=\"create\"></node></osm>";

/// A temporary directory holding one diff file.
pub(super) struct DiffFile {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl DiffFile {
    pub(super) fn with_contents(contents: &[u8]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("diff.osc"))
            .expect("utf-8 temp path");
        let mut file = std::fs::File::create(&path).expect("create diff file");
        file.write_all(contents).expect("write diff file");
        Self { _dir: dir, path }
    }

    pub(super) fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Split captured NDJSON output into parsed JSON values.
pub(super) fn json_lines(output: &[u8]) -> Vec<Value> {
    std::str::from_utf8(output)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect()
}

/// Compact summary of each line: `start:N`, `end:N` or the action id.
pub(super) fn line_kinds(lines: &[Value]) -> Vec<String> {
    lines
        .iter()
        .map(|line| match line.get("status").and_then(Value::as_str) {
            Some(status) => format!(
                "{status}:{}",
                line.get("sequenceNumber").and_then(Value::as_u64).unwrap_or_default()
            ),
            None => line
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned(),
        })
        .collect()
}
