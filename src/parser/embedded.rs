use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::RawRecord;

/// Key under which an object-shaped blob keeps its record list.
const RECORDS_FIELD: &str = "heroes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Object,
    Array,
    Any,
}

impl Shape {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Shape::Object => value.is_object(),
            Shape::Array => value.is_array(),
            Shape::Any => value.is_object() || value.is_array(),
        }
    }
}

/// Group 1 of every pattern starts at the blob's opening bracket or brace.
struct BlobPattern {
    name: &'static str,
    re: Regex,
    shape: Shape,
}

static PATTERNS: LazyLock<Vec<BlobPattern>> = LazyLock::new(|| {
    vec![
        BlobPattern {
            name: "hero_master",
            re: Regex::new(r"const\s+HERO_MASTER\s*=\s*(\{)").unwrap(),
            shape: Shape::Object,
        },
        BlobPattern {
            name: "assigned_record_array",
            re: Regex::new(r#"(?:const|var|let|window\.)\s*\w+\s*=\s*(\[\s*\{\s*"hero_id"\s*:)"#).unwrap(),
            shape: Shape::Array,
        },
        BlobPattern {
            name: "bare_record_array",
            re: Regex::new(r#"(\[\s*\{\s*"hero_id"\s*:)"#).unwrap(),
            shape: Shape::Array,
        },
        BlobPattern {
            name: "assigned_literal",
            re: Regex::new(r"(?:\b(?:const|var|let)\s+|window\.)[\w$]+\s*=\s*([\[{])").unwrap(),
            shape: Shape::Any,
        },
    ]
});

/// A parsed data blob and the pattern that located it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedBlob {
    pub pattern: &'static str,
    pub value: Value,
}

impl EmbeddedBlob {
    /// The record sequence: the array itself, or the array under `heroes`.
    pub fn records(&self) -> Vec<&RawRecord> {
        let list = match &self.value {
            Value::Array(items) => Some(items),
            Value::Object(map) => map.get(RECORDS_FIELD).and_then(Value::as_array),
            _ => None,
        };
        list.map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }
}

/// Find the first embedded blob that parses strictly and has the expected shape.
/// `None` is the normal outcome for pages without data.
pub fn extract(text: &str) -> Option<EmbeddedBlob> {
    for pattern in PATTERNS.iter() {
        for caps in pattern.re.captures_iter(text) {
            let Some(open) = caps.get(1) else { continue };
            let start = open.start();
            let Some(end) = balanced_end(text, start) else { continue };
            let Ok(value) = serde_json::from_str::<Value>(&text[start..end]) else {
                continue;
            };
            if pattern.shape.accepts(&value) {
                return Some(EmbeddedBlob {
                    pattern: pattern.name,
                    value,
                });
            }
        }
    }
    None
}

/// End (exclusive) of the bracketed value opening at `start`, found by depth
/// counting. Brackets inside string literals are ignored.
pub fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
