//! Dotted/indexed addressing into a decoded configuration tree.
//!
//! An address such as `providers.github[0].url` is a list of dot-separated
//! segments; each segment names a mapping key and may carry one bracketed
//! index into the sequence stored under that key.
//!
//! Reads never fail on missing structure. Writes create whatever intermediate
//! mappings are missing and pad sequences with empty mappings until the
//! target index exists.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{ResourceError, Result};

/// One `key` or `key[index]` component of a [`PathAddress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: String,
    pub index: Option<usize>,
}

/// A parsed dotted/indexed configuration address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAddress {
    raw: String,
    segments: Vec<Segment>,
}

impl PathAddress {
    /// Parse an address, rejecting empty segments, unbalanced brackets and
    /// non-integer indices.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ResourceError::invalid_path(raw, "path is empty"));
        }

        let segments = raw
            .split('.')
            .map(|segment| parse_segment(raw, segment))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Look the address up in `root`. Any type mismatch, missing key or
    /// out-of-range index yields `None`.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut node = root;
        for segment in &self.segments {
            let child = node.as_object()?.get(&segment.key)?;
            node = match segment.index {
                Some(index) => child.as_array()?.get(index)?,
                None => child,
            };
        }
        Some(node)
    }

    /// Store `value` at the address, auto-creating intermediate structure.
    ///
    /// Fails only when existing structure has the wrong shape, e.g. the
    /// address walks through a string.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<()> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(ResourceError::invalid_path(&self.raw, "path is empty"));
        };

        let mut node = root;
        let mut walked = String::new();
        for segment in parents {
            node = descend(node, segment, &mut walked)?;
        }

        let map = as_mapping(node, &walked)?;
        match last.index {
            None => {
                map.insert(last.key.clone(), value);
            }
            Some(index) => {
                let seq = sequence_at(map, &last.key, &walked)?;
                pad(seq, index);
                seq[index] = value;
            }
        }
        Ok(())
    }
}

impl FromStr for PathAddress {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(raw: &str, segment: &str) -> Result<Segment> {
    if segment.is_empty() {
        return Err(ResourceError::invalid_path(raw, "empty segment"));
    }

    let Some((key, rest)) = segment.split_once('[') else {
        if segment.contains(']') {
            return Err(ResourceError::invalid_path(
                raw,
                format!("unmatched ']' in segment '{}'", segment),
            ));
        }
        return Ok(Segment {
            key: segment.to_string(),
            index: None,
        });
    };

    if key.is_empty() || key.contains(']') {
        return Err(ResourceError::invalid_path(
            raw,
            format!("segment '{}' has no key before its index", segment),
        ));
    }

    let inner = rest.strip_suffix(']').ok_or_else(|| {
        ResourceError::invalid_path(raw, format!("unmatched '[' in segment '{}'", segment))
    })?;

    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ResourceError::invalid_path(
            raw,
            format!("index '{}' is not a non-negative integer", inner),
        ));
    }

    let index = inner.parse::<usize>().map_err(|e| {
        ResourceError::invalid_path(raw, format!("index '{}' is out of range: {}", inner, e))
    })?;

    Ok(Segment {
        key: key.to_string(),
        index: Some(index),
    })
}

fn descend<'a>(node: &'a mut Value, segment: &Segment, walked: &mut String) -> Result<&'a mut Value> {
    let location = walked.clone();
    push_segment(walked, segment);

    let map = as_mapping(node, &location)?;
    match segment.index {
        None => Ok(map
            .entry(segment.key.clone())
            .or_insert_with(|| Value::Object(Map::new()))),
        Some(index) => {
            let seq = sequence_at(map, &segment.key, &location)?;
            pad(seq, index);
            Ok(&mut seq[index])
        }
    }
}

fn as_mapping<'a>(node: &'a mut Value, location: &str) -> Result<&'a mut Map<String, Value>> {
    match node {
        Value::Object(map) => Ok(map),
        other => Err(ResourceError::config(
            display_location(location),
            format!("expected a mapping, found {}", kind_of(other)),
        )),
    }
}

fn sequence_at<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<&'a mut Vec<Value>> {
    match map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(seq) => Ok(seq),
        other => Err(ResourceError::config(
            join(location, key),
            format!("expected a sequence, found {}", kind_of(other)),
        )),
    }
}

fn pad(seq: &mut Vec<Value>, index: usize) {
    while seq.len() <= index {
        seq.push(Value::Object(Map::new()));
    }
}

fn push_segment(walked: &mut String, segment: &Segment) {
    if !walked.is_empty() {
        walked.push('.');
    }
    walked.push_str(&segment.key);
    if let Some(index) = segment.index {
        walked.push_str(&format!("[{}]", index));
    }
}

fn join(location: &str, key: &str) -> String {
    if location.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", location, key)
    }
}

fn display_location(location: &str) -> &str {
    if location.is_empty() {
        "<root>"
    } else {
        location
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
