//! Readers for the TREC collection and topic formats.
//!
//! These are thin adapters: they locate fields and hand raw bytes to the
//! [`IndexBuilder`](crate::builder::IndexBuilder), which decides whether a
//! document is usable.

use crate::builder::RawDocument;
use crate::error::{Error, Result};
use crate::query::Query;
use lazy_static::lazy_static;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref DOC: BytesRegex = BytesRegex::new(r"(?s-u)<DOC>(.*?)</DOC>").expect("valid regex");
    static ref DOCNO: BytesRegex = BytesRegex::new(r"(?s-u)<DOCNO>(.*?)</DOCNO>").expect("valid regex");
    static ref TEXT: BytesRegex = BytesRegex::new(r"(?s-u)<TEXT>(.*?)</TEXT>").expect("valid regex");
    static ref TOP: Regex = Regex::new(r"(?s)<top>(.*?)</top>").expect("valid regex");
    static ref NUM: Regex = Regex::new(r"<num>\s*(?:Number:)?\s*(\S+)").expect("valid regex");
    static ref TITLE: Regex = Regex::new(r"(?s)<title>(.*?)(?:<|\z)").expect("valid regex");
}

/// Every `<DOC>` block of an SGML file. The body is the concatenation of the
/// block's `<TEXT>` sections; a block without DOCNO yields an empty docno.
pub fn parse_collection(bytes: &[u8]) -> Vec<RawDocument> {
    DOC.captures_iter(bytes)
        .map(|caps| {
            let block = &caps[1];
            let docno = DOCNO
                .captures(block)
                .map(|c| String::from_utf8_lossy(&c[1]).trim().to_string())
                .unwrap_or_default();
            let mut body = Vec::new();
            for text in TEXT.captures_iter(block) {
                if !body.is_empty() {
                    body.push(b'\n');
                }
                body.extend_from_slice(trim_bytes(&text[1]));
            }
            RawDocument { docno, body }
        })
        .collect()
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

pub fn read_collection_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawDocument>> {
    Ok(parse_collection(&fs::read(path)?))
}

/// `<num> Number: 051` becomes query id `51`: all-digit ids lose their
/// leading zeros so they line up with the qrels. Other ids are kept verbatim.
fn normalize_topic_id(raw: &str) -> String {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let trimmed = raw.trim_start_matches('0');
        if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
    } else {
        raw.to_string()
    }
}

/// TREC topic file; the query text is the `<title>` field with any
/// `Topic:` prefix removed.
pub fn parse_topics(text: &str) -> Result<Vec<Query>> {
    let mut queries = Vec::new();
    for (i, caps) in TOP.captures_iter(text).enumerate() {
        let block = &caps[1];
        let id = NUM
            .captures(block)
            .map(|c| normalize_topic_id(&c[1]))
            .ok_or_else(|| Error::Parse { line: i + 1, message: "topic without <num>".into() })?;
        let title = TITLE
            .captures(block)
            .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "))
            .ok_or_else(|| Error::Parse { line: i + 1, message: format!("topic {id} without <title>") })?;
        let title = title.strip_prefix("Topic:").map(str::trim).unwrap_or(title.as_str()).to_string();
        queries.push(Query::new(id, title));
    }
    Ok(queries)
}

/// `qid<TAB>query` per line.
pub fn parse_topics_tsv(text: &str) -> Result<Vec<Query>> {
    let mut queries = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (id, query) = line
            .split_once('\t')
            .ok_or_else(|| Error::Parse { line: i + 1, message: "expected qid<TAB>query".into() })?;
        queries.push(Query::new(id.trim(), query.trim()));
    }
    Ok(queries)
}

/// Picks the TREC or TSV reader from the content.
pub fn read_topics<P: AsRef<Path>>(path: P) -> Result<Vec<Query>> {
    let text = String::from_utf8_lossy(&fs::read(path)?).into_owned();
    if text.contains("<top>") {
        parse_topics(&text)
    } else {
        parse_topics_tsv(&text)
    }
}
