//! Text extraction from uploaded documents

use crate::error::Result;

/// Turns uploaded file bytes into plain text.
///
/// Extraction may block; callers run it on the worker pool.
pub trait DocumentExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Best-effort decoding: UTF-8 (BOM stripped), then the text operators of
/// an uncompressed PDF, then Latin-1
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const PDF_MAGIC: &[u8] = b"%PDF-";

impl DocumentExtractor for PlainTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => match pdf_text(bytes) {
                Some(text) => text,
                None => latin1(bytes),
            },
        };

        Ok(text.replace("\r\n", "\n").trim().to_string())
    }
}

// Latin-1 maps every byte to the code point of the same value
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Literal strings inside `BT`..`ET` text objects, one line per object.
/// Compressed content streams yield nothing.
fn pdf_text(bytes: &[u8]) -> Option<String> {
    if !bytes.starts_with(PDF_MAGIC) {
        return None;
    }

    let mut lines = Vec::new();
    let mut rest = bytes;
    while let Some(start) = find(rest, b"BT") {
        let body = &rest[start + 2..];
        let end = find(body, b"ET").unwrap_or(body.len());
        let line: String = literals(&body[..end]).concat();
        if !line.trim().is_empty() {
            lines.push(line.trim().to_string());
        }
        rest = &body[end..];
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `( ... )` string literals with escapes resolved and balanced parentheses kept
fn literals(object: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = object.iter().copied();
    while let Some(b) = iter.next() {
        if b != b'(' {
            continue;
        }
        let mut depth = 1;
        let mut raw = Vec::new();
        while let Some(c) = iter.next() {
            match c {
                b'\\' => match iter.next() {
                    Some(b'n') => raw.push(b'\n'),
                    Some(b'r') | Some(b't') => raw.push(b' '),
                    Some(other) => raw.push(other),
                    None => break,
                },
                b'(' => {
                    depth += 1;
                    raw.push(c);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    raw.push(c);
                }
                _ => raw.push(c),
            }
        }
        out.push(latin1(&raw));
    }
    out
}
