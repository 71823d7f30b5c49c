//! Placeholder rendering over DOCX packages.
//!
//! A DOCX template is a ZIP package; the text parts carry placeholders
//! delimited by `«` and `»`. Fields substitute a context value (missing
//! fields become empty strings), and `«#name» … «/name»` loops repeat their
//! body once per element of a context array, with the element's fields
//! shadowing the outer scope inside the body.

use std::io::{Cursor, Read, Write};

use serde_json::Value;
use tracing::trace;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::error::RenderError;

pub mod merge;

const OPEN: char = '\u{ab}'; // «
const CLOSE: char = '\u{bb}'; // »

const DOCUMENT_PART: &str = "word/document.xml";

/// Render `context` into a DOCX template, returning the finished package.
///
/// Substitution covers the document body plus any header and footer parts;
/// every other package entry is copied through untouched. The transform is
/// pure and synchronous; failures are scoped to the one record whose
/// context is being bound.
pub fn render(template: &[u8], context: &Value) -> Result<Vec<u8>, RenderError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut saw_document = false;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if entry.is_dir() {
            out.add_directory(name, options)?;
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;

        if is_renderable_part(&name) {
            saw_document |= name == DOCUMENT_PART;
            let xml =
                String::from_utf8(bytes).map_err(|_| RenderError::Encoding(name.clone()))?;
            let fused = fuse_placeholders(&xml);
            let mut scopes = vec![context.clone()];
            let rendered = render_fragment(&fused, &mut scopes)?;
            trace!(part = %name, "rendered template part");
            out.start_file(name, options)?;
            out.write_all(rendered.as_bytes())?;
        } else {
            out.start_file(name, options)?;
            out.write_all(&bytes)?;
        }
    }

    if !saw_document {
        return Err(RenderError::MissingPart(DOCUMENT_PART));
    }

    Ok(out.finish()?.into_inner())
}

fn is_renderable_part(name: &str) -> bool {
    name == DOCUMENT_PART
        || (name.starts_with("word/header") && name.ends_with(".xml"))
        || (name.starts_with("word/footer") && name.ends_with(".xml"))
}

/// Word editors split placeholder text across runs as the author types.
/// Drop any markup found between `«` and `»` so each placeholder becomes one
/// contiguous token; the removed run boundaries are balanced close/open
/// pairs, so the surrounding XML stays well formed.
fn fuse_placeholders(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find(OPEN) {
        let after_open = start + OPEN.len_utf8();
        out.push_str(&rest[..after_open]);
        rest = &rest[after_open..];
        match rest.find(CLOSE) {
            Some(end) => {
                out.push_str(&strip_tags(&rest[..end]));
                out.push(CLOSE);
                rest = &rest[end + CLOSE.len_utf8()..];
            }
            // unterminated delimiter: leave the tail as literal text
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Byte offsets of the next placeholder token: `(start, inner range, end)`.
fn next_token(s: &str, from: usize) -> Option<(usize, usize, usize, usize)> {
    let start = from + s[from..].find(OPEN)?;
    let inner_start = start + OPEN.len_utf8();
    let inner_end = inner_start + s[inner_start..].find(CLOSE)?;
    Some((start, inner_start, inner_end, inner_end + CLOSE.len_utf8()))
}

fn render_fragment(fragment: &str, scopes: &mut Vec<Value>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(fragment.len());
    let mut pos = 0;

    while let Some((start, inner_start, inner_end, end)) = next_token(fragment, pos) {
        out.push_str(&fragment[pos..start]);
        let tag = fragment[inner_start..inner_end].trim();

        if let Some(name) = tag.strip_prefix('#') {
            let name = name.trim();
            let (body_end, after) = find_loop_end(fragment, end, name)?;
            let body = &fragment[end..body_end];
            match lookup(scopes, name).cloned() {
                Some(Value::Array(items)) => {
                    for item in items {
                        scopes.push(item);
                        let rendered = render_fragment(body, scopes);
                        scopes.pop();
                        out.push_str(&rendered?);
                    }
                }
                Some(Value::Object(map)) => {
                    scopes.push(Value::Object(map));
                    let rendered = render_fragment(body, scopes);
                    scopes.pop();
                    out.push_str(&rendered?);
                }
                // absent or falsy sections render nothing
                None | Some(Value::Null) | Some(Value::Bool(false)) => {}
                Some(_) => out.push_str(&render_fragment(body, scopes)?),
            }
            pos = after;
        } else if let Some(name) = tag.strip_prefix('/') {
            return Err(RenderError::UnmatchedClose(name.trim().to_string()));
        } else {
            out.push_str(&substituted_text(lookup(scopes, tag)));
            pos = end;
        }
    }

    out.push_str(&fragment[pos..]);
    Ok(out)
}

/// Find the close tag matching a loop opened at `from`, accounting for
/// nested loops of the same name. Returns (body end, position after close).
fn find_loop_end(fragment: &str, from: usize, name: &str) -> Result<(usize, usize), RenderError> {
    let mut depth = 1usize;
    let mut pos = from;
    while let Some((start, inner_start, inner_end, end)) = next_token(fragment, pos) {
        let tag = fragment[inner_start..inner_end].trim();
        if tag.strip_prefix('#').map(str::trim) == Some(name) {
            depth += 1;
        } else if tag.strip_prefix('/').map(str::trim) == Some(name) {
            depth -= 1;
            if depth == 0 {
                return Ok((start, end));
            }
        }
        pos = end;
    }
    Err(RenderError::UnclosedLoop(name.to_string()))
}

/// Innermost scope wins; loop elements shadow the record context.
fn lookup<'a>(scopes: &'a [Value], name: &str) -> Option<&'a Value> {
    scopes
        .iter()
        .rev()
        .find_map(|scope| scope.as_object().and_then(|map| map.get(name)))
}

/// Unresolved references render as empty strings, never as errors. Newlines
/// in cell values become run breaks so multi-line text survives.
fn substituted_text(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    };
    escape_xml(&text).replace('\n', "</w:t><w:br/><w:t>")
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal but structurally honest DOCX package around `body`.
    pub fn docx_with_body(body: &str) -> Vec<u8> {
        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}<w:sectPr><w:pgSz w:w=\"11906\" w:h=\"16838\"/></w:sectPr></w:body>\
             </w:document>"
        );
        let content_types = "<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>";

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(content_types.as_bytes()).unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    pub fn paragraph(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    pub fn document_xml(package: &[u8]) -> String {
        let mut archive = ZipArchive::new(Cursor::new(package)).unwrap();
        let mut entry = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        entry.read_to_string(&mut xml).unwrap();
        xml
    }
}
