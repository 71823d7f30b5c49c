//! Concatenates rendered DOCX packages into one combined document.
//!
//! The first document is the shell: its styles, numbering and section
//! properties survive. Every following document contributes its body
//! content, spliced in ahead of the shell's `<w:sectPr>` behind a page
//! break.

use std::io::{Cursor, Read, Write};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::error::MergeError;

const DOCUMENT_PART: &str = "word/document.xml";
const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

/// Merge `documents` in input order. Empty input is an error; a single
/// document merges to itself (modulo repackaging).
pub fn merge(documents: &[&[u8]]) -> Result<Vec<u8>, MergeError> {
    let (&shell, rest) = documents.split_first().ok_or(MergeError::Empty)?;

    let shell_xml = document_xml(shell, 0)?;
    let (_, splice_at) = body_bounds(&shell_xml, 0)?;

    let mut merged = String::with_capacity(shell_xml.len());
    merged.push_str(&shell_xml[..splice_at]);
    for (i, doc) in rest.iter().enumerate() {
        let index = i + 1;
        let xml = document_xml(doc, index)?;
        let (start, end) = body_bounds(&xml, index)?;
        merged.push_str(PAGE_BREAK);
        merged.push_str(&xml[start..end]);
    }
    merged.push_str(&shell_xml[splice_at..]);

    repackage(shell, &merged)
}

fn document_xml(package: &[u8], index: usize) -> Result<String, MergeError> {
    let mut archive =
        ZipArchive::new(Cursor::new(package)).map_err(|source| MergeError::Package {
            index,
            source,
        })?;
    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|source| MergeError::Package { index, source })?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| MergeError::Encoding(index))
}

/// Byte range of the body content: after the `<w:body>` open tag, up to the
/// section properties (or the body close when a document carries none).
fn body_bounds(xml: &str, index: usize) -> Result<(usize, usize), MergeError> {
    let start = match xml.find("<w:body>") {
        Some(i) => i + "<w:body>".len(),
        None => {
            let open = xml.find("<w:body ").ok_or(MergeError::MalformedBody(index))?;
            let close = xml[open..].find('>').ok_or(MergeError::MalformedBody(index))?;
            open + close + 1
        }
    };
    let end = xml[start..]
        .find("<w:sectPr")
        .or_else(|| xml[start..].find("</w:body>"))
        .map(|i| start + i)
        .ok_or(MergeError::MalformedBody(index))?;
    Ok((start, end))
}

/// Copy every entry of the shell package, swapping in the merged body.
fn repackage(shell: &[u8], merged_xml: &str) -> Result<Vec<u8>, MergeError> {
    let mut archive = ZipArchive::new(Cursor::new(shell)).map_err(|source| MergeError::Package {
        index: 0,
        source,
    })?;
    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|source| MergeError::Package { index: 0, source })?;
        let name = entry.name().to_string();

        if entry.is_dir() {
            out.add_directory(name, options)
                .map_err(|source| MergeError::Package { index: 0, source })?;
            continue;
        }

        out.start_file(name.clone(), options)
            .map_err(|source| MergeError::Package { index: 0, source })?;
        if name == DOCUMENT_PART {
            out.write_all(merged_xml.as_bytes())?;
        } else {
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            out.write_all(&bytes)?;
        }
    }

    Ok(out
        .finish()
        .map_err(|source| MergeError::Package { index: 0, source })?
        .into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx_with_body, document_xml as read_document, paragraph};

    #[test]
    fn merges_bodies_in_order_with_page_breaks() {
        let a = docx_with_body(&paragraph("premier extrait"));
        let b = docx_with_body(&paragraph("deuxième extrait"));
        let merged = merge(&[&a, &b]).unwrap();
        let xml = read_document(&merged);

        let first = xml.find("premier extrait").unwrap();
        let brk = xml.find(r#"<w:br w:type="page"/>"#).unwrap();
        let second = xml.find("deuxième extrait").unwrap();
        assert!(first < brk && brk < second);

        // exactly one section properties block survives, from the shell
        assert_eq!(xml.matches("<w:sectPr").count(), 1);
        assert!(second < xml.find("<w:sectPr").unwrap());
    }

    #[test]
    fn single_document_round_trips() {
        let a = docx_with_body(&paragraph("seul"));
        let merged = merge(&[&a]).unwrap();
        assert!(read_document(&merged).contains("seul"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(merge(&[]), Err(MergeError::Empty)));
    }

    fn package_with_document(document: &[u8]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(DOCUMENT_PART, options).unwrap();
        zip.write_all(document).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn non_utf8_document_part_is_an_encoding_error() {
        let bad = package_with_document(&[0xff, 0xfe, 0x00]);
        assert!(matches!(merge(&[&bad]), Err(MergeError::Encoding(0))));
    }

    #[test]
    fn document_without_a_body_is_malformed() {
        let bodiless = package_with_document(
            b"<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
              <w:p><w:r><w:t>texte</w:t></w:r></w:p></w:document>",
        );
        assert!(matches!(merge(&[&bodiless]), Err(MergeError::MalformedBody(0))));
    }

    #[test]
    fn corrupt_follow_up_document_fails_the_merge() {
        let a = docx_with_body(&paragraph("ok"));
        let garbage = b"definitely not a docx".to_vec();
        assert!(matches!(
            merge(&[&a, &garbage]),
            Err(MergeError::Package { index: 1, .. })
        ));
    }
}
