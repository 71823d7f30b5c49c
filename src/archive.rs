//! Assembles the final downloadable archive.

use std::io::{Cursor, Write};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::error::PackageError;

/// The two record variants, each with its own schema, template, output
/// folder and merged-document name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Individual,
    Collective,
}

impl Category {
    /// Folder the per-record documents live under inside the archive.
    pub fn folder(self) -> &'static str {
        match self {
            Category::Individual => "Individuelles",
            Category::Collective => "Collectives",
        }
    }

    /// File name of one record's rendered extract.
    pub fn document_name(self, key: &str) -> String {
        match self {
            Category::Individual => format!("Extrait_PI_{key}.docx"),
            Category::Collective => format!("Extrait_PC_{key}.docx"),
        }
    }

    /// Archive-root name of the category's merged document.
    pub fn merged_name(self) -> &'static str {
        match self {
            Category::Individual => "TOUS_LES_EXTRAITS_INDIVIDUELS.docx",
            Category::Collective => "TOUS_LES_EXTRAITS_COLLECTIVES.docx",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Individual => "individual",
            Category::Collective => "collective",
        }
    }
}

/// An in-memory rendered document plus its target file name.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Write every rendered document under its category folder and every
/// present merged document at the archive root, deflate-compressed.
pub fn build_archive(
    categories: &[(Category, &[RenderedDocument], Option<&[u8]>)],
) -> Result<Vec<u8>, PackageError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (category, documents, merged) in categories {
        zip.add_directory(category.folder(), options)?;
        for document in *documents {
            zip.start_file(format!("{}/{}", category.folder(), document.file_name), options)?;
            zip.write_all(&document.bytes)?;
        }
        if let Some(merged) = merged {
            zip.start_file(category.merged_name(), options)?;
            zip.write_all(merged)?;
        }
    }

    Ok(zip.finish()?.into_inner())
}
