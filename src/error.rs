use thiserror::Error;

/// A supplied table could not be read or parsed. Fatal to the whole run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open {label}: {source}")]
    Io {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{label} is not valid tabular data: {source}")]
    Parse {
        label: String,
        #[source]
        source: csv::Error,
    },
}

/// A single record's template binding failed. Recoverable: the record is
/// skipped and the rest of the batch continues.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("template is not a valid DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("template has no {0} part")]
    MissingPart(&'static str),

    #[error("template part {0} is not UTF-8 text")]
    Encoding(String),

    #[error("loop \u{ab}#{0}\u{bb} is never closed")]
    UnclosedLoop(String),

    #[error("loop close \u{ab}/{0}\u{bb} has no matching open tag")]
    UnmatchedClose(String),

    #[error("I/O error while rebuilding document: {0}")]
    Io(#[from] std::io::Error),
}

/// A category merge failed. Recoverable: the merged file for that category
/// is omitted, the per-record documents are kept.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("no documents to merge")]
    Empty,

    #[error("document {index} is not a valid DOCX package: {source}")]
    Package {
        index: usize,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("document {0} part is not UTF-8 text")]
    Encoding(usize),

    #[error("document {0} has no recognizable body")]
    MalformedBody(usize),

    #[error("I/O error while rebuilding merged document: {0}")]
    Io(#[from] std::io::Error),
}

/// Output archive assembly failed. Fatal to the whole run.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level pipeline failure. Only the fatal error kinds surface here;
/// render and merge problems are reported through the progress log instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to read {label} template: {source}")]
    Template {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Package(#[from] PackageError),
}
