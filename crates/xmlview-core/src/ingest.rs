//! Document ingestion from strings and files.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Document, ParserOptions};

static UTF8_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<\?xml[^?]*?) encoding="(?:utf-8|UTF-8)"([^?]*?\?>)"#)
        .expect("declaration pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed document: {message}")]
    Parse { message: String },
}

/// Drop a redundant `encoding="utf-8"` attribute from the XML declaration.
pub fn normalize_declaration(source: &str) -> Cow<'_, str> {
    UTF8_DECLARATION.replace_all(source, "${1}${2}")
}

pub fn parse_str(source: &str, options: ParserOptions) -> Result<Document, IngestError> {
    let source = normalize_declaration(source);
    let package = sxd_document::parser::parse(&source).map_err(|e| IngestError::Parse {
        message: format!("{e:?}"),
    })?;
    Ok(Document::from_package(package, options))
}

/// Read a UTF-8 file and parse it.
pub fn parse_file(path: impl AsRef<Path>, options: ParserOptions) -> Result<Document, IngestError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&source, options)
}
