//! Reading documents and program files from disk.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use xmlview_compiler::Diagnostics;
use xmlview_core::{Document, IngestError, ParserOptions, parse_file};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// A program file kept in memory so diagnostics can point into it.
pub struct ProgramFile {
    pub path: String,
    pub source: String,
}

impl ProgramFile {
    pub fn read(path: &Path) -> Result<Self, InputError> {
        let source = std::fs::read_to_string(path).map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.display().to_string(),
            source,
        })
    }

    /// Render diagnostics against this file, on stderr. Empty logs print nothing.
    pub fn report(&self, diagnostics: &Diagnostics, color: bool) {
        if diagnostics.is_empty() {
            return;
        }
        eprint!(
            "{}",
            diagnostics
                .printer()
                .source(&self.source)
                .path(&self.path)
                .colored(color)
                .render()
        );
    }
}

pub fn load_document(path: &Path) -> Result<Document, InputError> {
    tracing::debug!(path = %path.display(), "parsing document");
    Ok(parse_file(path, ParserOptions::default())?)
}

/// Print `error: <msg>` and exit with status 1.
pub fn fail(msg: impl Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}
