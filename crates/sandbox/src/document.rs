//! Notebook document parsing.
//!
//! Only the structure needed to hand a document to a kernel is checked: a
//! JSON object in nbformat 4 with a `cells` array. Cell contents are never
//! interpreted.

use nbrun_core::{Error, Result};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const SUPPORTED_NBFORMAT: u64 = 4;

/// A structurally valid notebook, kept as the exact text it was read from.
///
/// The sandbox receives `raw`, so nothing is lost to a re-serialisation.
#[derive(Debug, Clone)]
pub struct Notebook {
    raw: String,
}

#[derive(Deserialize)]
struct RawNotebook {
    nbformat: u64,
    #[allow(dead_code)]
    cells: Vec<IgnoredAny>,
}

impl Notebook {
    /// Read and validate a notebook from disk
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::parse_with_source(path, "cannot read notebook", e))?;
        Self::parse(path, raw)
    }

    /// Validate notebook text that was read from `path`
    pub fn parse(path: &Path, raw: String) -> Result<Self> {
        let parsed: RawNotebook = serde_json::from_str(&raw)
            .map_err(|e| Error::parse_with_source(path, "not a notebook document", e))?;

        if parsed.nbformat != SUPPORTED_NBFORMAT {
            return Err(Error::parse(
                path,
                format!(
                    "unsupported nbformat {} (expected {SUPPORTED_NBFORMAT})",
                    parsed.nbformat
                ),
            ));
        }

        Ok(Self { raw })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}
