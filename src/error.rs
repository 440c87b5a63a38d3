use std::fmt;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("unknown project: {0} (no DRS template registered)")]
    #[diagnostic(help("run `cordex-cat projects` to list registered templates"))]
    UnknownProject(String),

    #[error("cannot read catalog root {path}: {reason}")]
    UnreadableRoot { path: Utf8PathBuf, reason: String },

    #[error("invalid DRS template for {project}: {reason}")]
    InvalidTemplate { project: String, reason: String },

    #[error("invalid field pattern in template {project}: {reason}")]
    InvalidPattern { project: String, reason: String },

    #[error("invalid mip_era: {0} (expected CMIP5 or CMIP6)")]
    InvalidMipEra(String),

    #[error("invalid scan target: {0} (expected PROJECT=ROOT)")]
    InvalidTarget(String),

    #[error("missing config file cordex-catalog.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("malformed catalog table: {0}")]
    CatalogFormat(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Why a single candidate file did not make it into the catalog.
///
/// Rejections never abort a scan; they are collected next to the accepted
/// records so the caller can log, count or fail on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("path does not match the {project} DRS template")]
    NoMatch { project: String },

    #[error("directory and filename disagree on {}", FieldList(.mismatches))]
    FieldInconsistency { mismatches: Vec<FieldMismatch> },

    #[error("parsed fields are missing required columns: {}", .missing.join(", "))]
    IncompleteRecord { missing: Vec<String> },

    #[error("legacy field names collide after renaming: {}", .fields.join(", "))]
    TranslationConflict { fields: Vec<String> },
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::NoMatch { .. } => "no-match",
            Rejection::FieldInconsistency { .. } => "inconsistent-field",
            Rejection::IncompleteRecord { .. } => "incomplete-record",
            Rejection::TranslationConflict { .. } => "translation-conflict",
        }
    }
}

/// A field that appears in both the directory path and the filename with
/// different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMismatch {
    pub field: String,
    pub directory: Option<String>,
    pub filename: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.directory {
            Some(directory) => write!(
                f,
                "{} (directory={directory}, filename={})",
                self.field, self.filename
            ),
            None => write!(f, "{} (directory=<missing>, filename={})", self.field, self.filename),
        }
    }
}

struct FieldList<'a>(&'a [FieldMismatch]);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, mismatch) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{mismatch}")?;
        }
        Ok(())
    }
}
