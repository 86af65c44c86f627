//! Error types for tuneport-resolve
//!
//! Three layers:
//! - [`CatalogError`]: what the catalog collaborator can fail with
//! - [`ResolveError`]: the only failure `resolve` surfaces (batch-fatal)
//! - [`IngestError`]: playlist file reading

use std::time::Duration;
use thiserror::Error;

/// Catalog collaborator errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    /// Network or catalog hiccup; retried once
    #[error("Transient catalog error: {0}")]
    Transient(String),

    /// Credential or token failure; fatal for the whole run
    #[error("Catalog authentication failed: {0}")]
    Auth(String),

    /// Catalog asked us to slow down
    #[error("Rate limited by catalog (retry after {retry_after:?})")]
    RateLimited { retry_after: Duration },

    /// Catalog refused the query itself (HTTP 400)
    #[error("Catalog rejected query: {0}")]
    Rejected(String),

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Whether a single retry is worth attempting
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::Transient(_) | CatalogError::RateLimited { .. } | CatalogError::Parse(_)
        )
    }

    /// Delay before the retry: the catalog's own hint when it gave one
    pub fn retry_delay(&self, default: Duration) -> Duration {
        match self {
            CatalogError::RateLimited { retry_after } => *retry_after,
            _ => default,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, CatalogError::Auth(_))
    }
}

/// Errors returned by the resolution engine
///
/// Every other failure mode becomes a terminal
/// [`ResolutionResult`](crate::types::ResolutionResult).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    /// No further catalog calls can succeed
    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Playlist file ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Workbook could not be opened, read or written
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("No songs found in {0}")]
    Empty(String),
}
