//! Error types for logtap
//!
//! Errors here never reach the caller of the HTTP exchange: masking failures
//! are swallowed by the formatter (the affected value is omitted rather than
//! leaked), and pattern errors can only surface while building custom rules.

use thiserror::Error;

/// Errors produced by the logging pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A masking rule failed while rewriting a value.
    ///
    /// The formatter reacts by omitting the value entirely; the unmasked
    /// text is never rendered.
    #[error("masking rule failed: {0}")]
    Mask(String),

    /// A user-supplied masking pattern did not compile.
    #[error("invalid masking pattern: {0}")]
    Pattern(#[from] regex::Error),
}
