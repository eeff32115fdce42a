//! Error types for the page ACL engine.
//!
//! Only three things can go wrong inside the engine: a directive that looks
//! like an ACL but cannot be understood, a configuration that does not make
//! sense, and a page save that the store rejected. Evaluation itself never
//! fails; an absent grant is a deny.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A directive that was recognised as an `ALLOW` block but could not be parsed.
///
/// The directive text is kept verbatim so that callers can show it to the
/// page author, and so the page can be saved again without losing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedAcl {
    /// The full directive, from `[{` to `}]` inclusive.
    pub directive: String,
    /// 1-based line of the opening `[{`.
    pub line: usize,
    /// 1-based column (in characters) of the opening `[{`.
    pub column: usize,
    /// Human readable explanation.
    pub reason: String,
}

impl fmt::Display for MalformedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed ACL directive {} at line {}, column {}: {}",
            self.directive, self.line, self.column, self.reason
        )
    }
}

/// Failure reported by the page store when persisting new page text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to save page '{page}': {reason}")]
pub struct SaveError {
    pub page: String,
    pub reason: String,
}

impl SaveError {
    pub fn new(page: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur in ACL operations.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// An `ALLOW` directive with an unknown action or an unparsable expression.
    #[error("{0}")]
    MalformedAcl(MalformedAcl),

    /// The page store refused the new text. The cached ACL is untouched.
    #[error(transparent)]
    Save(#[from] SaveError),

    /// The engine configuration could not be loaded or is inconsistent.
    #[error("ACL configuration error: {0}")]
    Configuration(String),

    /// A rule expression that does not follow the expression grammar.
    #[error("invalid rule expression: {0}")]
    InvalidExpression(String),

    /// An enumeration directive whose principal list is empty.
    #[error("directive names no principals")]
    NoPrincipals,

    /// An action keyword outside the known set.
    #[error("unknown permission action: {0}")]
    UnknownAction(String),
}

impl From<MalformedAcl> for AuthzError {
    fn from(err: MalformedAcl) -> Self {
        AuthzError::MalformedAcl(err)
    }
}

/// A specialized Result type for ACL operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
