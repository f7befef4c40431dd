//! Engine error type.
//!
//! Errors only surface while building an engine (bad configuration, bad
//! handle). Runtime passes degrade per-feature and log instead of failing.

use wasm_bindgen::JsValue;

/// Unified error type for MentionLens.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid handle {0:?}: expected 1-39 ASCII alphanumerics or internal hyphens")]
    InvalidHandle(String),

    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid page pattern {pattern:?}: {source}")]
    InvalidPagePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn selector(selector: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<EngineError> for JsValue {
    fn from(err: EngineError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
