//! Types for the PostgREST adapter

use serde::Deserialize;
use std::fmt;

/// Error body returned by PostgREST on a failed request
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl ApiErrorDetails {
    /// Parse an error body, keeping the raw text as the message when it is not JSON
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            message: Some(body.to_string()),
            ..Self::default()
        })
    }
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Prefer value asking the service not to echo written rows
pub const RETURN_MINIMAL: &str = "return=minimal";
