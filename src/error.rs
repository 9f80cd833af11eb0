//! Error handling for the classroll core

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::attendance::BoardKey;
use crate::postgrest::ApiErrorDetails;

/// Errors raised while talking to the record store
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The store answered with a non-success status
    #[error("API error: {details} (Status: {status})")]
    Api {
        status: reqwest::StatusCode,
        details: ApiErrorDetails,
    },

    /// A store call did not resolve in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// No async runtime was available
    #[error("runtime error: {0}")]
    Runtime(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }
}

/// Failure of an attendance publish
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("a publish is already in progress")]
    Busy,

    #[error("no attendance board is loaded")]
    NotLoaded,

    #[error("board is scoped to {board}, not {requested}")]
    BoardMismatch { board: BoardKey, requested: BoardKey },

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("store write failed: {0}")]
    Store(#[from] Error),
}

/// Failure of a board or roster load
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("store read failed: {0}")]
    Store(#[from] Error),

    #[error("unsynced attendance edits for {current}")]
    UnsyncedChanges { current: BoardKey },
}

/// Failure in the class/teacher relation
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("class {0} not found")]
    ClassNotFound(String),

    #[error("store call failed: {0}")]
    Store(#[from] Error),
}
