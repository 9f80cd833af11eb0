//! Classroll core library
//!
//! Attendance reconciliation and asynchronous feedback for a class
//! management backend. Attendance is marked on an in-memory board, then
//! published as one batch upsert covering the whole roster; class and
//! teacher records are kept consistent by an explicit cascade.

pub mod attendance;
pub mod config;
pub mod directory;
pub mod error;
pub mod feedback;
pub mod fetch;
pub mod integrity;
pub mod models;
pub mod postgrest;
pub mod store;

use reqwest::Client;
use std::sync::Arc;
use url::Url;

use crate::attendance::AttendanceSession;
use crate::config::ClientOptions;
use crate::directory::Directory;
use crate::error::Error;
use crate::feedback::Feedback;
use crate::integrity::Integrity;
use crate::postgrest::PostgrestStore;
use crate::store::RecordStore;

pub use crate::error::{IntegrityError, LoadError, SyncError};

/// The main entry point for the classroll core
pub struct Classroll {
    /// Backing record store
    store: Arc<dyn RecordStore>,
    /// Client options
    pub options: ClientOptions,
}

impl Classroll {
    /// Create a client for a PostgREST backend
    ///
    /// # Example
    ///
    /// ```no_run
    /// use classroll::Classroll;
    ///
    /// # fn main() -> Result<(), classroll::error::Error> {
    /// let classroll = Classroll::new("https://your-project-url.supabase.co", "your-anon-key")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(url: &str, key: &str) -> Result<Self, Error> {
        Self::new_with_options(url, key, ClientOptions::default())
    }

    /// Create a client for a PostgREST backend with custom options
    pub fn new_with_options(url: &str, key: &str, options: ClientOptions) -> Result<Self, Error> {
        Url::parse(url)?;
        let mut builder = Client::builder();
        if let Some(limit) = options.request_timeout {
            builder = builder.timeout(limit);
        }
        let client = builder.build()?;

        let store = PostgrestStore::new(url, key, client, &options);
        Ok(Self::with_store(Arc::new(store), options))
    }

    /// Use any [`RecordStore`], such as [`store::MemoryStore`]
    pub fn with_store(store: Arc<dyn RecordStore>, options: ClientOptions) -> Self {
        Self { store, options }
    }

    /// Create a client from `CLASSROLL_URL` and `CLASSROLL_KEY`
    pub fn from_env() -> Result<Self, Error> {
        let url = std::env::var("CLASSROLL_URL")
            .map_err(|_| Error::general("CLASSROLL_URL is not set"))?;
        let key = std::env::var("CLASSROLL_KEY")
            .map_err(|_| Error::general("CLASSROLL_KEY is not set"))?;
        Self::new(&url, &key)
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    /// Mount the feedback context for one session; needs a tokio runtime
    pub fn mount_feedback(&self) -> Result<Feedback, Error> {
        Feedback::mount(&self.options)
    }

    pub fn attendance(&self, feedback: &Feedback) -> AttendanceSession {
        AttendanceSession::new(self.store.clone(), feedback.clone(), &self.options)
    }

    pub fn integrity(&self, feedback: &Feedback) -> Integrity {
        Integrity::new(self.store.clone(), feedback.clone(), &self.options)
    }

    pub fn directory(&self, feedback: &Feedback) -> Directory {
        Directory::new(self.store.clone(), feedback.clone(), &self.options)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::attendance::{AttendanceStatus, BoardKey, LoadOutcome};
    pub use crate::config::{ClientOptions, UnsyncedPolicy};
    pub use crate::error::Error;
    pub use crate::feedback::{Category, Feedback};
    pub use crate::integrity::CascadeOutcome;
    pub use crate::Classroll;
}
