//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Store;
use crate::services::{ImageHost, SessionVerifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Configuration is fixed at
/// startup; the store and image host are trait objects so tests can swap in
/// the in-memory store and a fake host.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    store: Arc<dyn Store>,
    images: Arc<dyn ImageHost>,
    sessions: SessionVerifier,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ApiConfig, store: Arc<dyn Store>, images: Arc<dyn ImageHost>) -> Self {
        let sessions = SessionVerifier::new(config.session_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                images,
                sessions,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the persistent store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the product image host.
    #[must_use]
    pub fn images(&self) -> &dyn ImageHost {
        self.inner.images.as_ref()
    }

    /// Get a reference to the session token verifier.
    #[must_use]
    pub fn sessions(&self) -> &SessionVerifier {
        &self.inner.sessions
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("sessions", &self.inner.sessions)
            .finish_non_exhaustive()
    }
}
