//! HTTP adapter: conversation page and JSON API

pub mod health;
pub mod page;
pub mod turn;

use std::sync::{Arc, RwLock};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::persona::{PersonaDocuments, PersonaStore};
use crate::pipeline::TurnPipeline;
use crate::session::Session;

pub use turn::MAX_RECORDING_BYTES;

/// Shared state for API handlers
pub struct ApiState {
    pub pipeline: Arc<TurnPipeline>,
    pub store: Arc<PersonaStore>,

    /// The single active conversation
    ///
    /// Held for the whole of a pipeline run; handlers that mutate it use
    /// `try_lock` so overlapping submissions are refused instead of queued.
    pub session: Mutex<Session>,

    /// Documents the active session was started from
    pub documents: RwLock<Arc<PersonaDocuments>>,
}

impl ApiState {
    /// Load the persona documents and open the first session
    ///
    /// # Errors
    ///
    /// Returns `Error::DataLoad` if either document cannot be loaded
    pub fn new(pipeline: Arc<TurnPipeline>, store: Arc<PersonaStore>) -> Result<Self> {
        let documents = store.load()?;
        let session = Session::for_persona(&documents);
        Ok(Self {
            pipeline,
            store,
            session: Mutex::new(session),
            documents: RwLock::new(documents),
        })
    }

    /// Documents behind the active session
    #[must_use]
    pub fn documents(&self) -> Arc<PersonaDocuments> {
        self.documents
            .read()
            .map(|d| Arc::clone(&d))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    pub(crate) fn set_documents(&self, documents: Arc<PersonaDocuments>) {
        match self.documents.write() {
            Ok(mut guard) => *guard = documents,
            Err(poisoned) => *poisoned.into_inner() = documents,
        }
    }
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(page::router(state.clone()))
        .nest("/api", turn::router(state))
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Run the API server until the process is stopped
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
