/// Per-quiz player cursors.
pub mod progress;
/// Quiz lifecycle transitions.
pub mod quiz_machine;
mod sse;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::quiz_store::QuizStore, error::ServiceError};

pub use self::progress::{ProgressRecord, ProgressStore, QuizProgress};
pub use self::sse::{ProgressBroadcaster, SseHub};

/// State handle shared by every handler.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, per-quiz progress and broadcast topics.
pub struct AppState {
    quiz_store: RwLock<Option<Arc<dyn QuizStore>>>,
    degraded: watch::Sender<bool>,
    progress: ProgressStore,
    broadcaster: ProgressBroadcaster,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            quiz_store: RwLock::new(None),
            degraded: degraded_tx,
            progress: ProgressStore::new(),
            broadcaster: ProgressBroadcaster::new(config.broadcast_capacity()),
            config,
        })
    }

    /// Shortcut for an application state already backed by `store`.
    pub async fn with_store(config: AppConfig, store: Arc<dyn QuizStore>) -> SharedState {
        let state = Self::new(config);
        state.set_quiz_store(store).await;
        state
    }

    /// Obtain a handle to the current quiz store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.quiz_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current quiz store, or [`ServiceError::Degraded`] when none is usable.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new quiz store implementation and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.quiz_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Per-quiz player cursors.
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Per-quiz progress topics.
    pub fn broadcaster(&self) -> &ProgressBroadcaster {
        &self.broadcaster
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
