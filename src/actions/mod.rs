//! Mutation actions
//!
//! Every action is one remote write around a local state change. Toggles
//! apply the change first and restore the previous state if the write fails;
//! the restore lives next to the apply in `commit`. Failures are shown as a
//! notification and also returned to the caller.

mod comments;
mod profile;
mod tags;
mod toggles;
mod upload;

pub use comments::CommentThread;
pub use profile::ProfileUpdate;
pub use tags::parse_tags;
pub use toggles::{FavoriteState, FollowState};
pub use upload::UploadRequest;

use crate::config::EaselConfig;
use crate::error::Result;
use crate::storage::{DataStore, ObjectStore, StorageError};
use crate::ui::{Notification, Notifier};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Local state with a provisional change
pub trait Optimistic: Clone {
    /// Apply the provisional change
    fn apply(&mut self);
}

/// Issues writes on behalf of the signed-in user
#[derive(Clone)]
pub struct Actions {
    data: Arc<dyn DataStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    max_comment_len: usize,
    artwork_bucket: String,
    avatar_bucket: String,
}

impl Actions {
    pub fn new(
        data: Arc<dyn DataStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        config: &EaselConfig,
    ) -> Self {
        Self {
            data,
            objects,
            notifier,
            max_comment_len: config.max_comment_len,
            artwork_bucket: config.artwork_bucket.clone(),
            avatar_bucket: config.avatar_bucket.clone(),
        }
    }

    /// Record one view of an artwork. Failures are logged only.
    pub async fn record_view(&self, artwork_id: Uuid) {
        if let Err(e) = self.data.increment_view_count(artwork_id).await {
            warn!(artwork_id = %artwork_id, error = %e, "Failed to record view");
        }
    }

    /// Apply `state`'s provisional change, run `write`, restore on failure
    async fn commit<S, F>(&self, state: &mut S, write: F, failure: &str) -> Result<()>
    where
        S: Optimistic + Send,
        F: Future<Output = std::result::Result<(), StorageError>> + Send,
    {
        let before = state.clone();
        state.apply();

        match write.await {
            Ok(()) => Ok(()),
            Err(e) => {
                *state = before;
                warn!(error = %e, "{}", failure);
                self.notifier.notify(Notification::error(failure, e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Show a write failure and convert it
    fn write_failed(&self, title: &str, e: StorageError) -> crate::error::EaselError {
        warn!(error = %e, "{}", title);
        self.notifier.notify(Notification::error(title, e.to_string()));
        e.into()
    }

    /// Show a validation failure and convert it
    fn invalid(&self, field: &str, message: &str) -> crate::error::EaselError {
        self.notifier.notify(Notification::field(field, message));
        crate::error::EaselError::validation(field, message)
    }
}
