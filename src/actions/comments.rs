//! Comment threads

use crate::actions::{Actions, Optimistic};
use crate::auth::Identity;
use crate::error::{EaselError, Result};
use crate::models::Comment;
use crate::storage::{decode_row, Filter, Table};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Comments of one artwork, oldest first
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentThread {
    pub artwork_id: Uuid,
    pub comments: Vec<Comment>,
    pending_removal: Option<Uuid>,
}

impl CommentThread {
    pub fn new(artwork_id: Uuid, comments: Vec<Comment>) -> Self {
        Self {
            artwork_id,
            comments,
            pending_removal: None,
        }
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

impl Optimistic for CommentThread {
    fn apply(&mut self) {
        if let Some(id) = self.pending_removal.take() {
            self.comments.retain(|c| c.id != id);
        }
    }
}

impl Actions {
    /// Post a comment and append it to the thread once stored
    pub async fn post_comment(
        &self,
        user: Identity,
        thread: &mut CommentThread,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(self.invalid("content", "Comment cannot be empty"));
        }
        if content.chars().count() > self.max_comment_len {
            let message = format!("Comment must be at most {} characters", self.max_comment_len);
            return Err(self.invalid("content", &message));
        }

        let row = json!({
            "artwork_id": thread.artwork_id,
            "user_id": user,
            "content": content,
        });
        let stored = self
            .data
            .insert(Table::Comments, row)
            .await
            .map_err(|e| self.write_failed("Couldn't post comment", e))?;

        let comment: Comment = decode_row(stored)?;
        info!(artwork_id = %thread.artwork_id, comment_id = %comment.id, "Comment posted");
        thread.comments.push(comment.clone());
        Ok(comment)
    }

    /// Delete one of the user's own comments
    pub async fn delete_comment(
        &self,
        user: Identity,
        thread: &mut CommentThread,
        comment_id: Uuid,
    ) -> Result<()> {
        let owned = thread
            .comments
            .iter()
            .any(|c| c.id == comment_id && c.user_id == user);
        if !owned {
            return Err(EaselError::AccessDenied(
                "only the author can delete a comment".to_string(),
            ));
        }

        let data = self.data.clone();
        let filter = Filter::new().eq("id", comment_id).eq("user_id", user);
        let write = async move { data.delete(Table::Comments, &filter).await.map(|_| ()) };

        thread.pending_removal = Some(comment_id);
        let result = self.commit(thread, write, "Couldn't delete comment").await;
        thread.pending_removal = None;
        result
    }
}
