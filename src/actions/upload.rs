//! Artwork upload

use crate::actions::Actions;
use crate::auth::Identity;
use crate::error::Result;
use crate::models::Artwork;
use crate::storage::{decode_row, Table};
use crate::ui::Notification;
use serde_json::json;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// A new artwork as entered in the upload form
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub title: String,
    pub description: Option<String>,
    /// Original file name, used for the extension
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Comma-separated tags
    pub tags: String,
}

impl UploadRequest {
    pub fn new(title: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            title: title.into(),
            file_name: file_name.into(),
            bytes,
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }
}

/// Lowercased extension of `file_name`, `png` if it has none
pub(crate) fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string())
}

/// Object key for a user's upload: `<user>/<random>.<ext>`
pub(crate) fn object_key(user: Identity, file_name: &str) -> String {
    format!("{}/{}.{}", user, Uuid::new_v4(), extension(file_name))
}

impl Actions {
    /// Upload the image, create the artwork row and tag it
    pub async fn upload_artwork(&self, user: Identity, request: UploadRequest) -> Result<Artwork> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(self.invalid("title", "Title is required"));
        }
        if request.bytes.is_empty() {
            return Err(self.invalid("image", "Choose an image to upload"));
        }

        let key = object_key(user, &request.file_name);
        let image_url = self
            .objects
            .upload_object(&self.artwork_bucket, &key, request.bytes)
            .await
            .map_err(|e| self.write_failed("Upload failed", e))?;

        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let row = json!({
            "user_id": user,
            "title": title,
            "description": description,
            "image_url": image_url,
        });
        let stored = self
            .data
            .insert(Table::Artworks, row)
            .await
            .map_err(|e| self.write_failed("Upload failed", e))?;
        let artwork: Artwork = decode_row(stored)?;

        let tagged = self.assign_tags(artwork.id, &request.tags).await;
        info!(artwork_id = %artwork.id, user = %user, tagged, "Artwork uploaded");

        self.notifier
            .notify(Notification::info("Artwork uploaded", artwork.title.clone()));
        Ok(artwork)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EaselConfig;
    use crate::error::EaselError;
    use crate::storage::MemoryStore;
    use crate::ui::{EventLog, NotificationLevel};
    use std::sync::Arc;

    fn actions(store: &Arc<MemoryStore>) -> (Actions, EventLog) {
        let log = EventLog::new();
        let actions = Actions::new(
            store.clone(),
            store.clone(),
            Arc::new(log.clone()),
            &EaselConfig::default(),
        );
        (actions, log)
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("sunset.PNG"), "png");
        assert_eq!(extension("archive.tar.gz"), "gz");
        assert_eq!(extension("noext"), "png");
        assert_eq!(extension(""), "png");
    }

    #[test]
    fn test_object_key_is_scoped_to_user() {
        let user = Identity::generate();
        let key = object_key(user, "cat.jpg");
        let (owner, file) = key.split_once('/').unwrap();

        assert_eq!(owner, user.to_string());
        assert!(file.ends_with(".jpg"));
        assert!(Uuid::parse_str(file.trim_end_matches(".jpg")).is_ok());
    }

    #[tokio::test]
    async fn test_upload_artwork() {
        let store = Arc::new(MemoryStore::with_public_url("https://cdn.test"));
        let (actions, log) = actions(&store);
        let user = Identity::generate();

        let request = UploadRequest::new(" Harbor ", "harbor.webp", vec![1, 2, 3])
            .description("  ")
            .tags("sea, boats");
        let artwork = actions.upload_artwork(user, request).await.unwrap();

        assert_eq!(artwork.title, "Harbor");
        assert_eq!(artwork.user_id, user);
        assert_eq!(artwork.description, None);
        assert_eq!(artwork.view_count, 0);

        let prefix = format!("https://cdn.test/artworks/{}/", user);
        assert!(artwork.image_url.starts_with(&prefix));
        let key = artwork.image_url.trim_start_matches("https://cdn.test/artworks/");
        assert_eq!(store.object("artworks", key), Some(vec![1, 2, 3]));

        assert_eq!(store.rows(Table::ArtworkTags).len(), 2);
        let notifications = log.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Info);
    }

    #[tokio::test]
    async fn test_upload_requires_title_and_image() {
        let store = Arc::new(MemoryStore::new());
        let (actions, log) = actions(&store);
        let user = Identity::generate();

        let untitled = UploadRequest::new("  ", "a.png", vec![1]);
        assert!(matches!(
            actions.upload_artwork(user, untitled).await,
            Err(EaselError::Validation { ref field, .. }) if field == "title"
        ));

        let empty = UploadRequest::new("Title", "a.png", Vec::new());
        assert!(matches!(
            actions.upload_artwork(user, empty).await,
            Err(EaselError::Validation { ref field, .. }) if field == "image"
        ));

        assert_eq!(store.write_count(), 0);
        assert!(store.rows(Table::Artworks).is_empty());
        assert_eq!(log.notifications().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_notifies() {
        let store = Arc::new(MemoryStore::new());
        let (actions, log) = actions(&store);

        store.set_offline(true);
        let request = UploadRequest::new("Title", "a.png", vec![1]);
        let result = actions.upload_artwork(Identity::generate(), request).await;

        assert!(matches!(result, Err(EaselError::Storage(_))));
        let notifications = log.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Error);
    }
}
