//! Free-text tagging

use crate::actions::Actions;
use crate::models::Tag;
use crate::storage::{decode_row, StorageError, Table};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

/// Split a comma-separated tag string into normalized names.
///
/// Names are trimmed and lowercased and empty entries dropped. Duplicates
/// are kept; the store ignores repeated links.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl Actions {
    /// Link the parsed tags to an artwork, creating tags as needed.
    ///
    /// Each tag is independent: a failure is logged and the rest proceed.
    /// Returns the number of tags linked.
    pub async fn assign_tags(&self, artwork_id: Uuid, input: &str) -> usize {
        let mut linked = 0;

        for name in parse_tags(input) {
            let tag = match self
                .data
                .upsert(Table::Tags, json!({ "name": name }), "name")
                .await
                .and_then(decode_row::<Tag>)
            {
                Ok(tag) => tag,
                Err(e) => {
                    warn!(tag = %name, error = %e, "Failed to create tag");
                    continue;
                }
            };

            let link = json!({ "artwork_id": artwork_id, "tag_id": tag.id });
            match self.data.insert(Table::ArtworkTags, link).await {
                Ok(_) => linked += 1,
                Err(StorageError::Conflict { .. }) => {
                    debug!(tag = %name, "Tag already linked");
                }
                Err(e) => warn!(tag = %name, error = %e, "Failed to link tag"),
            }
        }

        linked
    }
}
