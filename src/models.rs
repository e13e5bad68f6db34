//! Rows exchanged with the data API

use crate::auth::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    pub id: Uuid,
    pub user_id: Identity,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the owning identity
    pub id: Identity,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Name to show next to content
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub artwork_id: Uuid,
    pub user_id: Identity,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: Identity,
    pub artwork_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: Identity,
    pub following_id: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkTag {
    pub artwork_id: Uuid,
    pub tag_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artwork_from_row_defaults() {
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "user_id": Identity::generate(),
            "title": "Harbor at dusk",
            "image_url": "https://cdn.example/artworks/a.png",
            "created_at": "2024-03-01T10:00:00+00:00",
        });

        let artwork: Artwork = serde_json::from_value(row).unwrap();
        assert_eq!(artwork.view_count, 0);
        assert!(artwork.description.is_none());
    }

    #[test]
    fn test_profile_name_prefers_display_name() {
        let mut profile = Profile {
            id: Identity::generate(),
            username: "inkwell".to_string(),
            display_name: None,
            bio: None,
            avatar_url: None,
            created_at: Utc::now(),
        };
        assert_eq!(profile.name(), "inkwell");

        profile.display_name = Some("Ink Well".to_string());
        assert_eq!(profile.name(), "Ink Well");
    }
}
