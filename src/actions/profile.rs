//! Profile edits

use crate::actions::upload::object_key;
use crate::actions::Actions;
use crate::auth::Identity;
use crate::error::Result;
use crate::models::Profile;
use crate::storage::{decode_row, Filter, StorageError, Table};
use crate::ui::Notification;
use serde_json::{json, Map, Value};
use tracing::info;

/// Fields to change on a profile; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    /// New avatar as (file name, bytes)
    pub avatar: Option<(String, Vec<u8>)>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar.is_none()
    }
}

/// Trimmed text, with blank mapped to null
fn optional_text(value: &str) -> Value {
    match value.trim() {
        "" => Value::Null,
        text => json!(text),
    }
}

impl Actions {
    /// Create the profile row for a newly signed-up user
    pub async fn create_profile(&self, user: Identity, username: &str) -> Result<Profile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(self.invalid("username", "Username is required"));
        }

        let stored = match self
            .data
            .insert(Table::Profiles, json!({ "id": user, "username": username }))
            .await
        {
            Ok(stored) => stored,
            Err(StorageError::Conflict { .. }) => {
                return Err(self.invalid("username", "Username is already taken"));
            }
            Err(e) => return Err(self.write_failed("Couldn't create profile", e)),
        };

        info!(user = %user, username, "Profile created");
        Ok(decode_row(stored)?)
    }

    /// Apply `update` to the user's profile and to `profile` once stored
    pub async fn update_profile(
        &self,
        user: Identity,
        profile: &mut Profile,
        update: ProfileUpdate,
    ) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut patch = Map::new();
        if let Some(username) = &update.username {
            let username = username.trim();
            if username.is_empty() {
                return Err(self.invalid("username", "Username is required"));
            }
            patch.insert("username".to_string(), json!(username));
        }
        if let Some(display_name) = &update.display_name {
            patch.insert("display_name".to_string(), optional_text(display_name));
        }
        if let Some(bio) = &update.bio {
            patch.insert("bio".to_string(), optional_text(bio));
        }

        if let Some((file_name, bytes)) = update.avatar {
            let key = object_key(user, &file_name);
            let url = self
                .objects
                .upload_object(&self.avatar_bucket, &key, bytes)
                .await
                .map_err(|e| self.write_failed("Couldn't upload avatar", e))?;
            patch.insert("avatar_url".to_string(), json!(url));
        }

        let filter = Filter::new().eq("id", user);
        match self
            .data
            .update(Table::Profiles, &filter, Value::Object(patch.clone()))
            .await
        {
            Ok(0) => {
                let e = StorageError::NotFound(format!("Profile not found: {}", user));
                return Err(self.write_failed("Couldn't update profile", e));
            }
            Ok(_) => {}
            Err(StorageError::Conflict { .. }) => {
                return Err(self.invalid("username", "Username is already taken"));
            }
            Err(e) => return Err(self.write_failed("Couldn't update profile", e)),
        }

        let mut current = serde_json::to_value(&*profile)?;
        if let Some(object) = current.as_object_mut() {
            object.extend(patch);
        }
        *profile = decode_row(current)?;

        info!(user = %user, "Profile updated");
        self.notifier
            .notify(Notification::info("Profile updated", profile.name().to_string()));
        Ok(())
    }
}
