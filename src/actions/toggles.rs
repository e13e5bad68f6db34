//! Favorite and follow toggles

use crate::actions::{Actions, Optimistic};
use crate::auth::Identity;
use crate::error::{EaselError, Result};
use crate::storage::{DataStore, Filter, Table};
use crate::ui::Notification;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

/// Local favorite state of one artwork for the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteState {
    pub artwork_id: Uuid,
    pub favorited: bool,
    pub count: u64,
}

impl FavoriteState {
    pub fn new(artwork_id: Uuid, favorited: bool, count: u64) -> Self {
        Self {
            artwork_id,
            favorited,
            count,
        }
    }

    /// Current state from the backend. Read failures show as not favorited.
    pub async fn load(data: &dyn DataStore, artwork_id: Uuid, viewer: Option<Identity>) -> Self {
        let by_artwork = Filter::new().eq("artwork_id", artwork_id);
        let count = data.count(Table::Favorites, &by_artwork).await.unwrap_or(0);

        let favorited = match viewer {
            Some(viewer) => data
                .count(Table::Favorites, &by_artwork.eq("user_id", viewer))
                .await
                .map(|n| n > 0)
                .unwrap_or(false),
            None => false,
        };

        Self::new(artwork_id, favorited, count)
    }
}

impl Optimistic for FavoriteState {
    fn apply(&mut self) {
        self.favorited = !self.favorited;
        self.count = if self.favorited {
            self.count + 1
        } else {
            self.count.saturating_sub(1)
        };
    }
}

/// Local follow state of one profile for the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowState {
    pub target: Identity,
    pub following: bool,
    pub followers: u64,
}

impl FollowState {
    pub fn new(target: Identity, following: bool, followers: u64) -> Self {
        Self {
            target,
            following,
            followers,
        }
    }

    /// Current state from the backend. Read failures show as not following.
    pub async fn load(data: &dyn DataStore, target: Identity, viewer: Option<Identity>) -> Self {
        let by_target = Filter::new().eq("following_id", target);
        let followers = data.count(Table::Follows, &by_target).await.unwrap_or(0);

        let following = match viewer {
            Some(viewer) if viewer != target => data
                .count(Table::Follows, &by_target.eq("follower_id", viewer))
                .await
                .map(|n| n > 0)
                .unwrap_or(false),
            _ => false,
        };

        Self::new(target, following, followers)
    }
}

impl Optimistic for FollowState {
    fn apply(&mut self) {
        self.following = !self.following;
        self.followers = if self.following {
            self.followers + 1
        } else {
            self.followers.saturating_sub(1)
        };
    }
}

impl Actions {
    /// Favorite or unfavorite an artwork
    pub async fn toggle_favorite(&self, user: Identity, state: &mut FavoriteState) -> Result<()> {
        let artwork_id = state.artwork_id;
        let favorite = !state.favorited;
        let data = self.data.clone();

        let write = async move {
            if favorite {
                data.insert(
                    Table::Favorites,
                    json!({ "user_id": user, "artwork_id": artwork_id }),
                )
                .await
                .map(|_| ())
            } else {
                let filter = Filter::new().eq("user_id", user).eq("artwork_id", artwork_id);
                data.delete(Table::Favorites, &filter).await.map(|_| ())
            }
        };

        self.commit(state, write, "Couldn't update favorite").await?;
        debug!(artwork_id = %artwork_id, favorited = favorite, "Favorite toggled");
        Ok(())
    }

    /// Follow or unfollow a profile
    pub async fn toggle_follow(&self, user: Identity, state: &mut FollowState) -> Result<()> {
        let target = state.target;
        if target == user {
            self.notifier
                .notify(Notification::error("Can't follow", "You can't follow yourself"));
            return Err(EaselError::validation("following_id", "cannot follow yourself"));
        }

        let follow = !state.following;
        let data = self.data.clone();

        let write = async move {
            if follow {
                data.insert(
                    Table::Follows,
                    json!({ "follower_id": user, "following_id": target }),
                )
                .await
                .map(|_| ())
            } else {
                let filter = Filter::new()
                    .eq("follower_id", user)
                    .eq("following_id", target);
                data.delete(Table::Follows, &filter).await.map(|_| ())
            }
        };

        self.commit(state, write, "Couldn't update follow").await?;
        info!(follower = %user, following = %target, follow, "Follow toggled");
        Ok(())
    }
}
