//! Developer console
//!
//! Only reachable through [`crate::Easel::open_console`], which runs the
//! console gate first.

use crate::auth::{Identity, Role, RoleSet};
use crate::error::Result;
use crate::storage::{decode_rows, DataStore, Filter, Query, RoleStore, Table};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Row counts across the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsoleStats {
    pub artworks: u64,
    pub profiles: u64,
    pub comments: u64,
    pub favorites: u64,
    pub follows: u64,
    pub tags: u64,
}

impl fmt::Display for ConsoleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "artworks:  {}", self.artworks)?;
        writeln!(f, "profiles:  {}", self.profiles)?;
        writeln!(f, "comments:  {}", self.comments)?;
        writeln!(f, "favorites: {}", self.favorites)?;
        writeln!(f, "follows:   {}", self.follows)?;
        write!(f, "tags:      {}", self.tags)
    }
}

/// Console operations for developers and admins
#[derive(Clone)]
pub struct DevConsole {
    data: Arc<dyn DataStore>,
    roles: Arc<dyn RoleStore>,
}

impl DevConsole {
    pub(crate) fn new(data: Arc<dyn DataStore>, roles: Arc<dyn RoleStore>) -> Self {
        Self { data, roles }
    }

    pub async fn stats(&self) -> Result<ConsoleStats> {
        let all = Filter::new();
        let (artworks, profiles, comments, favorites, follows, tags) = tokio::try_join!(
            self.data.count(Table::Artworks, &all),
            self.data.count(Table::Profiles, &all),
            self.data.count(Table::Comments, &all),
            self.data.count(Table::Favorites, &all),
            self.data.count(Table::Follows, &all),
            self.data.count(Table::Tags, &all),
        )?;

        Ok(ConsoleStats {
            artworks,
            profiles,
            comments,
            favorites,
            follows,
            tags,
        })
    }

    /// Roles currently held by `user`
    pub async fn roles_of(&self, user: Identity) -> Result<RoleSet> {
        let rows = self.roles.list_roles(&user).await?;
        Ok(RoleSet::from_rows(&rows))
    }

    /// Every user holding `role`
    pub async fn holders(&self, role: Role) -> Result<Vec<Identity>> {
        let rows = self
            .data
            .select(Table::UserRoles, &Query::new().eq("role", role))
            .await?;
        let rows: Vec<crate::auth::RoleRow> = decode_rows(rows)?;
        let mut users: Vec<Identity> = rows.into_iter().map(|r| r.user_id).collect();
        users.sort();
        users.dedup();
        Ok(users)
    }

    pub async fn grant(&self, user: Identity, role: Role) -> Result<()> {
        self.roles.assign_role(&user, role).await?;
        info!(user = %user, role = %role, "Role granted");
        Ok(())
    }

    pub async fn revoke(&self, user: Identity, role: Role) -> Result<()> {
        self.roles.revoke_role(&user, role).await?;
        info!(user = %user, role = %role, "Role revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn console(store: &Arc<MemoryStore>) -> DevConsole {
        DevConsole::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_stats() {
        let store = Arc::new(MemoryStore::new());
        store.seed(Table::Tags, json!({ "name": "ink" })).unwrap();
        store.seed(Table::Tags, json!({ "name": "oil" })).unwrap();

        let stats = console(&store).stats().await.unwrap();
        assert_eq!(
            stats,
            ConsoleStats {
                tags: 2,
                ..ConsoleStats::default()
            }
        );
    }

    #[tokio::test]
    async fn test_stats_propagates_failure() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        assert!(console(&store).stats().await.is_err());
    }

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let store = Arc::new(MemoryStore::new());
        let console = console(&store);
        let user = Identity::generate();

        console.grant(user, Role::Moderator).await.unwrap();
        console.grant(user, Role::Moderator).await.unwrap();
        assert!(console.roles_of(user).await.unwrap().is_moderator());
        assert_eq!(console.holders(Role::Moderator).await.unwrap(), vec![user]);

        console.revoke(user, Role::Moderator).await.unwrap();
        assert!(console.roles_of(user).await.unwrap().is_empty());
        assert!(console.holders(Role::Moderator).await.unwrap().is_empty());
    }
}
