//! Read-side views: feed, artwork detail, profile page
//!
//! Reads fail closed: a failed read shows as empty or absent and is logged,
//! never surfaced as an error.

use crate::actions::{CommentThread, FavoriteState, FollowState};
use crate::auth::Identity;
use crate::models::{Artwork, ArtworkTag, Comment, Profile, Tag};
use crate::storage::{decode_row, decode_rows, DataStore, Filter, Query, StorageError, Table};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default number of artworks on the home feed
pub const DEFAULT_FEED_LIMIT: usize = 50;

/// An artwork with its author
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub artwork: Artwork,
    pub author: Option<Profile>,
}

impl FeedItem {
    /// Author name, or a placeholder if the profile is missing
    pub fn author_name(&self) -> &str {
        self.author.as_ref().map(Profile::name).unwrap_or("unknown")
    }

    /// Case-insensitive match on title, description or author name.
    /// `needle` must already be lowercase.
    fn matches(&self, needle: &str) -> bool {
        let contains = |text: &str| text.to_lowercase().contains(needle);

        contains(&self.artwork.title)
            || self.artwork.description.as_deref().is_some_and(contains)
            || self
                .author
                .as_ref()
                .is_some_and(|p| contains(&p.username) || contains(p.name()))
    }
}

/// Items matching `search`, in feed order. A blank search matches all.
pub fn filter_feed<'a>(items: &'a [FeedItem], search: &str) -> Vec<&'a FeedItem> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    items.iter().filter(|item| item.matches(&needle)).collect()
}

/// Everything the artwork page shows
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkDetail {
    pub artwork: Artwork,
    pub author: Option<Profile>,
    pub tags: Vec<Tag>,
    pub comments: CommentThread,
    /// Comment authors, in comment order
    pub commenters: Vec<Option<Profile>>,
    pub favorite: FavoriteState,
}

/// Everything the profile page shows
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub profile: Profile,
    /// Newest first
    pub artworks: Vec<Artwork>,
    pub follow: FollowState,
    pub following_count: u64,
}

/// Read access to the data API
#[derive(Clone)]
pub struct Views {
    data: Arc<dyn DataStore>,
}

impl Views {
    pub fn new(data: Arc<dyn DataStore>) -> Self {
        Self { data }
    }

    /// Newest artworks with their authors.
    ///
    /// Author profiles are fetched concurrently and matched back by
    /// position, so completion order does not matter.
    pub async fn feed(&self, limit: usize) -> Vec<FeedItem> {
        let query = Query::new().order_by("created_at", true).limit(limit);
        let artworks: Vec<Artwork> = self.read_all(Table::Artworks, &query).await;

        let mut fetches = JoinSet::new();
        for (index, artwork) in artworks.iter().enumerate() {
            let data = self.data.clone();
            let author = artwork.user_id;
            fetches.spawn(async move { (index, fetch_profile(data.as_ref(), author).await) });
        }

        let mut authors: Vec<Option<Profile>> = vec![None; artworks.len()];
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, profile)) => authors[index] = profile,
                Err(e) => warn!(error = %e, "Author fetch task failed"),
            }
        }

        debug!(count = artworks.len(), "Feed loaded");
        artworks
            .into_iter()
            .zip(authors)
            .map(|(artwork, author)| FeedItem { artwork, author })
            .collect()
    }

    /// The artwork page, or `None` if the artwork can't be read
    pub async fn artwork(&self, id: Uuid, viewer: Option<Identity>) -> Option<ArtworkDetail> {
        let artwork: Artwork = self.read_one(Table::Artworks, Filter::new().eq("id", id)).await?;

        let comments_query = Query::new()
            .eq("artwork_id", id)
            .order_by("created_at", false);
        let (author, comments, tags, favorite) = tokio::join!(
            fetch_profile(self.data.as_ref(), artwork.user_id),
            self.read_all::<Comment>(Table::Comments, &comments_query),
            self.tags(id),
            FavoriteState::load(self.data.as_ref(), id, viewer),
        );

        let mut commenters = Vec::with_capacity(comments.len());
        for comment in &comments {
            commenters.push(fetch_profile(self.data.as_ref(), comment.user_id).await);
        }

        Some(ArtworkDetail {
            artwork,
            author,
            tags,
            comments: CommentThread::new(id, comments),
            commenters,
            favorite,
        })
    }

    /// The profile page, or `None` if the profile can't be read
    pub async fn profile(&self, user: Identity, viewer: Option<Identity>) -> Option<ProfileView> {
        let profile = fetch_profile(self.data.as_ref(), user).await?;

        let artworks_query = Query::new()
            .eq("user_id", user)
            .order_by("created_at", true);
        let following = Filter::new().eq("follower_id", user);
        let (artworks, follow, following_count) = tokio::join!(
            self.read_all::<Artwork>(Table::Artworks, &artworks_query),
            FollowState::load(self.data.as_ref(), user, viewer),
            self.data.count(Table::Follows, &following),
        );

        Some(ProfileView {
            profile,
            artworks,
            follow,
            following_count: following_count.unwrap_or(0),
        })
    }

    /// Favorite state of an artwork for `viewer`
    pub async fn favorite_state(
        &self,
        artwork_id: Uuid,
        viewer: Option<Identity>,
    ) -> FavoriteState {
        FavoriteState::load(self.data.as_ref(), artwork_id, viewer).await
    }

    /// Follow state of a profile for `viewer`
    pub async fn follow_state(&self, target: Identity, viewer: Option<Identity>) -> FollowState {
        FollowState::load(self.data.as_ref(), target, viewer).await
    }

    /// Tags linked to an artwork, by name
    pub async fn tags(&self, artwork_id: Uuid) -> Vec<Tag> {
        let links: Vec<ArtworkTag> = self
            .read_all(Table::ArtworkTags, &Query::new().eq("artwork_id", artwork_id))
            .await;

        let mut tags = Vec::with_capacity(links.len());
        for link in links {
            let filter = Filter::new().eq("id", link.tag_id);
            if let Some(tag) = self.read_one(Table::Tags, filter).await {
                tags.push(tag);
            }
        }
        tags.sort_by(|a: &Tag, b: &Tag| a.name.cmp(&b.name));
        tags
    }

    async fn read_all<T: DeserializeOwned>(&self, table: Table, query: &Query) -> Vec<T> {
        match self.data.select(table, query).await.and_then(decode_rows::<T>) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table = %table, error = %e, "Read failed");
                Vec::new()
            }
        }
    }

    async fn read_one<T: DeserializeOwned>(&self, table: Table, filter: Filter) -> Option<T> {
        let query = Query::new().filter(filter).limit(1);
        self.read_all(table, &query).await.into_iter().next()
    }
}

/// A profile by identity. Missing and unreadable profiles are both `None`.
async fn fetch_profile(data: &dyn DataStore, user: Identity) -> Option<Profile> {
    let query = Query::new().eq("id", user).limit(1);
    let result: Result<Option<Profile>, StorageError> = data
        .select(Table::Profiles, &query)
        .await
        .and_then(|rows| rows.into_iter().next().map(decode_row).transpose());

    result.unwrap_or_else(|e| {
        warn!(user = %user, error = %e, "Profile fetch failed");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn seed_profile(store: &MemoryStore, username: &str, display_name: Option<&str>) -> Identity {
        let user = Identity::generate();
        store
            .seed(
                Table::Profiles,
                json!({ "id": user, "username": username, "display_name": display_name }),
            )
            .unwrap();
        user
    }

    fn seed_artwork(store: &MemoryStore, user: Identity, title: &str, created_at: &str) -> Uuid {
        let row = store
            .seed(
                Table::Artworks,
                json!({
                    "user_id": user,
                    "title": title,
                    "image_url": "memory://storage/x.png",
                    "created_at": created_at,
                }),
            )
            .unwrap();
        decode_row::<Artwork>(row).unwrap().id
    }

    #[tokio::test]
    async fn test_feed_newest_first_with_authors() {
        let store = Arc::new(MemoryStore::new());
        let ana = seed_profile(&store, "ana", Some("Ana P"));
        let ben = seed_profile(&store, "ben", None);
        seed_artwork(&store, ana, "Old", "2024-01-01T00:00:00Z");
        seed_artwork(&store, ben, "New", "2024-03-01T00:00:00Z");
        seed_artwork(&store, ana, "Mid", "2024-02-01T00:00:00Z");

        let views = Views::new(store);
        let feed = views.feed(DEFAULT_FEED_LIMIT).await;

        let titles: Vec<_> = feed.iter().map(|i| i.artwork.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Mid", "Old"]);
        let authors: Vec<_> = feed.iter().map(FeedItem::author_name).collect();
        assert_eq!(authors, vec!["ben", "Ana P", "Ana P"]);

        assert_eq!(views.feed(2).await.len(), 2);
    }

    #[tokio::test]
    async fn test_feed_missing_author() {
        let store = Arc::new(MemoryStore::new());
        seed_artwork(&store, Identity::generate(), "Orphan", "2024-01-01T00:00:00Z");

        let feed = Views::new(store).feed(10).await;
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author, None);
        assert_eq!(feed[0].author_name(), "unknown");
    }

    #[tokio::test]
    async fn test_feed_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        let ana = seed_profile(&store, "ana", None);
        seed_artwork(&store, ana, "Art", "2024-01-01T00:00:00Z");

        store.set_offline(true);
        assert!(Views::new(store).feed(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_filter_feed() {
        let store = Arc::new(MemoryStore::new());
        let ana = seed_profile(&store, "ana", Some("Ana Painter"));
        let ben = seed_profile(&store, "ben", None);
        seed_artwork(&store, ana, "Harbor at dusk", "2024-01-01T00:00:00Z");
        seed_artwork(&store, ben, "Still life", "2024-01-02T00:00:00Z");

        let feed = Views::new(store).feed(10).await;

        assert_eq!(filter_feed(&feed, "").len(), 2);
        assert_eq!(filter_feed(&feed, "  HARBOR ")[0].artwork.title, "Harbor at dusk");
        assert_eq!(filter_feed(&feed, "painter")[0].artwork.title, "Harbor at dusk");
        assert_eq!(filter_feed(&feed, "ben")[0].artwork.title, "Still life");
        assert!(filter_feed(&feed, "sculpture").is_empty());
    }

    #[tokio::test]
    async fn test_artwork_detail() {
        let store = Arc::new(MemoryStore::new());
        let ana = seed_profile(&store, "ana", None);
        let ben = seed_profile(&store, "ben", None);
        let id = seed_artwork(&store, ana, "Harbor", "2024-01-01T00:00:00Z");

        for (user, content, at) in [
            (ben, "second", "2024-01-03T00:00:00Z"),
            (ana, "first", "2024-01-02T00:00:00Z"),
        ] {
            let row = json!({
                "artwork_id": id,
                "user_id": user,
                "content": content,
                "created_at": at,
            });
            store.seed(Table::Comments, row).unwrap();
        }
        let tag = store.seed(Table::Tags, json!({ "name": "sea" })).unwrap();
        store
            .seed(Table::ArtworkTags, json!({ "artwork_id": id, "tag_id": tag["id"] }))
            .unwrap();
        store
            .seed(Table::Favorites, json!({ "user_id": ben, "artwork_id": id }))
            .unwrap();

        let detail = Views::new(store).artwork(id, Some(ben)).await.unwrap();

        assert_eq!(detail.artwork.title, "Harbor");
        assert_eq!(detail.author.unwrap().username, "ana");
        let contents: Vec<_> = detail
            .comments
            .comments
            .iter()
            .map(|c| c.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
        let commenters: Vec<_> = detail
            .commenters
            .iter()
            .map(|p| p.as_ref().map(|p| p.username.as_str()))
            .collect();
        assert_eq!(commenters, vec![Some("ana"), Some("ben")]);
        assert_eq!(detail.tags.len(), 1);
        assert_eq!(detail.tags[0].name, "sea");
        assert_eq!(detail.favorite, FavoriteState::new(id, true, 1));
    }

    #[tokio::test]
    async fn test_artwork_detail_missing() {
        let store = Arc::new(MemoryStore::new());
        assert!(Views::new(store).artwork(Uuid::new_v4(), None).await.is_none());
    }

    #[tokio::test]
    async fn test_profile_view() {
        let store = Arc::new(MemoryStore::new());
        let ana = seed_profile(&store, "ana", None);
        let ben = seed_profile(&store, "ben", None);
        seed_artwork(&store, ana, "One", "2024-01-01T00:00:00Z");
        seed_artwork(&store, ana, "Two", "2024-02-01T00:00:00Z");
        store
            .seed(Table::Follows, json!({ "follower_id": ben, "following_id": ana }))
            .unwrap();
        store
            .seed(Table::Follows, json!({ "follower_id": ana, "following_id": ben }))
            .unwrap();

        let view = Views::new(store).profile(ana, Some(ben)).await.unwrap();

        let titles: Vec<_> = view.artworks.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Two", "One"]);
        assert_eq!(view.follow, FollowState::new(ana, true, 1));
        assert_eq!(view.following_count, 1);
    }
}
