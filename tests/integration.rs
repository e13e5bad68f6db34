//! End-to-end scenarios against the in-memory backend

use easel::access::{AccessGate, Decision, Requirement, RoleResolver, RoleState};
use easel::actions::{CommentThread, FavoriteState};
use easel::auth::{Identity, Role, RoleSet};
use easel::session::{SessionProvider, SessionState};
use easel::storage::{MemoryStore, Table};
use easel::ui::{EventLog, NotificationLevel, Route, UiEvent};
use easel::{Easel, EaselConfig, EaselError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    store: Arc<MemoryStore>,
    session: SessionProvider,
    resolver: RoleResolver,
    log: EventLog,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let session = SessionProvider::new(store.clone(), WAIT);
        let resolver = RoleResolver::new(store.clone(), WAIT);
        resolver.follow_session(session.subscribe());

        Self {
            store,
            session,
            resolver,
            log: EventLog::new(),
        }
    }

    fn console_gate(&self) -> easel::access::GateHandle {
        AccessGate::new(
            Requirement::console(),
            Arc::new(self.log.clone()),
            Arc::new(self.log.clone()),
        )
        .watch(self.session.subscribe(), self.resolver.subscribe())
    }
}

#[tokio::test]
async fn test_resolved_roles_match_stored_rows() {
    let h = Harness::new();
    let user = Identity::generate();
    h.store.seed_roles(user, &[Role::Developer, Role::Moderator]);

    h.session.signed_in(user);
    let snapshot = timeout(WAIT, h.resolver.settled_for(user)).await.unwrap();

    let expected: RoleSet = [Role::Developer, Role::Moderator].into_iter().collect();
    assert_eq!(snapshot.roles, expected);
    assert!(!snapshot.loading);
    assert!(h.resolver.is_developer());
    assert!(h.resolver.is_moderator());
    assert!(!h.resolver.is_admin());
}

#[tokio::test]
async fn test_signed_out_gate_pending_then_sign_in() {
    let h = Harness::new();
    let gate = h.console_gate();

    // The session has not been looked up yet
    tokio::task::yield_now().await;
    assert_eq!(gate.decision(), Decision::Pending);
    assert!(h.log.events().is_empty());

    h.session.load().await;
    let decision = timeout(WAIT, gate.decided()).await.unwrap();

    assert_eq!(decision, Decision::SignInRequired);
    assert_eq!(h.log.events(), vec![UiEvent::Navigated(Route::SignIn)]);
}

#[tokio::test]
async fn test_admin_granted_without_notification() {
    let h = Harness::new();
    let admin = Identity::generate();
    h.store.seed_roles(admin, &[Role::Admin]);
    h.store.set_current_identity(Some(admin));

    let gate = h.console_gate();
    h.session.load().await;

    assert_eq!(timeout(WAIT, gate.decided()).await.unwrap(), Decision::Granted);
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn test_plain_user_denied_exactly_once() {
    let h = Harness::new();
    let user = Identity::generate();
    h.store.seed_roles(user, &[Role::User]);
    h.store.set_current_identity(Some(user));

    let gate = h.console_gate();
    h.session.load().await;

    let decision = timeout(WAIT, gate.decided()).await.unwrap();
    assert_eq!(decision, Decision::InsufficientPrivilege);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let notifications = h.log.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert_eq!(h.log.navigations(), vec![Route::Home]);
}

#[tokio::test]
async fn test_reevaluation_with_same_inputs_denies_once() {
    let log = EventLog::new();
    let user = Identity::generate();
    let plain = RoleState::Resolved {
        identity: user,
        generation: 1,
        roles: [Role::User].into_iter().collect(),
    };
    let (session_tx, session_rx) = watch::channel(SessionState::Resolved(Some(user)));
    let (roles_tx, roles_rx) = watch::channel(plain.clone());

    let gate = AccessGate::new(
        Requirement::console(),
        Arc::new(log.clone()),
        Arc::new(log.clone()),
    )
    .watch(session_rx, roles_rx);
    let mut decisions = gate.subscribe();
    assert_eq!(
        timeout(WAIT, gate.decided()).await.unwrap(),
        Decision::InsufficientPrivilege
    );

    // Each round forces the gate through Pending and back to the same denial
    for _ in 0..3 {
        session_tx.send_replace(SessionState::Resolving);
        timeout(WAIT, decisions.wait_for(|d| *d == Decision::Pending))
            .await
            .unwrap()
            .unwrap();

        session_tx.send_replace(SessionState::Resolved(Some(user)));
        roles_tx.send_replace(plain.clone());
        timeout(WAIT, decisions.wait_for(|d| *d == Decision::InsufficientPrivilege))
            .await
            .unwrap()
            .unwrap();
    }

    assert_eq!(log.notifications().len(), 1);
    assert_eq!(log.navigations(), vec![Route::Home]);

    // A fresh fetch for the same identity is a new cycle
    roles_tx.send_replace(RoleState::Fetching {
        identity: user,
        generation: 2,
    });
    timeout(WAIT, decisions.wait_for(|d| *d == Decision::Pending))
        .await
        .unwrap()
        .unwrap();
    roles_tx.send_replace(RoleState::Resolved {
        identity: user,
        generation: 2,
        roles: [Role::User].into_iter().collect(),
    });
    timeout(WAIT, decisions.wait_for(|d| *d == Decision::InsufficientPrivilege))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(log.notifications().len(), 2);
}

#[tokio::test]
async fn test_gate_waits_for_roles_before_denying() {
    let h = Harness::new();
    let dev = Identity::generate();
    h.store.seed_roles(dev, &[Role::Developer]);
    let hold = h.store.hold_roles(dev);

    let gate = h.console_gate();
    h.session.signed_in(dev);

    // Roles are still in flight: nothing may happen
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.resolver.snapshot().loading);
    assert_eq!(gate.decision(), Decision::Pending);
    assert!(h.log.events().is_empty());

    hold.release();
    assert_eq!(timeout(WAIT, gate.decided()).await.unwrap(), Decision::Granted);
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn test_empty_comment_rejected_without_write() {
    let store = Arc::new(MemoryStore::new());
    let log = EventLog::new();
    let easel = Easel::new(
        store.clone(),
        EaselConfig::default(),
        Arc::new(log.clone()),
        Arc::new(log.clone()),
    );
    let mut thread = CommentThread::new(uuid::Uuid::new_v4(), Vec::new());

    let result = easel
        .actions()
        .post_comment(Identity::generate(), &mut thread, "")
        .await;

    assert!(matches!(result, Err(EaselError::Validation { .. })));
    assert_eq!(store.write_count(), 0);
    let notifications = log.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].field.as_deref(), Some("content"));
}

#[tokio::test]
async fn test_offline_favorite_keeps_previous_state() {
    let store = Arc::new(MemoryStore::new());
    let log = EventLog::new();
    let easel = Easel::new(
        store.clone(),
        EaselConfig::default(),
        Arc::new(log.clone()),
        Arc::new(log.clone()),
    );
    let user = Identity::generate();
    let artwork = uuid::Uuid::new_v4();
    for _ in 0..2 {
        store
            .seed(
                Table::Favorites,
                json!({ "user_id": Identity::generate(), "artwork_id": artwork }),
            )
            .unwrap();
    }

    let mut state = easel.views().favorite_state(artwork, Some(user)).await;
    assert_eq!(state, FavoriteState::new(artwork, false, 2));

    store.set_offline(true);
    assert!(easel.actions().toggle_favorite(user, &mut state).await.is_err());

    assert_eq!(state, FavoriteState::new(artwork, false, 2));
    assert_eq!(log.notifications().len(), 1);
    assert_eq!(log.notifications()[0].level, NotificationLevel::Error);
}

#[tokio::test]
async fn test_upload_then_browse() {
    let store = Arc::new(MemoryStore::new());
    let log = EventLog::new();
    let easel = Easel::new(
        store.clone(),
        EaselConfig::default(),
        Arc::new(log.clone()),
        Arc::new(log.clone()),
    );
    let artist = Identity::generate();
    store.set_current_identity(Some(artist));
    assert_eq!(easel.start().await, Some(artist));

    easel.actions().create_profile(artist, "ana").await.unwrap();
    let request = easel::actions::UploadRequest::new("Harbor", "harbor.png", vec![7; 16])
        .description("Boats at dusk")
        .tags("Sea, boats, sea");
    let artwork = easel.actions().upload_artwork(artist, request).await.unwrap();

    let feed = easel.views().feed(10).await;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].author_name(), "ana");
    assert_eq!(easel::feed::filter_feed(&feed, "DUSK").len(), 1);

    let detail = easel.open_artwork(artwork.id).await.unwrap();
    let tags: Vec<_> = detail.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tags, vec!["boats", "sea"]);

    // The view was recorded after the page loaded
    let reloaded = easel.views().artwork(artwork.id, None).await.unwrap();
    assert_eq!(reloaded.artwork.view_count, 1);

    let mut thread = detail.comments;
    easel
        .actions()
        .post_comment(artist, &mut thread, "First!")
        .await
        .unwrap();
    assert_eq!(thread.len(), 1);

    easel.shutdown();
}

#[tokio::test]
async fn test_session_state_transitions() {
    let h = Harness::new();
    assert_eq!(h.session.state(), SessionState::Resolving);

    h.session.load().await;
    assert_eq!(h.session.state(), SessionState::Resolved(None));

    let user = Identity::generate();
    h.session.signed_in(user);
    assert_eq!(h.session.identity(), Some(user));

    h.session.signed_out();
    assert_eq!(h.session.identity(), None);

    // Roles follow the sign-out back to idle
    timeout(WAIT, async {
        let mut rx = h.resolver.subscribe();
        rx.wait_for(|s| s.identity().is_none()).await.unwrap();
    })
    .await
    .unwrap();
    assert!(h.resolver.snapshot().roles.is_empty());
}
