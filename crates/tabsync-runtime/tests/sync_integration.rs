//! End-to-end tests wiring bindings, autosave, and session state over a
//! shared backend the way an application would.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tabsync_runtime::testing::{FakeAuthProvider, MemoryRemote};
use tabsync_runtime::{
    AuthUser, AutosaveConfig, AutosaveSession, BindingConfig, ContextHub, ContextId, DocTarget,
    IdentitySource, KeyBinding, KvStore, MemoryBackend, SessionIdentity, SessionStore,
};

fn two_tabs() -> (KvStore, KvStore) {
    let backend = Arc::new(MemoryBackend::new());
    let hub = ContextHub::new();
    let tab_a = KvStore::new(backend.clone())
        .with_context(ContextId::named("tab-a"))
        .with_hub(hub.clone());
    let tab_b = KvStore::new(backend)
        .with_context(ContextId::named("tab-b"))
        .with_hub(hub);
    (tab_a, tab_b)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn two_tabs_converge_on_a_shared_key() {
    let (tab_a, tab_b) = two_tabs();

    let binding_a =
        KeyBinding::bind(tab_a, BindingConfig::new("theme", json!("light"))).unwrap();
    let binding_b =
        KeyBinding::bind(tab_b, BindingConfig::new("theme", json!("light"))).unwrap();

    binding_a.set(&json!("dark")).unwrap();
    settle().await;
    assert_eq!(binding_a.value(), json!("dark"));
    assert_eq!(binding_b.value(), json!("dark"));

    binding_b.set(&json!("solarized")).unwrap();
    settle().await;
    assert_eq!(binding_a.value(), json!("solarized"));
    assert_eq!(binding_b.value(), json!("solarized"));
}

#[tokio::test]
async fn convergence_does_not_ping_pong() {
    let (tab_a, tab_b) = two_tabs();

    let binding_a = KeyBinding::bind(tab_a, BindingConfig::new("n", json!(0))).unwrap();
    let binding_b = KeyBinding::bind(tab_b, BindingConfig::new("n", json!(0))).unwrap();

    let mut rx_b = binding_b.subscribe();
    rx_b.mark_unchanged();

    binding_a.set(&json!(1)).unwrap();
    settle().await;

    // B saw exactly one change; applying it produced no further writes
    assert!(rx_b.has_changed().unwrap());
    rx_b.mark_unchanged();
    settle().await;
    assert!(!rx_b.has_changed().unwrap());
    assert_eq!(binding_a.value(), json!(1));
}

#[tokio::test]
async fn detached_binding_misses_cross_context_writes() {
    let (tab_a, tab_b) = two_tabs();

    let binding_b =
        KeyBinding::bind(tab_b, BindingConfig::new("theme", json!("light"))).unwrap();
    binding_b.detach();
    settle().await;

    tab_a.set("theme", &json!("dark")).unwrap();
    settle().await;

    assert_eq!(binding_b.value(), json!("light"));
}

#[tokio::test]
async fn binding_feeds_autosave() {
    let store = KvStore::new(Arc::new(MemoryBackend::new()));
    let binding =
        KeyBinding::bind(store, BindingConfig::new("draft", json!({}))).unwrap();

    let remote = Arc::new(MemoryRemote::new());
    let session = AutosaveSession::spawn(
        remote.clone(),
        DocTarget::collection("drafts"),
        AutosaveConfig::default().debounce(Duration::from_millis(20)),
    );

    // Edits flow through local state first, then into autosave
    for title in ["a", "ab", "abc"] {
        binding.set(&json!({"title": title})).unwrap();
        session.update(binding.value());
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let writes = remote.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].data["title"], "abc");
    assert!(writes[0].data.get("created").is_some());
    assert!(session.last_saved_at().is_some());
}

#[tokio::test]
async fn session_identity_lifecycle_across_restart() {
    let backend = Arc::new(MemoryBackend::new());

    // First run: provider signs in, identity lands in the cache
    {
        let store = KvStore::new(backend.clone());
        let auth = FakeAuthProvider::signed_in(
            AuthUser::new("u-1").with_field("name", json!("Alex")),
        );
        let session = SessionStore::new(store);
        session.initialize(&auth);
        settle().await;
        assert_eq!(session.current().source, IdentitySource::Provider);
    }

    // Second run: the cache answers before the (slow) provider does
    let store = KvStore::new(backend.clone());
    let auth = FakeAuthProvider::new();
    let session = SessionStore::new(store.clone());
    session.initialize(&auth);

    let seeded = session.current();
    assert_eq!(seeded.source, IdentitySource::Cache);
    assert_eq!(seeded.uid.as_deref(), Some("u-1"));
    assert_eq!(seeded.profile["name"], "Alex");

    // Provider answers: different user, and the cache follows
    settle().await;
    auth.sign_in(AuthUser::new("u-2"));
    settle().await;

    let identity = session.current();
    assert_eq!(identity.source, IdentitySource::Provider);
    assert_eq!(identity.uid.as_deref(), Some("u-2"));

    let cached: SessionIdentity = store.get_as("user").unwrap().unwrap();
    assert_eq!(cached.uid.as_deref(), Some("u-2"));

    // Sign-out scrubs the cache
    auth.sign_out();
    settle().await;
    assert!(store.raw("user").unwrap().is_none());
    assert!(!session.current().is_signed_in());
}

#[tokio::test]
async fn session_cache_removal_reaches_other_tabs() {
    let (tab_a, tab_b) = two_tabs();

    tab_a.set("user", &json!({"uid": "u-1"})).unwrap();
    let binding_b =
        KeyBinding::bind(tab_b, BindingConfig::new("user", json!(null))).unwrap();
    settle().await;
    assert_eq!(binding_b.value()["uid"], "u-1");

    // Tab A signs out; its session store removes the cached identity
    let auth = FakeAuthProvider::new();
    let session = SessionStore::new(tab_a);
    session.initialize(&auth);
    settle().await;

    assert_eq!(binding_b.value(), json!(null));
}
