//! Debounced remote synchronization.
//!
//! An [`AutosaveSession`] owns a worker task that turns a stream of
//! content updates into at most one remote write per quiet period:
//!
//! ```text
//!          update(v)            timer fires          write acked
//! Idle ──────────────► Pending ────────────► Saving ────────────► Idle
//!   ▲                     │ update(v') restarts the timer           │
//!   └─────────────────────┴──────────── error (logged) ◄────────────┘
//! ```
//!
//! Saves are elided when the candidate content equals the last saved
//! content ignoring the configured volatile fields, or when the content
//! is not a non-empty object. The worker awaits each write inline, so at
//! most one is ever in flight; updates arriving mid-write queue behind
//! it and start a fresh debounce window.

use crate::remote::{DocTarget, RemoteStore};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default quiet period before a save fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Fields excluded from the "did anything change" comparison by default.
pub const DEFAULT_VOLATILE_FIELDS: [&str; 2] = ["updated", "updated_human"];

/// Observable state of an autosave session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    /// Nothing scheduled.
    #[default]
    Idle,
    /// An update is waiting out the debounce window.
    Pending,
    /// A remote write is in flight.
    Saving,
}

/// Configuration for an [`AutosaveSession`].
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// Quiet period before a pending update is saved.
    pub debounce: Duration,
    /// Top-level fields ignored when comparing against the last save.
    pub volatile_fields: Vec<String>,
    /// Stamp `updated`/`created` timestamps onto saved content.
    pub add_timestamps: bool,
    /// Merge into the remote document instead of replacing it.
    pub merge: bool,
    /// Whether updates are accepted initially.
    pub active: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            volatile_fields: DEFAULT_VOLATILE_FIELDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            add_timestamps: true,
            merge: true,
            active: true,
        }
    }
}

impl AutosaveConfig {
    /// Sets the debounce window.
    #[must_use]
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Replaces the volatile-field exclusion list.
    #[must_use]
    pub fn volatile_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.volatile_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Disables timestamp stamping.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.add_timestamps = false;
        self
    }
}

enum Command {
    Update(Value),
    SetActive(bool),
}

/// Handle to a running autosave worker.
///
/// Dropping the session cancels any pending timer and stops the worker;
/// an in-flight write may still settle on the remote but its result is
/// no longer observed.
///
/// # Example
///
/// ```
/// use tabsync_runtime::{AutosaveConfig, AutosaveSession, DocTarget};
/// use tabsync_runtime::testing::MemoryRemote;
/// use serde_json::json;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let remote = Arc::new(MemoryRemote::new());
/// let config = AutosaveConfig::default().debounce(Duration::from_millis(10));
/// let session = AutosaveSession::spawn(
///     remote.clone(),
///     DocTarget::document("drafts", "d-1"),
///     config,
/// );
///
/// session.update(json!({"title": "v1"}));
/// session.update(json!({"title": "v2"}));
/// tokio::time::sleep(Duration::from_millis(50)).await;
///
/// // The burst collapsed into a single write of the final content
/// let writes = remote.writes();
/// assert_eq!(writes.len(), 1);
/// assert_eq!(writes[0].data["title"], "v2");
/// # }
/// ```
pub struct AutosaveSession {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SaveState>,
    saved_at_rx: watch::Receiver<Option<DateTime<Utc>>>,
    worker: JoinHandle<()>,
}

impl AutosaveSession {
    /// Starts a worker saving to `target` through `remote`.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn<R>(remote: Arc<R>, target: DocTarget, config: AutosaveConfig) -> Self
    where
        R: RemoteStore + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SaveState::Idle);
        let (saved_at_tx, saved_at_rx) = watch::channel(None);

        let worker = tokio::spawn(run(remote, target, config, cmd_rx, state_tx, saved_at_tx));

        Self {
            cmd_tx,
            state_rx,
            saved_at_rx,
            worker,
        }
    }

    /// Submits new content, restarting the debounce timer.
    ///
    /// Ignored while the session is inactive.
    pub fn update(&self, content: Value) {
        let _ = self.cmd_tx.send(Command::Update(content));
    }

    /// Activates or deactivates the session.
    ///
    /// Deactivating discards any pending (unsaved) update.
    pub fn set_active(&self, active: bool) {
        let _ = self.cmd_tx.send(Command::SetActive(active));
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SaveState {
        *self.state_rx.borrow()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SaveState> {
        self.state_rx.clone()
    }

    /// Returns when the last successful save completed, if any.
    #[must_use]
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.saved_at_rx.borrow()
    }

    /// Subscribes to save completions.
    #[must_use]
    pub fn subscribe_saved_at(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.saved_at_rx.clone()
    }
}

impl Drop for AutosaveSession {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run<R: RemoteStore>(
    remote: Arc<R>,
    mut target: DocTarget,
    config: AutosaveConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<SaveState>,
    saved_at_tx: watch::Sender<Option<DateTime<Utc>>>,
) {
    let mut active = config.active;
    let mut pending: Option<Value> = None;
    let mut last_saved: Option<Value> = None;

    let timer = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(timer);
    let mut armed = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None => break,
                Some(Command::Update(content)) => {
                    if !active {
                        continue;
                    }
                    pending = Some(content);
                    timer.as_mut().reset(tokio::time::Instant::now() + config.debounce);
                    armed = true;
                    state_tx.send_replace(SaveState::Pending);
                }
                Some(Command::SetActive(value)) => {
                    active = value;
                    if !active {
                        pending = None;
                        armed = false;
                        state_tx.send_replace(SaveState::Idle);
                    }
                }
            },
            () = &mut timer, if armed => {
                armed = false;
                let Some(content) = pending.take() else {
                    state_tx.send_replace(SaveState::Idle);
                    continue;
                };

                if !worth_saving(&content, last_saved.as_ref(), &config.volatile_fields) {
                    debug!(collection = %target.collection, "autosave elided, no effective change");
                    state_tx.send_replace(SaveState::Idle);
                    continue;
                }

                state_tx.send_replace(SaveState::Saving);

                let mut data = content.clone();
                if config.add_timestamps {
                    stamp(&mut data, target.is_new(), Utc::now());
                }

                match remote.write(&target, data, config.merge).await {
                    Ok(receipt) => {
                        debug!(
                            collection = %target.collection,
                            document = %receipt.id,
                            "autosaved document"
                        );
                        if target.is_new() {
                            target.document = Some(receipt.id);
                        }
                        last_saved = Some(content);
                        saved_at_tx.send_replace(Some(Utc::now()));
                    }
                    Err(error) => {
                        // No automatic retry; the next update re-enters Pending
                        warn!(collection = %target.collection, %error, "autosave write failed");
                    }
                }

                state_tx.send_replace(SaveState::Idle);
            },
        }
    }
}

/// Content is saved only if it is a non-empty object that differs from
/// the last saved content once volatile fields are ignored.
fn worth_saving(content: &Value, last_saved: Option<&Value>, volatile: &[String]) -> bool {
    let Some(map) = content.as_object() else {
        return false;
    };
    if map.is_empty() {
        return false;
    }

    match last_saved {
        None => true,
        Some(previous) => strip_volatile(content, volatile) != strip_volatile(previous, volatile),
    }
}

/// Returns `value` with the volatile top-level fields removed.
fn strip_volatile(value: &Value, volatile: &[String]) -> Value {
    match value.as_object() {
        Some(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !volatile.iter().any(|field| field == *key))
                .map(|(key, field_value)| (key.clone(), field_value.clone()))
                .collect(),
        ),
        None => value.clone(),
    }
}

/// Stamps modification (and, for new documents, creation) timestamps.
fn stamp(data: &mut Value, is_new: bool, now: DateTime<Utc>) {
    let Some(map) = data.as_object_mut() else {
        return;
    };

    map.insert("updated".into(), json!(now.timestamp_millis()));
    map.insert("updated_human".into(), json!(now.to_rfc2822()));
    if is_new {
        map.insert("created".into(), json!(now.timestamp_millis()));
        map.insert("created_human".into(), json!(now.to_rfc2822()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRemote;
    use crate::RemoteError;

    fn fast_config() -> AutosaveConfig {
        AutosaveConfig::default().debounce(Duration::from_millis(20))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    #[test]
    fn strip_volatile_removes_listed_fields() {
        let value = json!({"title": "t", "updated": 1, "updated_human": "x"});
        let stripped = strip_volatile(&value, &["updated".into(), "updated_human".into()]);
        assert_eq!(stripped, json!({"title": "t"}));
    }

    #[test]
    fn worth_saving_rules() {
        let volatile: Vec<String> = vec!["updated".into()];

        assert!(!worth_saving(&json!(null), None, &volatile));
        assert!(!worth_saving(&json!("text"), None, &volatile));
        assert!(!worth_saving(&json!({}), None, &volatile));
        assert!(worth_saving(&json!({"a": 1}), None, &volatile));

        let saved = json!({"a": 1, "updated": 5});
        assert!(!worth_saving(
            &json!({"a": 1, "updated": 99}),
            Some(&saved),
            &volatile
        ));
        assert!(worth_saving(&json!({"a": 2}), Some(&saved), &volatile));
    }

    #[test]
    fn stamp_new_document() {
        let now = Utc::now();
        let mut data = json!({"title": "t"});
        stamp(&mut data, true, now);

        assert_eq!(data["updated"], json!(now.timestamp_millis()));
        assert_eq!(data["created"], json!(now.timestamp_millis()));
        assert_eq!(data["updated_human"], json!(now.to_rfc2822()));
    }

    #[test]
    fn stamp_existing_document_skips_created() {
        let mut data = json!({"title": "t"});
        stamp(&mut data, false, Utc::now());

        assert!(data.get("updated").is_some());
        assert!(data.get("created").is_none());
    }

    #[tokio::test]
    async fn burst_collapses_to_final_content() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config(),
        );

        session.update(json!({"title": "v1"}));
        session.update(json!({"title": "v2"}));
        session.update(json!({"title": "v3"}));
        settle().await;

        let writes = remote.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].data["title"], "v3");
        assert!(writes[0].merge);
    }

    #[tokio::test]
    async fn volatile_only_change_is_elided() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config(),
        );

        session.update(json!({"title": "t"}));
        settle().await;
        assert_eq!(remote.writes().len(), 1);

        // Differs only in fields the comparison ignores
        session.update(json!({"title": "t", "updated": 123, "updated_human": "now"}));
        settle().await;
        assert_eq!(remote.writes().len(), 1);
    }

    #[tokio::test]
    async fn empty_and_non_object_content_is_skipped() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config(),
        );

        session.update(json!({}));
        session.update(json!("just a string"));
        settle().await;

        assert!(remote.writes().is_empty());
        assert_eq!(session.state(), SaveState::Idle);
    }

    #[tokio::test]
    async fn first_save_creates_and_adopts_document_id() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::collection("drafts"),
            fast_config(),
        );

        session.update(json!({"title": "first"}));
        settle().await;
        session.update(json!({"title": "second"}));
        settle().await;

        let writes = remote.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].target.is_new());
        assert!(writes[0].data.get("created").is_some());
        // Second write goes to the id assigned by the first
        assert_eq!(writes[1].target.document.as_deref(), Some("doc-1"));
        assert!(writes[1].data.get("created").is_none());
    }

    #[tokio::test]
    async fn timestamps_can_be_disabled() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config().without_timestamps(),
        );

        session.update(json!({"title": "t"}));
        settle().await;

        let writes = remote.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].data.get("updated").is_none());
    }

    #[tokio::test]
    async fn inactive_session_discards_updates() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config(),
        );

        session.set_active(false);
        session.update(json!({"title": "t"}));
        settle().await;
        assert!(remote.writes().is_empty());

        session.set_active(true);
        session.update(json!({"title": "t"}));
        settle().await;
        assert_eq!(remote.writes().len(), 1);
    }

    #[tokio::test]
    async fn deactivation_discards_pending_update() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config(),
        );

        session.update(json!({"title": "t"}));
        session.set_active(false);
        settle().await;

        assert!(remote.writes().is_empty());
    }

    #[tokio::test]
    async fn failure_returns_to_idle_without_retry() {
        let remote = Arc::new(MemoryRemote::new());
        remote.fail_next(RemoteError::Unavailable("offline".into()));

        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config(),
        );

        session.update(json!({"title": "t"}));
        settle().await;

        assert!(remote.writes().is_empty());
        assert_eq!(session.state(), SaveState::Idle);
        assert!(session.last_saved_at().is_none());

        // The failed content was never recorded as saved, so resubmitting
        // identical content writes it
        session.update(json!({"title": "t"}));
        settle().await;
        assert_eq!(remote.writes().len(), 1);
        assert!(session.last_saved_at().is_some());
    }

    #[tokio::test]
    async fn state_transitions_are_observable() {
        let remote = Arc::new(MemoryRemote::new());
        let session = AutosaveSession::spawn(
            remote.clone(),
            DocTarget::document("drafts", "d-1"),
            fast_config(),
        );

        assert_eq!(session.state(), SaveState::Idle);
        session.update(json!({"title": "t"}));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(session.state(), SaveState::Pending);

        settle().await;
        assert_eq!(session.state(), SaveState::Idle);
    }
}
