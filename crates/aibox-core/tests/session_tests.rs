use aibox_core::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Notify;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Backend that answers from a script and can hold replies until released.
struct MockBackend {
    replies: Mutex<Vec<Result<String, ChatFailure>>>,
    seen: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl MockBackend {
    fn new(replies: Vec<Result<String, ChatFailure>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    fn gated(replies: Vec<Result<String, ChatFailure>>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(replies)
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for MockBackend {
    async fn send(&self, message: &str) -> Result<String, ChatFailure> {
        self.seen.lock().unwrap().push(message.to_string());
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok("Mock response".to_string())
        } else {
            replies.remove(0)
        }
    }
}

fn controller(
    dir: &TempDir,
    backend: Arc<dyn ChatBackend>,
) -> (SessionController, UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = unbounded_channel();
    let store = CredentialStore::new(dir.path().join("users.json"));
    let ctl = SessionController::new(store, dir.path(), backend).with_events(tx);
    (ctl, rx)
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_full_scenario_against_mocked_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "user", "content": "hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "hi" } }]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = CompletionClient::new("test-api-key")
        .with_endpoint(format!("{}/v1/chat/completions", server.uri()));
    let (mut ctl, mut rx) = controller(&dir, Arc::new(client));

    ctl.register("alice", "pw1").unwrap();
    assert_eq!(
        ctl.login("alice", "pw2"),
        Err(SessionError::Auth(AuthError::WrongPassword))
    );
    assert_eq!(ctl.state(), &SessionState::LoggedOut);
    ctl.login("alice", "pw1").unwrap();
    assert_eq!(ctl.username(), Some("alice"));

    let pending = ctl.submit_message("hello").unwrap().expect("request started");
    let outcome = pending.await;
    ctl.complete(outcome).unwrap();

    let history = ctl.get_history(None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user, "hello");
    assert_eq!(history[0].ai, "hi");

    let events = drain(&mut rx);
    assert!(matches!(
        &events[0],
        SessionEvent::RegisterResult { ok: true, .. }
    ));
    assert!(matches!(
        &events[1],
        SessionEvent::LoginResult { ok: false, message, .. } if message == "wrong password"
    ));
    assert!(matches!(&events[2], SessionEvent::LoginResult { ok: true, .. }));
    assert_eq!(
        events[3],
        SessionEvent::ReplyReceived {
            message: "hello".into(),
            reply: "hi".into(),
        }
    );
    assert!(matches!(
        &events[4],
        SessionEvent::HistoryLoaded { entries, .. } if entries.len() == 1
    ));
}

#[tokio::test]
async fn test_second_submit_rejected_while_awaiting_reply() {
    let dir = TempDir::new().unwrap();
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(MockBackend::gated(vec![Ok("first".into())], gate.clone()));
    let (mut ctl, _rx) = controller(&dir, backend.clone());
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();

    let pending = ctl.submit_message("one").unwrap().unwrap();
    assert!(ctl.is_awaiting_reply());
    assert_eq!(ctl.submit_message("two").err(), Some(SessionError::Busy));

    gate.notify_one();
    ctl.complete(pending.await).unwrap();
    assert!(!ctl.is_awaiting_reply());

    // Accepted again once the first request resolved.
    let pending = ctl.submit_message("three").unwrap().unwrap();
    gate.notify_one();
    ctl.complete(pending.await).unwrap();

    assert_eq!(
        *backend.seen.lock().unwrap(),
        vec!["one".to_string(), "three".to_string()]
    );
}

#[tokio::test]
async fn test_failure_is_reported_and_not_recorded() {
    let dir = TempDir::new().unwrap();
    let failure = ChatFailure::Remote {
        status: 500,
        body: "boom".into(),
    };
    let backend = Arc::new(MockBackend::new(vec![Err(failure.clone())]));
    let (mut ctl, mut rx) = controller(&dir, backend);
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();
    drain(&mut rx);

    let pending = ctl.submit_message("hello").unwrap().unwrap();
    ctl.complete(pending.await).unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![SessionEvent::RequestFailed {
            message: "hello".into(),
            failure,
        }]
    );
    assert!(ctl.get_history(None).unwrap().is_empty());
    // Session stays usable.
    assert!(ctl.submit_message("again").unwrap().is_some());
}

#[tokio::test]
async fn test_blank_submission_is_noop() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new(vec![]));
    let (mut ctl, _rx) = controller(&dir, backend.clone());
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();

    assert!(ctl.submit_message("   \n\t").unwrap().is_none());
    assert!(!ctl.is_awaiting_reply());
    assert!(backend.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_submission_is_trimmed() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new(vec![Ok("ok".into())]));
    let (mut ctl, _rx) = controller(&dir, backend.clone());
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();

    let pending = ctl.submit_message("  hello  ").unwrap().unwrap();
    assert_eq!(pending.message(), "hello");
    ctl.complete(pending.await).unwrap();
    assert_eq!(ctl.get_history(None).unwrap()[0].user, "hello");
}

#[tokio::test]
async fn test_operations_require_login() {
    let dir = TempDir::new().unwrap();
    let (mut ctl, _rx) = controller(&dir, Arc::new(MockBackend::new(vec![])));

    assert_eq!(ctl.submit_message("hi").err(), Some(SessionError::NotLoggedIn));
    assert_eq!(ctl.get_history(None).err(), Some(SessionError::NotLoggedIn));
    assert_eq!(ctl.list_periods().err(), Some(SessionError::NotLoggedIn));
    assert_eq!(
        ctl.change_password("a", "b").err(),
        Some(SessionError::NotLoggedIn)
    );
}

#[tokio::test]
async fn test_complete_without_pending_request() {
    let dir = TempDir::new().unwrap();
    let (mut ctl, _rx) = controller(&dir, Arc::new(MockBackend::new(vec![])));
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();

    let outcome = ReplyOutcome {
        message: "stray".into(),
        result: Ok("reply".into()),
    };
    assert_eq!(ctl.complete(outcome), Err(SessionError::NotAwaitingReply));
    assert!(ctl.get_history(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_login_and_register_validation() {
    let dir = TempDir::new().unwrap();
    let (mut ctl, mut rx) = controller(&dir, Arc::new(MockBackend::new(vec![])));

    assert_eq!(
        ctl.register("  ", "pw"),
        Err(SessionError::Auth(AuthError::EmptyCredentials))
    );
    assert_eq!(
        ctl.login("ghost", "pw"),
        Err(SessionError::Auth(AuthError::UnknownUser))
    );
    ctl.register(" alice ", " pw1 ").unwrap();
    assert_eq!(
        ctl.register("alice", "pw9"),
        Err(SessionError::Auth(AuthError::DuplicateUser))
    );
    ctl.login("alice", "pw1").unwrap();
    assert_eq!(ctl.login("alice", "pw1"), Err(SessionError::AlreadyLoggedIn));

    let events = drain(&mut rx);
    assert!(matches!(
        &events[0],
        SessionEvent::RegisterResult { ok: false, .. }
    ));
    assert!(matches!(
        &events[1],
        SessionEvent::LoginResult { ok: false, message, .. } if message == "user not found"
    ));
}

#[tokio::test]
async fn test_change_password_through_session() {
    let dir = TempDir::new().unwrap();
    let (mut ctl, _rx) = controller(&dir, Arc::new(MockBackend::new(vec![])));
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();

    ctl.change_password("pw1", "pw2").unwrap();

    let store = CredentialStore::new(dir.path().join("users.json"));
    assert_eq!(store.verify("alice", "pw1"), Err(AuthError::WrongPassword));
    assert!(store.verify("alice", "pw2").is_ok());
}

#[tokio::test]
async fn test_list_periods_after_reply() {
    let dir = TempDir::new().unwrap();
    let (mut ctl, _rx) = controller(&dir, Arc::new(MockBackend::new(vec![Ok("r".into())])));
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();
    assert!(ctl.list_periods().unwrap().is_empty());

    let pending = ctl.submit_message("m").unwrap().unwrap();
    ctl.complete(pending.await).unwrap();
    assert_eq!(ctl.list_periods().unwrap(), vec![Period::current()]);
}

#[tokio::test]
async fn test_dropped_pending_reply_is_settled_on_next_submit() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new(vec![Ok("first".into()), Ok("second".into())]));
    let (mut ctl, mut rx) = controller(&dir, backend.clone());
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();
    drain(&mut rx);

    let pending = ctl.submit_message("one").unwrap().unwrap();
    drop(pending);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let pending = ctl.submit_message("two").unwrap().expect("accepted after drop");
    ctl.complete(pending.await).unwrap();
    assert_eq!(
        ctl.state(),
        &SessionState::LoggedIn {
            username: "alice".into()
        }
    );

    let history = ctl.get_history(None).unwrap();
    let pairs: Vec<(&str, &str)> = history
        .iter()
        .map(|e| (e.user.as_str(), e.ai.as_str()))
        .collect();
    assert_eq!(pairs, vec![("one", "first"), ("two", "second")]);

    let events = drain(&mut rx);
    assert_eq!(
        events[0],
        SessionEvent::ReplyReceived {
            message: "one".into(),
            reply: "first".into(),
        }
    );
}

#[tokio::test]
async fn test_reap_abandoned_waits_for_the_request() {
    let dir = TempDir::new().unwrap();
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(MockBackend::gated(vec![Ok("late".into())], gate.clone()));
    let (mut ctl, _rx) = controller(&dir, backend);
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();

    drop(ctl.submit_message("one").unwrap().unwrap());
    tokio::task::yield_now().await;

    // Still running, so the session stays busy.
    assert_eq!(ctl.reap_abandoned(), 0);
    assert_eq!(ctl.submit_message("two").err(), Some(SessionError::Busy));

    gate.notify_one();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(ctl.reap_abandoned(), 1);
    assert!(!ctl.is_awaiting_reply());
    assert_eq!(ctl.get_history(None).unwrap()[0].ai, "late");
}

#[tokio::test]
async fn test_reply_shown_when_history_cannot_be_written() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new(vec![Ok("hi".into())]));
    let (mut ctl, mut rx) = controller(&dir, backend);
    ctl.register("alice", "pw1").unwrap();
    ctl.login("alice", "pw1").unwrap();
    drain(&mut rx);

    // A regular file where the user's directory should be.
    std::fs::create_dir_all(dir.path().join("Users")).unwrap();
    std::fs::write(dir.path().join("Users").join("alice"), "blocked").unwrap();

    let pending = ctl.submit_message("hello").unwrap().unwrap();
    ctl.complete(pending.await).unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![SessionEvent::ReplyReceived {
            message: "hello".into(),
            reply: "hi".into(),
        }]
    );
    assert_eq!(
        ctl.state(),
        &SessionState::LoggedIn {
            username: "alice".into()
        }
    );
    assert!(ctl.get_history(None).unwrap().is_empty());
    assert!(ctl.submit_message("again").unwrap().is_some());
}
