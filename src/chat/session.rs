//! Core chat session management.
//!
//! This module provides [`SessionController`], the state machine that owns the
//! transcript. It is synchronous: [`SessionController::submit`]
//! appends the user turn and hands back the request to send, and
//! [`SessionController::complete`] appends whatever came back. Callers that
//! need to keep reacting to input while a reply is pending drive those two
//! halves separately (see [`SessionDriver`](crate::chat::SessionDriver));
//! callers that don't can use [`SessionController::converse`].

use crate::chat::config::{ChatConfig, DEFAULT_GREETING};
use crate::client::{ChatRequest, FailureKind, RemoteOutcome, ResponseClient};
use crate::observability::{
    SESSION_FALLBACKS, SESSION_IGNORED_BUSY, SESSION_IGNORED_EMPTY, SESSION_STALE_COMPLETIONS,
    SESSION_SUBMITS,
};
use crate::transcript::{Transcript, Turn, TurnId};

/// Shown when the endpoint is unreachable or answers with an error status.
pub const OFFLINE_FALLBACK: &str =
    "I'm sorry, I seem to be offline at the moment. Please try again later.";

/// Shown when the endpoint answers but the reply cannot be used.
pub const REPHRASE_FALLBACK: &str =
    "I'm not sure how to respond to that. Could you try rephrasing?";

/// The user-visible text substituted for a failed call.
pub fn fallback_text(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Network | FailureKind::BadStatus => OFFLINE_FALLBACK,
        FailureKind::MalformedBody => REPHRASE_FALLBACK,
    }
}

/// Whether the session will accept a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No call outstanding.
    Idle,
    /// A user turn was appended and its reply has not arrived.
    AwaitingReply,
}

/// Why a submission did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// The text was empty after trimming.
    Empty,
    /// A reply is already pending.
    Busy,
}

/// A dispatched user turn whose reply has not been recorded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    turn_id: TurnId,
    request: ChatRequest,
}

impl PendingReply {
    /// Id of the user turn this reply answers.
    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    /// What to send to the endpoint.
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }
}

/// Result of [`SessionController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The user turn was appended; send the request and report back.
    Dispatched(PendingReply),
    /// Nothing changed.
    Ignored(IgnoreReason),
}

impl Submission {
    /// Returns true if a user turn was appended.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Submission::Dispatched(_))
    }

    /// The pending reply, if dispatched.
    pub fn pending(&self) -> Option<&PendingReply> {
        match self {
            Submission::Dispatched(pending) => Some(pending),
            Submission::Ignored(_) => None,
        }
    }
}

/// An immutable copy of the observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Every turn, in order.
    pub turns: Vec<Turn>,
    /// Idle or awaiting a reply.
    pub state: SessionState,
}

impl SessionSnapshot {
    /// Whether input should be accepted.
    pub fn input_enabled(&self) -> bool {
        self.state == SessionState::Idle
    }
}

/// Counters for a single session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Submissions that appended a user turn.
    pub submits_accepted: u64,
    /// Submissions dropped because they were blank.
    pub ignored_empty: u64,
    /// Submissions dropped because a reply was pending.
    pub ignored_busy: u64,
    /// Replies recorded from the endpoint.
    pub replies: u64,
    /// Fallbacks recorded for network failures.
    pub network_failures: u64,
    /// Fallbacks recorded for error statuses.
    pub bad_status: u64,
    /// Fallbacks recorded for unusable bodies, including blank replies.
    pub malformed_bodies: u64,
    /// Turns in the transcript, greeting included.
    pub turn_count: usize,
}

/// Sequences user input against one remote endpoint.
///
/// Owns the transcript, the turn-id counter, and the idle/awaiting state. At
/// most one reply is outstanding at a time; submissions made while waiting
/// are dropped, not queued.
#[derive(Debug, Clone)]
pub struct SessionController {
    transcript: Transcript,
    in_flight: Option<TurnId>,
    next_id: TurnId,
    include_history: bool,
    stats: SessionStats,
}

impl SessionController {
    /// Starts a session seeded with the configured greeting.
    pub fn new(config: &ChatConfig) -> Self {
        let mut controller = Self {
            transcript: Transcript::new(),
            in_flight: None,
            next_id: 0,
            include_history: config.include_history,
            stats: SessionStats::default(),
        };
        let greeting = if config.greeting.trim().is_empty() {
            DEFAULT_GREETING.to_string()
        } else {
            config.greeting.clone()
        };
        let id = controller.allocate_id();
        controller
            .transcript
            .append(Turn::assistant(id, greeting));
        controller
    }

    /// Offers text to the session.
    ///
    /// Blank text, or any text while a reply is pending, is ignored without
    /// side effects. Otherwise the trimmed text becomes a user turn and the
    /// session waits for [`complete`](Self::complete).
    pub fn submit(&mut self, raw: &str) -> Submission {
        let text = raw.trim();
        if text.is_empty() {
            SESSION_IGNORED_EMPTY.click();
            self.stats.ignored_empty += 1;
            return Submission::Ignored(IgnoreReason::Empty);
        }
        if self.in_flight.is_some() {
            SESSION_IGNORED_BUSY.click();
            self.stats.ignored_busy += 1;
            return Submission::Ignored(IgnoreReason::Busy);
        }

        // Built before appending: history is earlier user turns only.
        let request = if self.include_history {
            ChatRequest::with_history(text, self.transcript.user_turns().map(|t| t.text.as_str()))
        } else {
            ChatRequest::new(text)
        };
        let turn_id = self.allocate_id();
        self.transcript.append(Turn::user(turn_id, text));
        self.in_flight = Some(turn_id);
        SESSION_SUBMITS.click();
        self.stats.submits_accepted += 1;
        Submission::Dispatched(PendingReply { turn_id, request })
    }

    /// Records the outcome of the outstanding call and returns to idle.
    ///
    /// Returns the appended assistant turn, or `None` if `pending` is not the
    /// reply the session is waiting for.
    pub fn complete(&mut self, pending: PendingReply, outcome: RemoteOutcome) -> Option<&Turn> {
        if self.in_flight != Some(pending.turn_id) {
            SESSION_STALE_COMPLETIONS.click();
            return None;
        }
        let text = self.reply_text(outcome);
        let turn_id = self.allocate_id();
        self.transcript.append(Turn::assistant(turn_id, text));
        self.in_flight = None;
        self.transcript.last()
    }

    /// Submits, sends, and completes in one step.
    ///
    /// Returns the assistant turn, or `None` if the submission was ignored.
    pub async fn converse<C>(&mut self, client: &C, raw: &str) -> Option<Turn>
    where
        C: ResponseClient + ?Sized,
    {
        let Submission::Dispatched(pending) = self.submit(raw) else {
            return None;
        };
        let outcome = client.send(pending.request()).await;
        self.complete(pending, outcome).cloned()
    }

    /// Idle or awaiting a reply.
    pub fn state(&self) -> SessionState {
        if self.in_flight.is_some() {
            SessionState::AwaitingReply
        } else {
            SessionState::Idle
        }
    }

    /// Whether the presentation layer should accept input.
    pub fn input_enabled(&self) -> bool {
        self.state() == SessionState::Idle
    }

    /// Id of the user turn awaiting a reply.
    pub fn in_flight(&self) -> Option<TurnId> {
        self.in_flight
    }

    /// The transcript so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether requests carry earlier user turns.
    pub fn include_history(&self) -> bool {
        self.include_history
    }

    /// Turns history forwarding on or off for subsequent submissions.
    pub fn set_include_history(&mut self, include_history: bool) {
        self.include_history = include_history;
    }

    /// Copies the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turns: self.transcript.all().to_vec(),
            state: self.state(),
        }
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            turn_count: self.transcript.len(),
            ..self.stats
        }
    }

    fn reply_text(&mut self, outcome: RemoteOutcome) -> String {
        let kind = match outcome {
            RemoteOutcome::Success(reply) if !reply.trim().is_empty() => {
                self.stats.replies += 1;
                return reply;
            }
            // A blank reply cannot become a turn; treat it as unusable.
            RemoteOutcome::Success(_) => FailureKind::MalformedBody,
            RemoteOutcome::Failure(kind) => kind,
        };
        match kind {
            FailureKind::Network => self.stats.network_failures += 1,
            FailureKind::BadStatus => self.stats.bad_status += 1,
            FailureKind::MalformedBody => self.stats.malformed_bodies += 1,
        }
        SESSION_FALLBACKS.click();
        fallback_text(kind).to_string()
    }

    fn allocate_id(&mut self) -> TurnId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::transcript::Sender;

    /// Replays canned outcomes and records what it was asked.
    struct ScriptedClient {
        outcomes: Mutex<Vec<RemoteOutcome>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn new(outcomes: Vec<RemoteOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ResponseClient for ScriptedClient {
        async fn send(&self, request: &ChatRequest) -> RemoteOutcome {
            self.requests.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .expect("script ran out of outcomes")
        }
    }

    fn success(text: &str) -> RemoteOutcome {
        RemoteOutcome::Success(text.to_string())
    }

    fn texts(controller: &SessionController) -> Vec<(Sender, String)> {
        controller
            .transcript()
            .all()
            .iter()
            .map(|t| (t.sender, t.text.clone()))
            .collect()
    }

    #[test]
    fn new_session_has_greeting() {
        let controller = SessionController::new(&ChatConfig::new());
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.transcript().len(), 1);
        let greeting = &controller.transcript().all()[0];
        assert_eq!(greeting.id, 0);
        assert_eq!(greeting.sender, Sender::Assistant);
        assert_eq!(greeting.text, DEFAULT_GREETING);
    }

    #[test]
    fn blank_greeting_falls_back_to_default() {
        let controller = SessionController::new(&ChatConfig::new().with_greeting("  "));
        assert_eq!(controller.transcript().all()[0].text, DEFAULT_GREETING);

        let controller = SessionController::new(&ChatConfig::new().with_greeting("Hi, friend."));
        assert_eq!(controller.transcript().all()[0].text, "Hi, friend.");
    }

    #[test]
    fn blank_submit_is_ignored() {
        let mut controller = SessionController::new(&ChatConfig::new());
        for raw in ["", "   ", "\n\t  \r\n"] {
            assert_eq!(
                controller.submit(raw),
                Submission::Ignored(IgnoreReason::Empty)
            );
        }
        assert_eq!(controller.transcript().len(), 1);
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.stats().ignored_empty, 3);
    }

    #[test]
    fn submit_appends_trimmed_user_turn_and_waits() {
        let mut controller = SessionController::new(&ChatConfig::new());
        let submission = controller.submit("  Hello  ");
        let pending = submission.pending().expect("dispatched");
        assert_eq!(pending.turn_id(), 1);
        assert_eq!(pending.request(), &ChatRequest::new("Hello"));

        assert_eq!(controller.state(), SessionState::AwaitingReply);
        assert!(!controller.input_enabled());
        let last = controller.transcript().last().unwrap();
        assert_eq!(last, &Turn::user(1, "Hello"));
    }

    #[test]
    fn submit_while_awaiting_is_noop() {
        let mut controller = SessionController::new(&ChatConfig::new());
        assert!(controller.submit("first").is_dispatched());
        let before = controller.snapshot();

        assert_eq!(
            controller.submit("second"),
            Submission::Ignored(IgnoreReason::Busy)
        );
        assert_eq!(controller.snapshot(), before);
        assert_eq!(controller.stats().ignored_busy, 1);
    }

    #[test]
    fn success_appends_reply_and_returns_idle() {
        let mut controller = SessionController::new(&ChatConfig::new());
        let Submission::Dispatched(pending) = controller.submit("Hello") else {
            panic!("expected dispatch");
        };
        let turn = controller.complete(pending, success("X")).unwrap().clone();
        assert_eq!(turn, Turn::assistant(2, "X"));
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.transcript().len(), 3);
        assert_eq!(controller.stats().replies, 1);
    }

    #[test]
    fn failures_map_to_fallbacks() {
        let cases = [
            (FailureKind::Network, OFFLINE_FALLBACK),
            (FailureKind::BadStatus, OFFLINE_FALLBACK),
            (FailureKind::MalformedBody, REPHRASE_FALLBACK),
        ];
        for (kind, expected) in cases {
            let mut controller = SessionController::new(&ChatConfig::new());
            let Submission::Dispatched(pending) = controller.submit("Hello") else {
                panic!("expected dispatch");
            };
            let turn = controller
                .complete(pending, RemoteOutcome::Failure(kind))
                .unwrap();
            assert_eq!(turn.text, expected, "{kind}");
            assert_eq!(turn.sender, Sender::Assistant);
            assert_eq!(controller.state(), SessionState::Idle);
        }
        assert_ne!(OFFLINE_FALLBACK, REPHRASE_FALLBACK);
    }

    #[test]
    fn blank_reply_uses_rephrase_fallback() {
        let mut controller = SessionController::new(&ChatConfig::new());
        let Submission::Dispatched(pending) = controller.submit("Hello") else {
            panic!("expected dispatch");
        };
        let turn = controller.complete(pending, success("  ")).unwrap();
        assert_eq!(turn.text, REPHRASE_FALLBACK);
        assert_eq!(controller.stats().malformed_bodies, 1);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut controller = SessionController::new(&ChatConfig::new());
        let Submission::Dispatched(first) = controller.submit("one") else {
            panic!("expected dispatch");
        };
        assert!(controller.complete(first.clone(), success("a")).is_some());
        let len = controller.transcript().len();

        assert!(controller.complete(first, success("again")).is_none());
        assert_eq!(controller.transcript().len(), len);
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn history_forwards_prior_user_turns_only() {
        let config = ChatConfig::new().with_history(true);
        let mut controller = SessionController::new(&config);

        let Submission::Dispatched(first) = controller.submit("first") else {
            panic!("expected dispatch");
        };
        assert_eq!(first.request().queries.as_deref(), Some(""));
        controller.complete(first, success("reply one"));

        let Submission::Dispatched(second) = controller.submit("second") else {
            panic!("expected dispatch");
        };
        assert_eq!(second.request().queries.as_deref(), Some("1. first"));
        controller.complete(second, RemoteOutcome::Failure(FailureKind::Network));

        let Submission::Dispatched(third) = controller.submit("third") else {
            panic!("expected dispatch");
        };
        assert_eq!(third.request().query, "third");
        assert_eq!(
            third.request().queries.as_deref(),
            Some("1. first\n2. second")
        );
    }

    #[test]
    fn toggling_history_applies_to_next_submit() {
        let mut controller = SessionController::new(&ChatConfig::new());
        assert!(!controller.include_history());
        controller.set_include_history(true);
        let submission = controller.submit("hi");
        assert!(submission.pending().unwrap().request().queries.is_some());
    }

    #[tokio::test]
    async fn end_to_end_hello() {
        let client = ScriptedClient::new(vec![success("Hi there")]);
        let mut controller = SessionController::new(&ChatConfig::new());

        let reply = controller.converse(&client, "Hello").await.unwrap();
        assert_eq!(reply, Turn::assistant(2, "Hi there"));
        assert_eq!(
            texts(&controller),
            vec![
                (Sender::Assistant, DEFAULT_GREETING.to_string()),
                (Sender::User, "Hello".to_string()),
                (Sender::Assistant, "Hi there".to_string()),
            ]
        );
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(client.requests(), vec![ChatRequest::new("Hello")]);
    }

    #[test]
    fn blank_converse_never_calls_client() {
        let client = ScriptedClient::new(Vec::new());
        let mut controller = SessionController::new(&ChatConfig::new());
        assert!(tokio_test::block_on(controller.converse(&client, "   ")).is_none());
        assert!(client.requests().is_empty());
        assert_eq!(controller.transcript().len(), 1);
    }

    #[tokio::test]
    async fn ids_strictly_increase_across_cycles() {
        let outcomes = vec![
            success("a"),
            RemoteOutcome::Failure(FailureKind::Network),
            success("b"),
            RemoteOutcome::Failure(FailureKind::MalformedBody),
            RemoteOutcome::Failure(FailureKind::BadStatus),
        ];
        let client = ScriptedClient::new(outcomes);
        let mut controller = SessionController::new(&ChatConfig::new());
        for text in ["one", "", "two", "three", "  ", "four", "five"] {
            controller.converse(&client, text).await;
        }

        let ids: Vec<TurnId> = controller.transcript().all().iter().map(|t| t.id).collect();
        assert_eq!(ids, (0..11).collect::<Vec<_>>());
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let stats = controller.stats();
        assert_eq!(stats.submits_accepted, 5);
        assert_eq!(stats.ignored_empty, 2);
        assert_eq!(stats.replies, 2);
        assert_eq!(stats.network_failures, 1);
        assert_eq!(stats.bad_status, 1);
        assert_eq!(stats.malformed_bodies, 1);
        assert_eq!(stats.turn_count, 11);
    }
}
