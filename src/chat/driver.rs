//! Event loop that owns a session.
//!
//! A [`SessionDriver`] task holds the [`SessionController`] and reacts to two
//! kinds of event, one at a time: a submission from the presentation layer,
//! and the completion of a remote call. Remote calls run on their own task so
//! the loop keeps answering submissions (by ignoring them) while a reply is
//! pending. Observers follow along through a `watch` channel of
//! [`SessionSnapshot`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::chat::session::{
    PendingReply, SessionController, SessionSnapshot, SessionState, SessionStats, Submission,
};
use crate::client::{FailureKind, RemoteOutcome, ResponseClient};

enum Command {
    Submit {
        text: String,
        verdict: oneshot::Sender<Submission>,
    },
    SetIncludeHistory(bool),
    Stats(oneshot::Sender<SessionStats>),
}

/// Cloneable front for a running session.
///
/// Dropping every handle stops the driver once any pending reply has been
/// recorded.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Offers text to the session and returns its verdict.
    ///
    /// Returns as soon as the user turn is appended; it does not wait for the
    /// reply. `None` means the driver has stopped.
    pub async fn submit(&self, text: impl Into<String>) -> Option<Submission> {
        let (verdict, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                text: text.into(),
                verdict,
            })
            .ok()?;
        rx.await.ok()
    }

    /// Turns history forwarding on or off for later submissions.
    pub fn set_include_history(&self, include_history: bool) -> bool {
        self.commands
            .send(Command::SetIncludeHistory(include_history))
            .is_ok()
    }

    /// Counters as of now. `None` means the driver has stopped.
    pub async fn stats(&self) -> Option<SessionStats> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Stats(tx)).ok()?;
        rx.await.ok()
    }

    /// The latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that wakes on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Waits until no reply is pending and returns that state.
    pub async fn wait_idle(&mut self) -> SessionSnapshot {
        let _ = self
            .snapshots
            .wait_for(|snapshot| snapshot.state == SessionState::Idle)
            .await;
        self.snapshots.borrow().clone()
    }
}

/// Spawns and runs the session event loop.
pub struct SessionDriver<C: ResponseClient + ?Sized> {
    controller: SessionController,
    client: Arc<C>,
    reply_timeout: Duration,
}

impl<C: ResponseClient + ?Sized + 'static> SessionDriver<C> {
    /// Creates a driver. A call that outlives `reply_timeout` is recorded as
    /// a network failure.
    pub fn new(controller: SessionController, client: Arc<C>, reply_timeout: Duration) -> Self {
        Self {
            controller,
            client,
            reply_timeout,
        }
    }

    /// Starts the loop on the current runtime.
    ///
    /// The join handle yields the controller once every handle is dropped.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<SessionController>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(self.controller.snapshot());
        let join = tokio::spawn(self.run(commands_rx, snapshots_tx));
        let handle = SessionHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
        };
        (handle, join)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) -> SessionController {
        let (completions_tx, mut completions) =
            mpsc::unbounded_channel::<(PendingReply, RemoteOutcome)>();
        let mut open = true;
        loop {
            tokio::select! {
                command = commands.recv(), if open => match command {
                    Some(Command::Submit { text, verdict }) => {
                        let submission = self.controller.submit(&text);
                        if let Some(pending) = submission.pending() {
                            self.dispatch(pending.clone(), completions_tx.clone());
                            snapshots.send_replace(self.controller.snapshot());
                        }
                        let _ = verdict.send(submission);
                    }
                    Some(Command::SetIncludeHistory(include_history)) => {
                        self.controller.set_include_history(include_history);
                    }
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.controller.stats());
                    }
                    None => open = false,
                },
                Some((pending, outcome)) = completions.recv() => {
                    if self.controller.complete(pending, outcome).is_some() {
                        snapshots.send_replace(self.controller.snapshot());
                    }
                }
            }
            if !open && self.controller.in_flight().is_none() {
                break;
            }
        }
        self.controller
    }

    fn dispatch(
        &self,
        pending: PendingReply,
        completions: mpsc::UnboundedSender<(PendingReply, RemoteOutcome)>,
    ) {
        let client = Arc::clone(&self.client);
        let request = pending.request().clone();
        let reply_timeout = self.reply_timeout;
        tokio::spawn(async move {
            // A panicking or hung client still resolves to a completion.
            let call = tokio::spawn(async move { client.send(&request).await });
            let abort = call.abort_handle();
            let outcome = match tokio::time::timeout(reply_timeout, call).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => RemoteOutcome::Failure(FailureKind::Network),
                Err(_) => {
                    abort.abort();
                    RemoteOutcome::Failure(FailureKind::Network)
                }
            };
            let _ = completions.send((pending, outcome));
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::chat::config::ChatConfig;
    use crate::chat::session::{IgnoreReason, OFFLINE_FALLBACK};
    use crate::client::ChatRequest;
    use crate::transcript::{Sender, Turn};

    /// Holds every call until released, then answers with a fixed outcome.
    struct GatedClient {
        gate: Notify,
        outcome: RemoteOutcome,
    }

    impl GatedClient {
        fn new(outcome: RemoteOutcome) -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                outcome,
            })
        }
    }

    #[async_trait::async_trait]
    impl ResponseClient for GatedClient {
        async fn send(&self, _: &ChatRequest) -> RemoteOutcome {
            self.gate.notified().await;
            self.outcome.clone()
        }
    }

    /// Never answers.
    struct HungClient;

    #[async_trait::async_trait]
    impl ResponseClient for HungClient {
        async fn send(&self, _: &ChatRequest) -> RemoteOutcome {
            std::future::pending::<RemoteOutcome>().await
        }
    }

    /// Panics on every call.
    struct PanickingClient;

    #[async_trait::async_trait]
    impl ResponseClient for PanickingClient {
        async fn send(&self, _: &ChatRequest) -> RemoteOutcome {
            panic!("client blew up");
        }
    }

    fn spawn<C: ResponseClient + 'static>(
        client: Arc<C>,
    ) -> (SessionHandle, JoinHandle<SessionController>) {
        let controller = SessionController::new(&ChatConfig::new());
        SessionDriver::new(controller, client, Duration::from_secs(30)).spawn()
    }

    #[tokio::test]
    async fn submit_is_visible_before_reply() {
        let client = GatedClient::new(RemoteOutcome::Success("Hi there".to_string()));
        let (mut handle, _join) = spawn(Arc::clone(&client));

        let submission = handle.submit("Hello").await.unwrap();
        assert!(submission.is_dispatched());
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, SessionState::AwaitingReply);
        assert!(!snapshot.input_enabled());
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns[1], Turn::user(1, "Hello"));

        client.gate.notify_one();
        let snapshot = handle.wait_idle().await;
        assert_eq!(snapshot.turns.len(), 3);
        assert_eq!(snapshot.turns[2], Turn::assistant(2, "Hi there"));
    }

    #[tokio::test]
    async fn overlapping_submit_is_dropped() {
        let client = GatedClient::new(RemoteOutcome::Success("first reply".to_string()));
        let (mut handle, _join) = spawn(Arc::clone(&client));

        assert!(handle.submit("first").await.unwrap().is_dispatched());
        let before = handle.snapshot();
        assert_eq!(
            handle.submit("second").await.unwrap(),
            Submission::Ignored(IgnoreReason::Busy)
        );
        assert_eq!(handle.snapshot(), before);
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.submits_accepted, 1);
        assert_eq!(stats.ignored_busy, 1);
        assert_eq!(stats.turn_count, 2);

        client.gate.notify_one();
        let snapshot = handle.wait_idle().await;
        let user_texts: Vec<&str> = snapshot
            .turns
            .iter()
            .filter(|t| t.sender == Sender::User)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(user_texts, vec!["first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out_to_offline_fallback() {
        let controller = SessionController::new(&ChatConfig::new());
        let (mut handle, _join) =
            SessionDriver::new(controller, Arc::new(HungClient), Duration::from_secs(5)).spawn();

        assert!(handle.submit("anyone there?").await.unwrap().is_dispatched());
        let snapshot = handle.wait_idle().await;
        let last = snapshot.turns.last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.text, OFFLINE_FALLBACK);
    }

    #[tokio::test]
    async fn panicking_client_still_returns_to_idle() {
        let (mut handle, _join) = spawn(Arc::new(PanickingClient));

        assert!(handle.submit("hi").await.unwrap().is_dispatched());
        let snapshot = tokio::time::timeout(Duration::from_secs(2), handle.wait_idle())
            .await
            .unwrap();
        assert!(snapshot.input_enabled());
        assert_eq!(snapshot.turns.last().unwrap().text, OFFLINE_FALLBACK);

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.network_failures, 1);
        assert!(handle.submit("again").await.unwrap().is_dispatched());
    }

    #[tokio::test]
    async fn dropping_handles_returns_controller_after_reply() {
        let client = GatedClient::new(RemoteOutcome::Success("bye".to_string()));
        let (handle, join) = spawn(Arc::clone(&client));

        assert!(handle.submit("leaving").await.unwrap().is_dispatched());
        drop(handle);
        client.gate.notify_one();

        let controller = join.await.unwrap();
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.transcript().len(), 3);
        assert_eq!(controller.transcript().last().unwrap().text, "bye");
    }

    #[tokio::test]
    async fn history_toggle_reaches_controller() {
        let client = GatedClient::new(RemoteOutcome::Success("ok".to_string()));
        let (handle, _join) = spawn(Arc::clone(&client));

        assert!(handle.set_include_history(true));
        let submission = handle.submit("first").await.unwrap();
        assert_eq!(
            submission.pending().unwrap().request().queries.as_deref(),
            Some("")
        );
    }
}
