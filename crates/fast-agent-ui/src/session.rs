//! Per-session state and the turn controller.
//!
//! A turn is a pull-based stream of transcript snapshots. It holds the only
//! mutable borrow of its [`SessionState`], so a session never runs two turns at
//! once, and dropping the stream at any suspension point abandons the turn
//! along with the agent's upstream event stream.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::StreamExt as _;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, AgentEventStream, RunRequest};
use crate::classify::classify;
use crate::delta::DeltaBuffer;
use crate::errors::TurnError;
use crate::event::AgentEvent;
use crate::transcript::{Transcript, TranscriptMessage, TranscriptSnapshot};
use crate::upload::UploadLogEntry;

/// Snapshots of the transcript, one after every mutation of a turn.
pub type TurnStream<'a> = BoxStream<'a, TranscriptSnapshot>;

/// Everything one chat session owns: its agent, transcript, and uploads.
pub struct SessionState {
    id: Uuid,
    agent: Arc<dyn Agent>,
    transcript: Transcript,
    upload_log: Vec<UploadLogEntry>,
    reset_memory_each_turn: bool,
}

impl SessionState {
    pub fn new(agent: Arc<dyn Agent>, reset_memory_each_turn: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent,
            transcript: Transcript::new(),
            upload_log: Vec::new(),
            reset_memory_each_turn,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn upload_log(&self) -> &[UploadLogEntry] {
        &self.upload_log
    }

    pub(crate) fn upload_log_mut(&mut self) -> &mut Vec<UploadLogEntry> {
        &mut self.upload_log
    }

    pub fn reset_memory_each_turn(&self) -> bool {
        self.reset_memory_each_turn
    }
}

/// Runs one turn of `prompt` against the session's agent.
///
/// The first snapshot carries the user message. Failures never escape: they
/// end the stream after one final snapshot with an `Error` message.
pub fn run_turn(session: &mut SessionState, prompt: impl Into<String>) -> TurnStream<'_> {
    let suppress_model_text = session.agent.streams_outputs_inline();
    let state = TurnState {
        turn_id: Uuid::new_v4(),
        session,
        phase: Phase::Begin {
            prompt: prompt.into(),
        },
        deltas: DeltaBuffer::new(),
        queued: VecDeque::new(),
        suppress_model_text,
    };
    stream::unfold(state, |mut state| async move {
        let snapshot = state.advance().await?;
        Some((snapshot, state))
    })
    .boxed()
}

/// Clears the transcript and asks the agent to forget earlier turns.
///
/// Agent failures are logged and swallowed, so this is safe to call
/// repeatedly and never fails the caller.
pub async fn reset_conversation(session: &mut SessionState) {
    session.transcript.clear();
    let agent = Arc::clone(&session.agent);
    match agent.reset_memory().await {
        Ok(()) => info!(
            event = "session.reset",
            domain = "session",
            session_id = %session.id
        ),
        Err(err) => warn!(
            event = "session.reset_failed",
            domain = "session",
            session_id = %session.id,
            error = %err
        ),
    }
}

/// Escapes `<` and `>` so streamed text cannot open markup in markdown shells.
pub fn escape_angle_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("\\<"),
            '>' => out.push_str("\\>"),
            other => out.push(other),
        }
    }
    out
}

enum Phase {
    Begin { prompt: String },
    Connect { prompt: String },
    Streaming { events: AgentEventStream },
    Finished,
}

struct TurnState<'a> {
    turn_id: Uuid,
    session: &'a mut SessionState,
    phase: Phase,
    deltas: DeltaBuffer,
    queued: VecDeque<TranscriptMessage>,
    suppress_model_text: bool,
}

impl TurnState<'_> {
    /// Applies the next transcript mutation and returns the snapshot after it.
    async fn advance(&mut self) -> Option<TranscriptSnapshot> {
        loop {
            if let Some(message) = self.queued.pop_front() {
                self.session.transcript.push_done(message);
                return Some(self.session.transcript.snapshot());
            }

            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Begin { prompt } => {
                    debug!(
                        event = "turn.started",
                        domain = "session",
                        session_id = %self.session.id,
                        turn_id = %self.turn_id
                    );
                    self.session
                        .transcript
                        .push_done(TranscriptMessage::user(prompt.clone()));
                    self.phase = Phase::Connect { prompt };
                    return Some(self.session.transcript.snapshot());
                }
                Phase::Connect { prompt } => {
                    let agent = Arc::clone(&self.session.agent);
                    let request = RunRequest::new(prompt)
                        .reset_memory(self.session.reset_memory_each_turn());
                    match agent.start_run(request).await {
                        Ok(events) => self.phase = Phase::Streaming { events },
                        Err(err) => return Some(self.fail(err.into())),
                    }
                }
                Phase::Streaming { mut events } => {
                    let next = events.next().await;
                    match next {
                        Some(Ok(AgentEvent::Step(step))) => {
                            self.deltas.clear();
                            debug!(
                                event = "turn.step",
                                domain = "session",
                                turn_id = %self.turn_id,
                                kind = step.kind()
                            );
                            match classify(&step, self.suppress_model_text) {
                                Ok(messages) => self.queued.extend(messages),
                                Err(err) => return Some(self.fail(err.into())),
                            }
                            self.phase = Phase::Streaming { events };
                        }
                        Some(Ok(AgentEvent::Delta(delta))) => {
                            let rendered = self.deltas.push(delta);
                            self.session
                                .transcript
                                .stream_pending(escape_angle_brackets(&rendered));
                            self.phase = Phase::Streaming { events };
                            return Some(self.session.transcript.snapshot());
                        }
                        Some(Err(err)) => return Some(self.fail(err.into())),
                        None => {
                            self.session.transcript.finish_pending();
                            info!(
                                event = "turn.finished",
                                domain = "session",
                                session_id = %self.session.id,
                                turn_id = %self.turn_id,
                                messages = self.session.transcript.len() as u64
                            );
                            return Some(self.session.transcript.snapshot());
                        }
                    }
                }
                Phase::Finished => return None,
            }
        }
    }

    fn fail(&mut self, err: TurnError) -> TranscriptSnapshot {
        warn!(
            event = "turn.failed",
            domain = "session",
            session_id = %self.session.id,
            turn_id = %self.turn_id,
            error = %err
        );
        self.queued.clear();
        self.phase = Phase::Finished;
        self.session
            .transcript
            .push_done(TranscriptMessage::assistant(format!("Error: {err}")).with_title("Error"));
        self.session.transcript.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use crate::errors::AgentError;
    use crate::event::{ActionStep, FinalAnswerStep, TypedAnswer};
    use crate::transcript::{MessageStatus, Role};
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum FakeBehavior {
        StartError(AgentError),
        Events(Vec<Result<AgentEvent, AgentError>>),
    }

    struct FakeAgent {
        behavior: FakeBehavior,
        inline: bool,
        fail_reset: bool,
        resets: AtomicUsize,
        requests: Mutex<Vec<RunRequest>>,
    }

    impl FakeAgent {
        fn new(behavior: FakeBehavior) -> Self {
            Self {
                behavior,
                inline: false,
                fail_reset: false,
                resets: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Agent for FakeAgent {
        fn profile(&self) -> AgentProfile {
            AgentProfile::default()
        }

        fn streams_outputs_inline(&self) -> bool {
            self.inline
        }

        async fn start_run(&self, request: RunRequest) -> Result<AgentEventStream, AgentError> {
            self.requests.lock().expect("requests").push(request);
            match &self.behavior {
                FakeBehavior::StartError(err) => Err(err.clone()),
                FakeBehavior::Events(events) => Ok(stream::iter(events.clone()).boxed()),
            }
        }

        async fn reset_memory(&self) -> Result<(), AgentError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reset {
                Err(AgentError::Reset("memory store offline".into()))
            } else {
                Ok(())
            }
        }
    }

    async fn collect_turn(session: &mut SessionState, prompt: &str) -> Vec<TranscriptSnapshot> {
        run_turn(session, prompt).collect().await
    }

    fn pending_count(snapshot: &TranscriptSnapshot) -> usize {
        snapshot.iter().filter(|m| m.status == MessageStatus::Pending).count()
    }

    #[tokio::test]
    async fn every_snapshot_has_at_most_one_pending_message() {
        let agent = FakeAgent::new(FakeBehavior::Events(vec![
            Ok(AgentEvent::delta("a")),
            Ok(AgentEvent::delta("b")),
            Ok(ActionStep {
                step_number: 1,
                ..ActionStep::default()
            }
            .into()),
            Ok(AgentEvent::delta("c")),
            Ok(AgentEvent::delta("d")),
        ]));
        let mut session = SessionState::new(Arc::new(agent), false);

        let snapshots = collect_turn(&mut session, "go").await;
        assert!(snapshots.iter().all(|s| pending_count(s) <= 1));
        let last = snapshots.last().expect("final snapshot");
        assert_eq!(pending_count(last), 0);
        assert_eq!(last.last().and_then(TranscriptMessage::text), Some("cd"));
    }

    #[tokio::test]
    async fn deltas_are_escaped_and_replaced_in_place() {
        let agent = FakeAgent::new(FakeBehavior::Events(vec![
            Ok(AgentEvent::delta("<b>")),
            Ok(AgentEvent::delta("x")),
        ]));
        let mut session = SessionState::new(Arc::new(agent), false);

        let snapshots = collect_turn(&mut session, "go").await;
        assert_eq!(snapshots.len(), 4);
        assert_eq!(snapshots[1][1].text(), Some("\\<b\\>"));
        assert_eq!(snapshots[2].len(), 2);
        assert_eq!(snapshots[2][1].text(), Some("\\<b\\>x"));
        assert!(snapshots[2][1].is_pending());
        assert!(!snapshots[3][1].is_pending());
    }

    #[tokio::test]
    async fn start_failure_ends_turn_with_error_message() {
        let agent = FakeAgent::new(FakeBehavior::StartError(AgentError::start("model offline")));
        let mut session = SessionState::new(Arc::new(agent), false);

        let snapshots = collect_turn(&mut session, "hi").await;
        assert_eq!(snapshots.len(), 2);
        let last = &snapshots[1];
        assert_eq!(last[0].role, Role::User);
        assert_eq!(last[1].text(), Some("Error: model offline"));
        assert_eq!(last[1].title.as_deref(), Some("Error"));
    }

    #[tokio::test]
    async fn mid_stream_failure_stops_consuming_events() {
        let agent = FakeAgent::new(FakeBehavior::Events(vec![
            Ok(AgentEvent::delta("partial")),
            Err(AgentError::stream("connection reset")),
            Ok(FinalAnswerStep {
                output: TypedAnswer::Text("never shown".into()),
            }
            .into()),
        ]));
        let mut session = SessionState::new(Arc::new(agent), false);

        let snapshots = collect_turn(&mut session, "hi").await;
        let last = snapshots.last().expect("snapshot");
        assert_eq!(last.len(), 3);
        assert_eq!(pending_count(last), 0);
        assert_eq!(last[2].text(), Some("Error: connection reset"));
        assert!(last.iter().all(|m| m.text() != Some("Final answer:\nnever shown\n")));
    }

    #[tokio::test]
    async fn run_request_carries_prompt_and_reset_flag() {
        let agent = Arc::new(FakeAgent::new(FakeBehavior::Events(Vec::new())));
        let mut session = SessionState::new(agent.clone(), true);
        assert!(session.reset_memory_each_turn());

        collect_turn(&mut session, "what is 1+2?").await;
        let requests = agent.requests.lock().expect("requests");
        assert_eq!(requests[0].task, "what is 1+2?");
        assert!(requests[0].reset_memory);
    }

    #[tokio::test]
    async fn dropped_turn_releases_the_session() {
        let agent = FakeAgent::new(FakeBehavior::Events(vec![
            Ok(AgentEvent::delta("a")),
            Ok(AgentEvent::delta("b")),
        ]));
        let mut session = SessionState::new(Arc::new(agent), false);

        {
            let mut turn = run_turn(&mut session, "first");
            assert!(turn.next().await.is_some());
            assert!(turn.next().await.is_some());
        }
        assert_eq!(session.transcript().len(), 2);

        let snapshots = collect_turn(&mut session, "second").await;
        assert!(snapshots.iter().all(|s| pending_count(s) <= 1));
    }

    #[tokio::test]
    async fn reset_is_idempotent_and_swallows_agent_failures() {
        let mut agent = FakeAgent::new(FakeBehavior::Events(vec![Ok(AgentEvent::delta("x"))]));
        agent.fail_reset = true;
        let agent = Arc::new(agent);
        let mut session = SessionState::new(agent.clone(), false);
        collect_turn(&mut session, "hi").await;

        reset_conversation(&mut session).await;
        assert!(session.transcript().is_empty());
        reset_conversation(&mut session).await;
        assert!(session.transcript().is_empty());
        assert_eq!(session.transcript().pending_index(), None);
        assert_eq!(agent.resets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inline_streaming_agents_skip_step_headers() {
        let mut agent = FakeAgent::new(FakeBehavior::Events(vec![Ok(ActionStep {
            step_number: 2,
            model_output: Some("thought".into()),
            ..ActionStep::default()
        }
        .into())]));
        agent.inline = true;
        let mut session = SessionState::new(Arc::new(agent), false);

        let snapshots = collect_turn(&mut session, "hi").await;
        let texts: Vec<_> = snapshots
            .last()
            .expect("snapshot")
            .iter()
            .filter_map(TranscriptMessage::text)
            .collect();
        assert_eq!(texts, vec!["hi", "Step 2", "-----"]);
    }

    #[test]
    fn escapes_both_angle_brackets() {
        assert_eq!(escape_angle_brackets("a<b>c"), "a\\<b\\>c");
        assert_eq!(escape_angle_brackets("plain"), "plain");
    }
}
