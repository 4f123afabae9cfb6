//! Per-call session state and the transcript assembler.
//!
//! All mutable call state lives behind one `parking_lot::Mutex` that is
//! never held across an await point: mutations return [`TurnEffects`] and
//! the async layer performs the resulting sends outside the lock.

use std::sync::Arc;
use std::time::Instant;

use lyra_core::{AgentConfig, CallSnapshot, CallStatus, Role, SessionError, Utterance};
use lyra_protocol::live::{ClientContent, ServerContent, UsageMetadata};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Text of the silent wake-up ping injected after `setupComplete`. A
/// downstream `clientContent` matching it exactly is never transcribed.
pub const WAKE_UP_TEXT: &str = "Olá";

/// Wind-down instruction used when the tenant configured none.
const DEFAULT_ALERT_INSTRUCTION: &str =
    "SISTEMA: O tempo de atendimento está acabando. Finalize gentilmente a conversa agora.";

/// Sends triggered by a state mutation, performed by the caller outside the
/// session lock.
#[derive(Debug, Default)]
pub struct TurnEffects {
    /// Wind-down instruction to inject upstream as a synthetic user turn.
    pub alert_instruction: Option<String>,
    /// Snapshot to checkpoint to the dashboard.
    pub checkpoint: Option<CallSnapshot>,
    /// The agent asked to end the call and the turn just completed: notify
    /// the client and start the graceful drain.
    pub begin_termination: bool,
}

/// One live conversation bridged between a client and the upstream service.
pub struct CallSession {
    /// Stable call id.
    pub id: String,
    /// Tenant key.
    pub client_name: String,
    to_upstream: mpsc::Sender<String>,
    to_client: mpsc::Sender<String>,
    cancel: CancellationToken,
    state: Mutex<CallState>,
}

struct CallState {
    started: Instant,
    transcript: Vec<Utterance>,
    pending_user_text: String,
    pending_agent_text: String,
    input_tokens: u64,
    output_tokens: u64,
    status: CallStatus,
    was_graceful: bool,
    should_terminate: bool,
    duration_limit: u32,
    termination_alert_time: u32,
    alert_instruction: String,
    alert_sent: bool,
}

impl CallSession {
    /// Create a session with bounded outbound queues. Returns the session
    /// plus the receiving ends for the two writer pumps.
    #[must_use]
    pub fn new(
        id: String,
        client_name: String,
        queue_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<String>, mpsc::Receiver<String>) {
        let (up_tx, up_rx) = mpsc::channel(queue_capacity);
        let (cl_tx, cl_rx) = mpsc::channel(queue_capacity);
        let session = Arc::new(Self {
            id,
            client_name,
            to_upstream: up_tx,
            to_client: cl_tx,
            cancel: CancellationToken::new(),
            state: Mutex::new(CallState {
                started: Instant::now(),
                transcript: Vec::new(),
                pending_user_text: String::new(),
                pending_agent_text: String::new(),
                input_tokens: 0,
                output_tokens: 0,
                status: CallStatus::Active,
                was_graceful: false,
                should_terminate: false,
                duration_limit: 0,
                termination_alert_time: 0,
                alert_instruction: String::new(),
                alert_sent: false,
            }),
        });
        (session, up_rx, cl_rx)
    }

    // ── Cancellation ─────────────────────────────────────────────────

    /// Cancel the session scope. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the session scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve when the session scope is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    // ── Outbound queues ──────────────────────────────────────────────

    /// Enqueue a text frame for the upstream writer. Blocks when the queue
    /// is full (backpressure onto the producing pump).
    pub async fn send_upstream(&self, frame: String) -> Result<(), SessionError> {
        self.to_upstream
            .send(frame)
            .await
            .map_err(|_| SessionError::QueueClosed)
    }

    /// Enqueue a text frame for the client writer.
    pub async fn send_client(&self, frame: String) -> Result<(), SessionError> {
        self.to_client
            .send(frame)
            .await
            .map_err(|_| SessionError::QueueClosed)
    }

    /// Whether the client-bound queue has fully drained.
    #[must_use]
    pub fn client_queue_empty(&self) -> bool {
        self.to_client.capacity() == self.to_client.max_capacity()
    }

    // ── Policy & counters ────────────────────────────────────────────

    /// Install the duration policy from a freshly fetched configuration.
    pub fn apply_policy(&self, cfg: &AgentConfig) {
        let mut state = self.state.lock();
        state.duration_limit = cfg.duration_limit;
        state.termination_alert_time = cfg.termination_alert_time;
        state.alert_instruction = cfg.proactive_alert_instruction.clone();
    }

    /// Record the latest token counts from upstream usage metadata.
    pub fn record_usage(&self, usage: &UsageMetadata) {
        let mut state = self.state.lock();
        state.input_tokens = usage.prompt_token_count;
        state.output_tokens = usage.candidates_token_count;
    }

    /// Seconds elapsed since the session started.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.state.lock().started.elapsed().as_secs()
    }

    // ── Transcript assembly ──────────────────────────────────────────

    /// Accumulate typed text from a downstream `clientContent` into the
    /// pending user buffer. The silent wake-up ping is excluded.
    pub fn accumulate_client_text(&self, content: &ClientContent) {
        if is_wake_up_ping(content) {
            return;
        }
        let mut state = self.state.lock();
        for turn in &content.turns {
            for part in &turn.parts {
                if let Some(text) = part.text.as_deref().filter(|t| !t.is_empty()) {
                    if !state.pending_user_text.is_empty() {
                        state.pending_user_text.push(' ');
                    }
                    state.pending_user_text.push_str(text);
                }
            }
        }
    }

    /// Fold one upstream `serverContent` into the transcript state.
    ///
    /// Utterances are minted only here: the pending user buffer flushes
    /// when the model starts responding (or at turn completion), the
    /// pending agent buffer flushes at turn completion. The returned
    /// effects carry the wind-down alert, the checkpoint snapshot, and the
    /// deferred-termination signal.
    pub fn ingest_server_content(&self, content: &ServerContent) -> TurnEffects {
        let mut state = self.state.lock();
        let mut effects = TurnEffects::default();

        // The model started responding: the user's streamed transcription
        // is a complete user turn.
        if content.model_turn.is_some() && !state.pending_user_text.is_empty() {
            let text = std::mem::take(&mut state.pending_user_text);
            state.transcript.push(Utterance::new(Role::User, text));
        }

        if let Some(t) = &content.input_transcription {
            state.pending_user_text.push_str(&t.text);
        }

        if let Some(turn) = &content.model_turn {
            for part in &turn.parts {
                if let Some(text) = part.text.as_deref() {
                    state.pending_agent_text.push_str(text);
                }
            }
        }

        if let Some(t) = &content.output_transcription {
            state.pending_agent_text.push_str(&t.text);
        }

        if content.turn_complete {
            // User-only turn: no model content arrived before the boundary.
            if !state.pending_user_text.is_empty() {
                let text = std::mem::take(&mut state.pending_user_text);
                state.transcript.push(Utterance::new(Role::User, text));
            }
            if !state.pending_agent_text.is_empty() {
                let text = std::mem::take(&mut state.pending_agent_text);
                state.transcript.push(Utterance::new(Role::Agent, text));
            }

            let elapsed = state.started.elapsed().as_secs();
            if !state.alert_sent
                && state.termination_alert_time > 0
                && elapsed >= u64::from(state.termination_alert_time)
            {
                state.alert_sent = true;
                let instruction = if state.alert_instruction.is_empty() {
                    DEFAULT_ALERT_INSTRUCTION.to_string()
                } else {
                    state.alert_instruction.clone()
                };
                effects.alert_instruction = Some(instruction);
            }

            effects.checkpoint = Some(snapshot_locked(&self.id, &self.client_name, &state));
            effects.begin_termination = state.should_terminate;
        }

        effects
    }

    /// Append the agent-side markdown utterance for a delivered link.
    pub fn append_link_utterance(&self, alias: &str, url: &str) {
        let mut state = self.state.lock();
        state
            .transcript
            .push(Utterance::new(Role::Agent, format!("[{alias}]({url})")));
    }

    // ── Lifecycle flags ──────────────────────────────────────────────

    /// The agent invoked the terminate tool: mark the call completed and
    /// request deferred termination. Idempotent; returns `true` on the
    /// first call.
    pub fn mark_finalized(&self) -> bool {
        let mut state = self.state.lock();
        let first = !state.should_terminate;
        state.was_graceful = true;
        if state.status == CallStatus::Active {
            state.status = CallStatus::Completed;
        }
        state.should_terminate = true;
        first
    }

    /// The client hung up via the beacon: the ending is not graceful.
    pub fn mark_beacon(&self) {
        self.state.lock().was_graceful = false;
    }

    /// Whether the agent has requested termination.
    #[must_use]
    pub fn should_terminate(&self) -> bool {
        self.state.lock().should_terminate
    }

    /// Whether the agent ended the call itself.
    #[must_use]
    pub fn was_graceful(&self) -> bool {
        self.state.lock().was_graceful
    }

    /// Current call status.
    #[must_use]
    pub fn status(&self) -> CallStatus {
        self.state.lock().status
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Deep-copied snapshot of the current call state.
    #[must_use]
    pub fn snapshot(&self) -> CallSnapshot {
        let state = self.state.lock();
        snapshot_locked(&self.id, &self.client_name, &state)
    }

    /// Terminal snapshot for cleanup: a still-active call becomes
    /// `Interrupted` first.
    #[must_use]
    pub fn finalize(&self) -> CallSnapshot {
        let mut state = self.state.lock();
        if state.status == CallStatus::Active {
            state.status = CallStatus::Interrupted;
        }
        snapshot_locked(&self.id, &self.client_name, &state)
    }

    /// Cloned transcript view.
    #[must_use]
    pub fn transcript(&self) -> Vec<Utterance> {
        self.state.lock().transcript.clone()
    }

    /// Rewind the session start for policy tests.
    #[cfg(test)]
    pub(crate) fn rewind_start(&self, secs: u64) {
        let mut state = self.state.lock();
        state.started = state
            .started
            .checked_sub(std::time::Duration::from_secs(secs))
            .expect("rewound start underflowed");
    }
}

fn snapshot_locked(id: &str, client_name: &str, state: &CallState) -> CallSnapshot {
    CallSnapshot {
        call_id: id.to_string(),
        client_name: client_name.to_string(),
        new_transcript: state.transcript.clone(),
        duration_seconds: state.started.elapsed().as_secs(),
        input_tokens: state.input_tokens,
        output_tokens: state.output_tokens,
        status: state.status,
    }
}

/// The system's silent wake-up: a single user turn with the single literal
/// part `"Olá"`.
fn is_wake_up_ping(content: &ClientContent) -> bool {
    content.turns.len() == 1
        && content.turns[0].parts.len() == 1
        && content.turns[0].parts[0].text.as_deref() == Some(WAKE_UP_TEXT)
}
