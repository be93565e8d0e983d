//! Conversation rendering: the transcript and the reply-cycle protocol.
//!
//! Each reply cycle moves through these states:
//! - Idle -> AwaitingUser (a submission arrives and is recorded as a user turn)
//! - AwaitingUser -> Typing (the typing placeholder is shown)
//! - Idle -> Typing (assistant-initiated reply, i.e. the greeting)
//! - Typing -> Revealed (placeholder removed, assistant turn appended)
//! - Revealed -> Idle (cycle complete)
//!
//! The typing delay is a spawned task tied to the placeholder's [`TurnId`]
//! and a [`CancellationToken`], so overlapping cycles never remove each
//! other's placeholders.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use waybill_core::{Response, Turn, TurnId, TurnKind};

use crate::error::AssistantError;

// =============================================================================
// RenderTarget
// =============================================================================

/// The host surface that displays the widget.
///
/// Callbacks are invoked while the transcript lock is held, so they observe
/// turns in transcript order. Implementations must not call back into the
/// widget.
pub trait RenderTarget: Send + Sync {
    /// A turn was appended to the transcript.
    fn append(&self, turn: &Turn);
    /// A turn (always a typing placeholder) was removed.
    fn remove(&self, id: TurnId);
    /// The view should scroll so that `id` is visible.
    fn scroll_to(&self, _id: TurnId) {}
    /// The widget panel was shown or hidden.
    fn set_visible(&self, _visible: bool) {}
    /// The unread badge was shown or cleared.
    fn set_badge(&self, _visible: bool) {}
}

/// Everything a [`RenderTarget`] can be told, as data.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Appended(Turn),
    Removed(TurnId),
    ScrolledTo(TurnId),
    Visibility(bool),
    Badge(bool),
}

/// A render target that records every event, for headless hosts and tests.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<RenderEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        lock(&self.events).clone()
    }

    fn push(&self, event: RenderEvent) {
        lock(&self.events).push(event);
    }
}

impl RenderTarget for EventLog {
    fn append(&self, turn: &Turn) {
        self.push(RenderEvent::Appended(turn.clone()));
    }

    fn remove(&self, id: TurnId) {
        self.push(RenderEvent::Removed(id));
    }

    fn scroll_to(&self, id: TurnId) {
        self.push(RenderEvent::ScrolledTo(id));
    }

    fn set_visible(&self, visible: bool) {
        self.push(RenderEvent::Visibility(visible));
    }

    fn set_badge(&self, visible: bool) {
        self.push(RenderEvent::Badge(visible));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Reply cycle state machine
// =============================================================================

/// State of one reply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    /// No reply in progress.
    Idle,
    /// The user's submission is being recorded.
    AwaitingUser,
    /// The typing placeholder is visible.
    Typing,
    /// The assistant turn has been appended.
    Revealed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "Idle"),
            TurnState::AwaitingUser => write!(f, "AwaitingUser"),
            TurnState::Typing => write!(f, "Typing"),
            TurnState::Revealed => write!(f, "Revealed"),
        }
    }
}

impl TurnState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &TurnState) -> bool {
        matches!(
            (self, target),
            (TurnState::Idle, TurnState::AwaitingUser)
                | (TurnState::AwaitingUser, TurnState::Typing)
                | (TurnState::Idle, TurnState::Typing)
                | (TurnState::Typing, TurnState::Revealed)
                | (TurnState::Revealed, TurnState::Idle)
        )
    }
}

/// One in-flight reply: its state and the placeholder it owns.
#[derive(Debug)]
pub struct ReplyCycle {
    state: TurnState,
    placeholder: Option<TurnId>,
}

impl Default for ReplyCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyCycle {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            placeholder: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn placeholder(&self) -> Option<TurnId> {
        self.placeholder
    }

    /// Attempt to move to `target`, rejecting transitions not in the table.
    pub fn transition(&mut self, target: TurnState) -> Result<(), AssistantError> {
        if self.state.can_transition_to(&target) {
            tracing::trace!("Reply cycle: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(AssistantError::InvalidTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            })
        }
    }
}

// =============================================================================
// PendingReply
// =============================================================================

/// Handle to a scheduled reveal.
#[derive(Debug)]
pub struct PendingReply {
    placeholder: TurnId,
    handle: JoinHandle<Option<TurnId>>,
}

impl PendingReply {
    /// The typing placeholder this reply will replace.
    pub fn placeholder(&self) -> TurnId {
        self.placeholder
    }

    /// Wait for the reveal. Returns the assistant turn's id, or `None` if the
    /// widget was dropped first.
    pub async fn revealed(self) -> Option<TurnId> {
        self.handle.await.ok().flatten()
    }
}

// =============================================================================
// ConversationRenderer
// =============================================================================

/// Owns the transcript and drives reply cycles against a [`RenderTarget`].
pub struct ConversationRenderer {
    target: Arc<dyn RenderTarget>,
    transcript: Mutex<Vec<Turn>>,
    next_id: AtomicU64,
    typing_delay: Duration,
}

impl ConversationRenderer {
    pub fn new(target: Arc<dyn RenderTarget>, typing_delay: Duration) -> Self {
        Self {
            target,
            transcript: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            typing_delay,
        }
    }

    pub fn typing_delay(&self) -> Duration {
        self.typing_delay
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Vec<Turn> {
        lock(&self.transcript).clone()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.transcript).is_empty()
    }

    /// Start a reply cycle: record the user turn (if any) and show a fresh
    /// typing placeholder.
    pub fn start_cycle(&self, user_text: Option<&str>) -> Result<ReplyCycle, AssistantError> {
        let mut cycle = ReplyCycle::new();
        if let Some(text) = user_text {
            cycle.transition(TurnState::AwaitingUser)?;
            self.push(TurnKind::User {
                text: text.to_string(),
            });
        }
        cycle.transition(TurnState::Typing)?;
        cycle.placeholder = Some(self.push(TurnKind::Typing));
        Ok(cycle)
    }

    /// Replace the cycle's placeholder with the assistant turn.
    pub fn reveal(
        &self,
        cycle: &mut ReplyCycle,
        response: Response,
    ) -> Result<TurnId, AssistantError> {
        cycle.transition(TurnState::Revealed)?;
        if let Some(placeholder) = cycle.placeholder.take() {
            self.remove(placeholder);
        }
        let id = self.push(TurnKind::Assistant {
            message: response.message,
            options: response.options,
        });
        cycle.transition(TurnState::Idle)?;
        Ok(id)
    }

    /// Schedule the reveal of `cycle` after the typing delay.
    ///
    /// `respond` runs once the delay has elapsed, so it sees the freshest
    /// widget state. Cancelling `cancel` abandons the reveal and leaves the
    /// placeholder in place.
    pub fn schedule_reveal<F>(
        self: &Arc<Self>,
        runtime: &Handle,
        mut cycle: ReplyCycle,
        cancel: CancellationToken,
        respond: F,
    ) -> Result<PendingReply, AssistantError>
    where
        F: FnOnce() -> Response + Send + 'static,
    {
        let placeholder = cycle.placeholder().ok_or(AssistantError::InvalidTransition {
            from: cycle.state().to_string(),
            to: TurnState::Revealed.to_string(),
        })?;
        let renderer = Arc::clone(self);
        let delay = self.typing_delay;

        let handle = runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(turn_id = %placeholder, "Reveal cancelled");
                    None
                }
                _ = tokio::time::sleep(delay) => {
                    let response = respond();
                    match renderer.reveal(&mut cycle, response) {
                        Ok(id) => Some(id),
                        Err(e) => {
                            tracing::warn!(turn_id = %placeholder, error = %e, "Reveal failed");
                            None
                        }
                    }
                }
            }
        });

        Ok(PendingReply {
            placeholder,
            handle,
        })
    }

    // -- Private helpers --

    fn next_turn_id(&self) -> TurnId {
        TurnId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Append a turn and scroll to it.
    fn push(&self, kind: TurnKind) -> TurnId {
        let turn = Turn::new(self.next_turn_id(), kind);
        let id = turn.id;
        let mut transcript = lock(&self.transcript);
        self.target.append(&turn);
        transcript.push(turn);
        self.target.scroll_to(id);
        id
    }

    fn remove(&self, id: TurnId) {
        let mut transcript = lock(&self.transcript);
        let before = transcript.len();
        transcript.retain(|turn| !(turn.id == id && turn.is_typing()));
        if transcript.len() != before {
            self.target.remove(id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
