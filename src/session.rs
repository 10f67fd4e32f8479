//! Chat session controller
//!
//! Owns the working message list of the active conversation and feeds questions
//! to a [`QuestionBackend`] one at a time, in the order they were sent.
//!
//! Two independent guards decide whether a settled request may touch state:
//! its cancellation token, and the session counter captured when it started.
//! Switching or resetting the conversation bumps the counter and cancels the
//! in-flight request, so a late answer can never land in the wrong thread.

use crate::ai::{AskRequest, AskResponse, ChatApiError, ChatResult, QuestionBackend};
use crate::types::{ChatMessage, SendOptions};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Answers containing this phrase carry no usable sources.
pub const NO_INFORMATION_SENTINEL: &str = "Maaf, informasi mengenai hal tersebut tidak tersedia";

/// Receives the conversation id and the full working list after each change.
///
/// Invoked while the session lock is held; it must not call back into the session.
pub type MessagesChanged = Arc<dyn Fn(Option<&str>, &[ChatMessage]) + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Processing,
    /// Transient while the working list is swapped for another conversation.
    /// Change notifications are suppressed in this phase.
    Switching,
}

#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub is_typing: bool,
    pub error: Option<ChatApiError>,
    pub queued: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateSummary {
    pub last_message: Option<ChatMessage>,
    pub total_messages: usize,
}

#[derive(Default)]
pub struct SessionOptions {
    pub conversation_id: Option<String>,
    pub initial_messages: Vec<ChatMessage>,
    pub on_messages_change: Option<MessagesChanged>,
    /// Runtime that runs the questions. Defaults to the one current at construction.
    pub runtime: Option<Handle>,
}

struct QueuedRequest {
    id: String,
    prompt: String,
    options: SendOptions,
}

struct InFlight {
    request_id: String,
    token: CancellationToken,
}

struct SessionState {
    conversation_id: Option<String>,
    phase: SessionPhase,
    messages: Vec<ChatMessage>,
    session_id: u64,
    queue: VecDeque<QueuedRequest>,
    in_flight: Option<InFlight>,
    is_loading: bool,
    is_typing: bool,
    error: Option<ChatApiError>,
    torn_down: bool,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            messages: self.messages.clone(),
            is_loading: self.is_loading,
            is_typing: self.is_typing,
            error: self.error.clone(),
            queued: self.queue.len(),
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!(request = %in_flight.request_id, "cancelling in-flight question");
            in_flight.token.cancel();
        }
        self.queue.clear();
        self.is_loading = false;
        self.is_typing = false;
        if self.phase == SessionPhase::Processing {
            self.phase = SessionPhase::Idle;
        }
    }
}

struct Shared {
    backend: Arc<dyn QuestionBackend>,
    runtime: Option<Handle>,
    on_change: Option<MessagesChanged>,
    state: Mutex<SessionState>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    /// Publish the current state; report the message list outward unless switching.
    fn commit(&self, state: &SessionState, messages_changed: bool) {
        if messages_changed
            && state.phase != SessionPhase::Switching
            && let Some(on_change) = &self.on_change
        {
            on_change(state.conversation_id.as_deref(), &state.messages);
        }
        self.snapshot.send_replace(state.snapshot());
    }

    /// Start the head of the queue unless a request is already in flight.
    fn start_next(self: &Arc<Self>, state: &mut SessionState) {
        if state.torn_down || state.in_flight.is_some() || state.queue.is_empty() {
            return;
        }
        let Some(runtime) = self.runtime() else {
            tracing::warn!("no tokio runtime available, question left queued");
            return;
        };
        let Some(request) = state.queue.pop_front() else {
            return;
        };

        let token = CancellationToken::new();
        let session_id = state.session_id;
        state.in_flight = Some(InFlight {
            request_id: request.id.clone(),
            token: token.clone(),
        });
        state.phase = SessionPhase::Processing;
        state.is_loading = true;
        state.is_typing = true;
        state.error = None;

        tracing::debug!(
            request = %request.id,
            session = session_id,
            queued = state.queue.len(),
            "dispatching question"
        );

        let shared = Arc::clone(self);
        runtime.spawn(async move {
            let ask = AskRequest::new(request.prompt).with_options(request.options);
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = shared.backend.ask(ask, &token) => Some(result),
            };
            shared.settle(&request.id, &token, session_id, outcome);
        });
    }

    /// Apply the outcome of a request. Returns whether it was applied.
    fn settle(
        self: &Arc<Self>,
        request_id: &str,
        token: &CancellationToken,
        session_id: u64,
        outcome: Option<ChatResult<AskResponse>>,
    ) -> bool {
        let mut state = self.lock();
        if state.torn_down {
            return false;
        }

        if state
            .in_flight
            .as_ref()
            .is_some_and(|f| f.request_id == request_id)
        {
            state.in_flight = None;
        }

        let stale = token.is_cancelled() || session_id != state.session_id;
        let (applied, messages_changed) = match outcome {
            _ if stale => {
                tracing::debug!(request = request_id, "discarding stale response");
                (false, false)
            }
            None => (false, false),
            Some(Ok(response)) => {
                state.messages.push(assistant_message(response));
                (true, true)
            }
            Some(Err(err)) => {
                tracing::warn!(request = request_id, status = err.status, "question failed: {}", err);
                state.error = Some(err);
                (true, false)
            }
        };

        if applied {
            self.start_next(&mut state);
        }
        if state.in_flight.is_none() {
            state.is_loading = !state.queue.is_empty();
            state.is_typing = false;
            if state.phase == SessionPhase::Processing {
                state.phase = SessionPhase::Idle;
            }
        }

        self.commit(&state, messages_changed);
        applied
    }
}

fn assistant_message(response: AskResponse) -> ChatMessage {
    let sources = if response.answer.contains(NO_INFORMATION_SENTINEL) {
        Vec::new()
    } else {
        response.source_urls
    };
    ChatMessage::assistant(response.answer, sources)
}

/// Controller for the active conversation. Dropping it cancels outstanding work.
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn QuestionBackend>, options: SessionOptions) -> Self {
        let state = SessionState {
            conversation_id: options.conversation_id,
            phase: SessionPhase::Idle,
            messages: options.initial_messages,
            session_id: 0,
            queue: VecDeque::new(),
            in_flight: None,
            is_loading: false,
            is_typing: false,
            error: None,
            torn_down: false,
        };
        let (snapshot, _) = watch::channel(state.snapshot());

        Self {
            shared: Arc::new(Shared {
                backend,
                runtime: options.runtime.or_else(|| Handle::try_current().ok()),
                on_change: options.on_messages_change,
                state: Mutex::new(state),
                snapshot,
            }),
        }
    }

    /// Append the user message right away and queue the question.
    ///
    /// Blank input is ignored, as is any input when the session has no runtime
    /// to run the question on.
    pub fn send_message(&self, content: &str, options: SendOptions) {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.shared.runtime().is_none() {
            tracing::warn!("no tokio runtime available, message dropped");
            return;
        }

        let mut state = self.shared.lock();
        if state.torn_down {
            return;
        }

        let user_message = ChatMessage::user(trimmed);
        state.queue.push_back(QueuedRequest {
            id: user_message.id.clone(),
            prompt: trimmed.to_string(),
            options,
        });
        state.messages.push(user_message);
        state.error = None;
        state.is_loading = true;

        self.shared.start_next(&mut state);
        self.shared.commit(&state, true);
    }

    /// Follow the caller's active conversation.
    ///
    /// Leaving a conversation invalidates every request made for it and replaces
    /// the working list with `messages` without reporting the swap outward.
    pub fn set_conversation(&self, conversation_id: Option<String>, messages: Vec<ChatMessage>) {
        let mut state = self.shared.lock();
        if state.conversation_id == conversation_id {
            return;
        }

        let previous = std::mem::replace(&mut state.conversation_id, conversation_id);
        tracing::debug!(?previous, current = ?state.conversation_id, "conversation changed");

        if previous.is_some() {
            state.session_id += 1;
            state.cancel_pending();
            state.phase = SessionPhase::Switching;
            state.messages = messages;
            state.error = None;
            self.shared.commit(&state, true);
            state.phase = SessionPhase::Idle;
            self.shared.commit(&state, false);
        } else if !messages.is_empty() {
            let resume = state.phase;
            state.phase = SessionPhase::Switching;
            state.messages = messages;
            self.shared.commit(&state, true);
            state.phase = resume;
            self.shared.commit(&state, false);
        }
    }

    /// Start over: invalidate outstanding requests and clear the working list.
    pub fn reset_conversation(&self) {
        let mut state = self.shared.lock();
        state.session_id += 1;
        state.cancel_pending();
        state.messages.clear();
        state.error = None;
        self.shared.commit(&state, true);
    }

    /// Cancel the in-flight request and drop queued ones, keeping the messages.
    pub fn cancel_pending_request(&self) {
        let mut state = self.shared.lock();
        state.cancel_pending();
        self.shared.commit(&state, false);
    }

    pub fn dismiss_error(&self) {
        let mut state = self.shared.lock();
        if state.error.take().is_some() {
            self.shared.commit(&state, false);
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.shared.lock().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().is_loading
    }

    pub fn is_typing(&self) -> bool {
        self.shared.lock().is_typing
    }

    pub fn error(&self) -> Option<ChatApiError> {
        self.shared.lock().error.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().phase
    }

    pub fn session_id(&self) -> u64 {
        self.shared.lock().session_id
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.shared.lock().conversation_id.clone()
    }

    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn summary(&self) -> StateSummary {
        let state = self.shared.lock();
        StateSummary {
            last_message: state.messages.last().cloned(),
            total_messages: state.messages.len(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot.subscribe()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.torn_down = true;
        state.cancel_pending();
    }
}
