//! Session state machine.
//!
//! The current state lives in a `watch` channel: readers get a consistent
//! snapshot without locking, and every write goes through
//! [`SessionStateMachine::transition`].

use std::fmt;

use {serde::Serialize, tokio::sync::watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    AwaitingPairing,
    Authenticated,
    Ready,
    Disconnected,
    ShuttingDown,
    Terminated,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        }
    }

    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    fn is_closing(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Initialize,
    PairingChallenge,
    Authenticated,
    AuthFailure,
    Ready,
    Disconnected,
    ShutdownRequested,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no transition from {from} on {event:?}")]
pub struct TransitionError {
    pub from: SessionState,
    pub event: SessionEvent,
}

/// Transition table. `None` means the event is not valid in `from`.
pub fn next_state(from: SessionState, event: SessionEvent) -> Option<SessionState> {
    use {SessionEvent as E, SessionState as S};

    if from.is_closing() {
        return match (from, event) {
            (S::ShuttingDown, E::Terminated) => Some(S::Terminated),
            _ => None,
        };
    }

    match (from, event) {
        (_, E::ShutdownRequested) => Some(S::ShuttingDown),
        (S::Uninitialized, E::Initialize) => Some(S::Initializing),
        (S::Initializing | S::AwaitingPairing | S::Disconnected, E::PairingChallenge) => {
            Some(S::AwaitingPairing)
        },
        (S::Initializing | S::AwaitingPairing | S::Disconnected, E::Authenticated) => {
            Some(S::Authenticated)
        },
        // Auth failure leaves the session where it was: not ready, not fatal.
        (S::Initializing | S::AwaitingPairing | S::Disconnected, E::AuthFailure) => Some(from),
        (S::Authenticated | S::Disconnected, E::Ready) => Some(S::Ready),
        (S::Initializing | S::AwaitingPairing | S::Authenticated | S::Ready, E::Disconnected) => {
            Some(S::Disconnected)
        },
        _ => None,
    }
}

/// Owner of the current [`SessionState`].
#[derive(Debug)]
pub struct SessionStateMachine {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Uninitialized);
        Self { tx }
    }

    pub fn state(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Apply `event` atomically. Returns the resulting state.
    pub fn transition(&self, event: SessionEvent) -> Result<SessionState, TransitionError> {
        let mut outcome = Err(TransitionError {
            from: SessionState::Uninitialized,
            event,
        });
        self.tx.send_if_modified(|current| {
            let from = *current;
            match next_state(from, event) {
                Some(next) => {
                    outcome = Ok(next);
                    *current = next;
                    next != from
                },
                None => {
                    outcome = Err(TransitionError { from, event });
                    false
                },
            }
        });
        outcome
    }
}
