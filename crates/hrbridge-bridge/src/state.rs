//! Upstream link state machine.
//!
//! Tracks where the bridge is in the lifecycle of its single upstream
//! heart-rate monitor connection.
//!
//! # States
//!
//! - `Idle`: no target address configured
//! - `Scanning`: scan cycles running, target not seen yet
//! - `Connecting`: target advertised, one connect attempt in flight
//! - `Streaming`: connected and subscribed to heart-rate notifications
//!
//! # Valid Transitions
//!
//! - Idle → Scanning (target set)
//! - Scanning → Connecting (target advertisement observed)
//! - Connecting → Streaming (connect and subscribe succeeded)
//! - Connecting → Scanning (connect or subscribe failed, or target changed)
//! - Streaming → Scanning (device lost or target changed)
//! - any → Idle (target cleared)
//!
//! # Examples
//!
//! ```
//! use hrbridge_bridge::{LinkState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(LinkState::Scanning).unwrap();
//! machine.transition_to(LinkState::Connecting).unwrap();
//! assert!(machine.transition_to(LinkState::Idle).is_ok());
//!
//! // Streaming is only reachable through Connecting
//! assert!(machine.transition_to(LinkState::Streaming).is_err());
//! ```

use hrbridge_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

/// Maximum number of transitions kept in history.
pub const MAX_HISTORY_SIZE: usize = 100;

/// Lifecycle of the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Streaming,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "Idle",
            LinkState::Scanning => "Scanning",
            LinkState::Connecting => "Connecting",
            LinkState::Streaming => "Streaming",
        };
        write!(f, "{}", name)
    }
}

impl LinkState {
    /// Whether moving from this state to `target` is allowed.
    ///
    /// # Examples
    ///
    /// ```
    /// use hrbridge_bridge::LinkState;
    ///
    /// assert!(LinkState::Idle.can_transition_to(&LinkState::Scanning));
    /// assert!(!LinkState::Idle.can_transition_to(&LinkState::Connecting));
    /// assert!(LinkState::Streaming.can_transition_to(&LinkState::Idle));
    /// ```
    pub fn can_transition_to(&self, target: &LinkState) -> bool {
        use LinkState::*;

        matches!(
            (self, target),
            (Idle, Scanning)
                | (Scanning, Connecting)
                | (Connecting, Streaming)
                | (Connecting, Scanning)
                | (Streaming, Scanning)
                | (Scanning, Idle)
                | (Connecting, Idle)
                | (Streaming, Idle)
        )
    }
}

/// Record of one state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: LinkState,

    pub to: LinkState,

    /// When the transition happened. Not serialized.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: LinkState, to: LinkState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Validating state machine with bounded transition history.
#[derive(Debug)]
pub struct StateMachine {
    current_state: LinkState,

    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a machine in `Idle`.
    pub fn new() -> Self {
        Self {
            current_state: LinkState::Idle,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> &LinkState {
        &self.current_state
    }

    /// Up to `count` most recent transitions, oldest first.
    pub fn recent(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Move to `new_state` if the transition table allows it.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not
    /// allowed; the machine is left unchanged.
    pub fn transition_to(&mut self, new_state: LinkState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.current_state = new_state;

        self.history.push_back(transition.clone());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        Ok(transition)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Walk the normal lifecycle up to `state`.
    fn machine_in(state: LinkState) -> StateMachine {
        let mut machine = StateMachine::new();
        for step in [LinkState::Scanning, LinkState::Connecting, LinkState::Streaming] {
            if *machine.current_state() == state {
                break;
            }
            machine.transition_to(step).unwrap();
        }
        machine
    }

    #[test]
    fn test_new_machine_starts_idle() {
        let machine = StateMachine::new();
        assert_eq!(machine.current_state(), &LinkState::Idle);
        assert!(machine.recent(MAX_HISTORY_SIZE).is_empty());
    }

    #[rstest]
    #[case(LinkState::Idle, LinkState::Scanning)]
    #[case(LinkState::Scanning, LinkState::Connecting)]
    #[case(LinkState::Connecting, LinkState::Streaming)]
    #[case(LinkState::Connecting, LinkState::Scanning)]
    #[case(LinkState::Streaming, LinkState::Scanning)]
    #[case(LinkState::Scanning, LinkState::Idle)]
    #[case(LinkState::Connecting, LinkState::Idle)]
    #[case(LinkState::Streaming, LinkState::Idle)]
    fn test_valid_transitions(#[case] from: LinkState, #[case] to: LinkState) {
        let mut machine = machine_in(from);
        let transition = machine.transition_to(to).unwrap();

        assert_eq!(transition.from, from);
        assert_eq!(transition.to, to);
        assert_eq!(machine.current_state(), &to);
    }

    #[rstest]
    #[case(LinkState::Idle, LinkState::Connecting)]
    #[case(LinkState::Idle, LinkState::Streaming)]
    #[case(LinkState::Idle, LinkState::Idle)]
    #[case(LinkState::Scanning, LinkState::Streaming)]
    #[case(LinkState::Scanning, LinkState::Scanning)]
    #[case(LinkState::Streaming, LinkState::Connecting)]
    #[case(LinkState::Streaming, LinkState::Streaming)]
    fn test_invalid_transitions(#[case] from: LinkState, #[case] to: LinkState) {
        let mut machine = machine_in(from);
        let recorded = machine.recent(MAX_HISTORY_SIZE).len();
        let err = machine.transition_to(to).unwrap_err();

        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(machine.current_state(), &from);
        assert_eq!(machine.recent(MAX_HISTORY_SIZE).len(), recorded);
    }

    #[test]
    fn test_full_connection_cycle_is_recorded() {
        let mut machine = StateMachine::new();
        for state in [
            LinkState::Scanning,
            LinkState::Connecting,
            LinkState::Streaming,
            LinkState::Scanning,
            LinkState::Idle,
        ] {
            machine.transition_to(state).unwrap();
        }

        let path: Vec<String> = machine
            .recent(MAX_HISTORY_SIZE)
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            path,
            vec![
                "Idle -> Scanning",
                "Scanning -> Connecting",
                "Connecting -> Streaming",
                "Streaming -> Scanning",
                "Scanning -> Idle",
            ]
        );
    }

    #[test]
    fn test_recent_returns_latest_oldest_first() {
        let mut machine = StateMachine::new();
        machine.transition_to(LinkState::Scanning).unwrap();
        machine.transition_to(LinkState::Connecting).unwrap();
        machine.transition_to(LinkState::Scanning).unwrap();

        let last = machine.recent(2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].to, LinkState::Connecting);
        assert_eq!(last[1].to, LinkState::Scanning);
        assert!(last[0].timestamp <= last[1].timestamp);
        assert_eq!(machine.recent(10).len(), 3);
    }

    #[test]
    fn test_history_size_limit() {
        let mut machine = StateMachine::new();
        machine.transition_to(LinkState::Scanning).unwrap();
        for _ in 0..MAX_HISTORY_SIZE {
            machine.transition_to(LinkState::Connecting).unwrap();
            machine.transition_to(LinkState::Scanning).unwrap();
        }

        assert_eq!(machine.recent(usize::MAX).len(), MAX_HISTORY_SIZE);
        assert_eq!(
            machine.recent(1).first().map(|t| t.to),
            Some(LinkState::Scanning)
        );
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&LinkState::Streaming).unwrap(),
            "\"streaming\""
        );
        let state: LinkState = serde_json::from_str("\"scanning\"").unwrap();
        assert_eq!(state, LinkState::Scanning);
    }
}
