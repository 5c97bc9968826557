//! Per-conversation mutable state for the triage dialogue.
//!
//! One orchestrator owns one conversation's state; turns are processed one
//! utterance at a time and nothing is shared across conversations. Evidence
//! is a set, so repeated mentions of the same symptom are idempotent.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

// ── Phase ────────────────────────────────────────────────────────────────

/// Where a conversation is in the intake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for the opening utterance; nothing is extracted yet.
    Greeting,
    /// Gathering evidence until the threshold is met.
    Collecting,
    /// Enough evidence is on the table; the next turn runs the ranking.
    Ranking,
    /// A ranking was delivered; the next turn closes the cycle.
    Followup,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Greeting => write!(f, "greeting"),
            Self::Collecting => write!(f, "collecting"),
            Self::Ranking => write!(f, "ranking"),
            Self::Followup => write!(f, "followup"),
        }
    }
}

// ── Speaker / TurnRecord ─────────────────────────────────────────────────

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    /// The person describing symptoms.
    User,
    /// The triage engine.
    Engine,
}

/// A single turn kept in the bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub speaker: Speaker,
    pub text: String,
}

// ── ConversationState ────────────────────────────────────────────────────

/// Mutable record for one conversation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Affirmed symptoms accumulated across COLLECTING turns.
    pub accumulated: BTreeSet<String>,
    /// Current phase of the intake cycle.
    pub phase: Phase,
    /// Turns processed since the last reset.
    pub turn_count: u32,
    /// Bounded ring buffer of recent turns.
    pub history: VecDeque<TurnRecord>,
    /// Maximum number of turns to keep in the history.
    pub max_history: usize,
}

impl ConversationState {
    /// A fresh conversation at the greeting phase.
    pub fn new() -> Self {
        Self {
            accumulated: BTreeSet::new(),
            phase: Phase::Greeting,
            turn_count: 0,
            history: VecDeque::with_capacity(16),
            max_history: 16,
        }
    }

    /// Union newly affirmed symptoms into the evidence set.
    ///
    /// Returns how many of them were new.
    pub fn absorb(&mut self, affirmed: &BTreeSet<String>) -> usize {
        let before = self.accumulated.len();
        self.accumulated.extend(affirmed.iter().cloned());
        self.accumulated.len() - before
    }

    /// Record a turn in the bounded history.
    pub fn record(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.history.push_back(TurnRecord {
            speaker,
            text: text.into(),
        });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// Return to the greeting phase with cleared evidence and history.
    pub fn reset(&mut self) {
        self.accumulated.clear();
        self.history.clear();
        self.phase = Phase::Greeting;
        self.turn_count = 0;
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn absorb_is_idempotent_set_union() {
        let mut state = ConversationState::new();
        assert_eq!(state.absorb(&set(&["fever", "cough"])), 2);
        assert_eq!(state.absorb(&set(&["fever"])), 0);
        assert_eq!(state.absorb(&set(&["cough", "nausea"])), 1);
        assert_eq!(state.accumulated, set(&["cough", "fever", "nausea"]));
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = ConversationState::new();
        state.absorb(&set(&["fever"]));
        state.phase = Phase::Ranking;
        state.turn_count = 4;
        state.record(Speaker::User, "no more");
        state.reset();
        assert!(state.accumulated.is_empty());
        assert_eq!(state.phase, Phase::Greeting);
        assert_eq!(state.turn_count, 0);
        assert!(state.history.is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut state = ConversationState::new();
        state.max_history = 4;
        for i in 0..10 {
            state.record(Speaker::User, format!("turn {i}"));
        }
        assert_eq!(state.history.len(), 4);
        assert_eq!(state.history.front().unwrap().text, "turn 6");
    }
}
