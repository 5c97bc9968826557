//! Conversation orchestrator: the finite-state machine that sequences
//! intake, gates on the evidence threshold, triggers ranking, and resets.
//!
//! One cycle runs `Greeting → Collecting → Ranking → Followup → Greeting`.
//! An explicit `reset` command returns to `Greeting` from any state, and the
//! emergency override short-circuits from any state without touching phase
//! or turn count: safety responses are never delayed behind the evidence
//! gate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationState, Phase, Speaker};
use crate::extract::SymptomExtractor;
use crate::intent::{Intent, IntentBoundary, IntentClassification};
use crate::lexicon::SymptomLexicon;
use crate::rank::Ranker;

/// How many ranked conditions the diagnosis response lists.
const RANKING_TOP_N: usize = 3;

// ---------------------------------------------------------------------------
// Response catalog
// ---------------------------------------------------------------------------

/// User-facing response templates.
///
/// `{remaining}` and `{conditions}` are substituted at render time. The
/// defaults are built in; a deployment can deserialize its own catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCatalog {
    pub greeting: String,
    pub more_needed: String,
    pub ready: String,
    pub diagnosis: String,
    pub goodbye: String,
    pub reset: String,
    pub emergency: String,
    pub ranking_unavailable: String,
}

impl Default for ResponseCatalog {
    fn default() -> Self {
        Self {
            greeting: "Hello, I can help narrow down what might be going on. \
                       Please describe your symptoms."
                .into(),
            more_needed: "Noted. Please tell me about {remaining} more symptom(s) \
                          so I can give a useful assessment."
                .into(),
            ready: "I have enough information to assess your symptoms. \
                    Say anything to see the most likely conditions."
                .into(),
            diagnosis: "Based on your symptoms, the most likely conditions are: \
                        {conditions}. This is advisory only, not a medical diagnosis."
                .into(),
            goodbye: "Take care, and see a clinician if symptoms persist. \
                      Starting a fresh conversation."
                .into(),
            reset: "Conversation reset. Please describe your symptoms.".into(),
            emergency: "Your message suggests a medical emergency. Please contact \
                        emergency services immediately."
                .into(),
            ranking_unavailable: "I could not assess your symptoms just now. \
                                  Please try again in a moment."
                .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Turn outcome
// ---------------------------------------------------------------------------

/// Structured failure kind attached to a turn, for logging by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnErrorKind {
    /// The delegated scorer failed or timed out; the turn may be retried.
    RankingUnavailable,
}

/// What one processed turn produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    /// The user-facing response text.
    pub text: String,
    /// The conversation phase after this turn.
    pub phase: Phase,
    /// Accumulated affirmed symptoms, in stable order.
    pub symptoms: Vec<String>,
    /// The effective intent of the utterance (emergency override applied).
    pub intent: IntentClassification,
    /// Structured error kind when the turn hit a recoverable failure.
    pub error_kind: Option<TurnErrorKind>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one conversation's state machine. Stateless itself: all mutable
/// state lives in the [`ConversationState`] passed to [`process`].
///
/// [`process`]: Orchestrator::process
#[derive(Debug)]
pub struct Orchestrator {
    extractor: Arc<SymptomExtractor>,
    intents: IntentBoundary,
    ranker: Ranker,
    catalog: ResponseCatalog,
    threshold: usize,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<SymptomExtractor>,
        intents: IntentBoundary,
        ranker: Ranker,
        catalog: ResponseCatalog,
        threshold: usize,
    ) -> Self {
        Self {
            extractor,
            intents,
            ranker,
            catalog,
            threshold,
        }
    }

    /// Process one utterance against one conversation's state.
    ///
    /// Serialization across turns of the same conversation is the caller's
    /// job (the engine locks per-conversation); distinct conversations may
    /// run concurrently.
    pub fn process(&self, state: &mut ConversationState, text: &str) -> TurnResponse {
        // Extraction always runs so the emergency screen sees affirmed
        // symptoms, but evidence is only absorbed in the collecting phase.
        let extraction = self.extractor.extract(text);
        let intent = self.intents.classify(text, &extraction.affirmed);

        // Emergency short-circuit: phase and turn count untouched.
        if intent.intent == Intent::Emergency {
            tracing::warn!(phase = %state.phase, "emergency override triggered");
            return TurnResponse {
                text: self.catalog.emergency.clone(),
                phase: state.phase,
                symptoms: accumulated(state),
                intent,
                error_kind: None,
            };
        }

        // Explicit reset wins in any state.
        if text.trim().eq_ignore_ascii_case("reset") {
            state.reset();
            return TurnResponse {
                text: self.catalog.reset.clone(),
                phase: state.phase,
                symptoms: Vec::new(),
                intent,
                error_kind: None,
            };
        }

        match state.phase {
            Phase::Greeting => {
                state.turn_count += 1;
                state.record(Speaker::User, text);
                state.phase = Phase::Collecting;
                self.respond(state, self.catalog.greeting.clone(), intent, None)
            }

            Phase::Collecting => {
                state.turn_count += 1;
                state.record(Speaker::User, text);
                let newly = state.absorb(&extraction.affirmed);
                tracing::debug!(
                    newly,
                    total = state.accumulated.len(),
                    threshold = self.threshold,
                    "absorbed evidence"
                );

                if state.accumulated.len() >= self.threshold {
                    state.phase = Phase::Ranking;
                    self.respond(state, self.catalog.ready.clone(), intent, None)
                } else {
                    let remaining = self.threshold - state.accumulated.len();
                    let text = self
                        .catalog
                        .more_needed
                        .replace("{remaining}", &remaining.to_string());
                    self.respond(state, text, intent, None)
                }
            }

            Phase::Ranking => match self.ranker.rank(&state.accumulated) {
                Ok(prediction) => {
                    state.turn_count += 1;
                    state.record(Speaker::User, text);
                    let conditions: Vec<String> = prediction
                        .entries
                        .iter()
                        .take(RANKING_TOP_N)
                        .map(|e| format!("{} ({:.1}%)", e.disease, e.score * 100.0))
                        .collect();
                    let text = self
                        .catalog
                        .diagnosis
                        .replace("{conditions}", &conditions.join(", "));
                    state.phase = Phase::Followup;
                    self.respond(state, text, intent, None)
                }
                // Retryable: the conversation holds at Ranking, the turn
                // does not count.
                Err(error) => {
                    tracing::warn!(%error, "ranking unavailable, holding state");
                    TurnResponse {
                        text: self.catalog.ranking_unavailable.clone(),
                        phase: state.phase,
                        symptoms: accumulated(state),
                        intent,
                        error_kind: Some(TurnErrorKind::RankingUnavailable),
                    }
                }
            },

            // One-shot cycle: any followup input closes and resets.
            Phase::Followup => {
                let text = self.catalog.goodbye.clone();
                state.reset();
                TurnResponse {
                    text,
                    phase: state.phase,
                    symptoms: Vec::new(),
                    intent,
                    error_kind: None,
                }
            }
        }
    }

    fn respond(
        &self,
        state: &mut ConversationState,
        text: String,
        intent: IntentClassification,
        error_kind: Option<TurnErrorKind>,
    ) -> TurnResponse {
        state.record(Speaker::Engine, text.clone());
        TurnResponse {
            text,
            phase: state.phase,
            symptoms: accumulated(state),
            intent,
            error_kind,
        }
    }
}

fn accumulated(state: &ConversationState) -> Vec<String> {
    state.accumulated.iter().cloned().collect()
}

/// Render accumulated symptom ids for display.
pub fn display_symptoms(symptoms: &[String]) -> String {
    symptoms
        .iter()
        .map(|s| SymptomLexicon::display_name(s))
        .collect::<Vec<_>>()
        .join(", ")
}
