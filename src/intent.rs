//! Intent classification boundary for user utterances.
//!
//! The classifier proper is a pluggable capability behind [`IntentModel`];
//! the built-in [`KeywordIntentModel`] is a deterministic fallback that works
//! without any trained model. On top of whatever model is configured sits a
//! deterministic emergency override: critical terms in the text or critical
//! affirmed symptoms force the `Emergency` intent at full confidence. The
//! override takes precedence because a missed emergency costs far more than
//! a false positive.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{IntentError, IntentResult};
use crate::lexicon::SymptomLexicon;

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// The fixed intent label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// The user is describing symptoms.
    SymptomReport,
    /// The user is asking a question (treatment, condition, process).
    Inquiry,
    /// The utterance signals a medical emergency.
    Emergency,
    /// A greeting.
    Greeting,
    /// A farewell.
    Farewell,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SymptomReport => write!(f, "symptom-report"),
            Self::Inquiry => write!(f, "inquiry"),
            Self::Emergency => write!(f, "emergency"),
            Self::Greeting => write!(f, "greeting"),
            Self::Farewell => write!(f, "farewell"),
        }
    }
}

/// An intent label with the classifier's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f32,
}

// ---------------------------------------------------------------------------
// Model boundary
// ---------------------------------------------------------------------------

/// The pluggable intent classification capability.
///
/// Implementations may delegate to an external service or trained model.
/// They must be safe to call concurrently across conversations.
pub trait IntentModel: Send + Sync {
    /// Classify one utterance.
    fn classify(&self, text: &str) -> IntentResult<IntentClassification>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Deterministic keyword classifier. First matching rule wins.
///
/// This is the always-available fallback: it never fails and has no training
/// dependency.
#[derive(Debug, Default)]
pub struct KeywordIntentModel;

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "greetings", "morning", "evening"];
const FAREWELL_WORDS: &[&str] = &["bye", "goodbye", "farewell", "thanks", "thank"];
const QUESTION_WORDS: &[&str] = &["what", "who", "how", "why", "where", "when", "which", "should", "can", "could", "is", "does", "do"];

impl KeywordIntentModel {
    fn classify_keywords(text: &str) -> IntentClassification {
        let lower = text.trim().to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();

        if tokens.is_empty() {
            return IntentClassification {
                intent: Intent::Inquiry,
                confidence: 0.2,
            };
        }

        // Explicit emergency vocabulary, independent of the critical-term
        // screen that wraps every model.
        if tokens.iter().any(|t| matches!(*t, "emergency" | "ambulance" | "911")) {
            return IntentClassification {
                intent: Intent::Emergency,
                confidence: 0.9,
            };
        }

        // Short salutations only: "hi, I have a headache" is a report.
        let first = tokens[0].trim_matches(|c: char| !c.is_alphanumeric());
        if tokens.len() <= 3 && GREETING_WORDS.contains(&first) {
            return IntentClassification {
                intent: Intent::Greeting,
                confidence: 0.9,
            };
        }
        if tokens.len() <= 3 && FAREWELL_WORDS.contains(&first) {
            return IntentClassification {
                intent: Intent::Farewell,
                confidence: 0.9,
            };
        }

        if lower.ends_with('?') || QUESTION_WORDS.contains(&first) {
            return IntentClassification {
                intent: Intent::Inquiry,
                confidence: 0.75,
            };
        }

        IntentClassification {
            intent: Intent::SymptomReport,
            confidence: 0.5,
        }
    }
}

impl IntentModel for KeywordIntentModel {
    fn classify(&self, text: &str) -> IntentResult<IntentClassification> {
        Ok(Self::classify_keywords(text))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

// ---------------------------------------------------------------------------
// Emergency screen
// ---------------------------------------------------------------------------

/// The deterministic emergency screen built from the lexicon pack's critical
/// term and critical symptom sets.
#[derive(Debug)]
pub struct EmergencyScreen {
    terms: Vec<String>,
    critical_symptoms: BTreeSet<String>,
}

impl EmergencyScreen {
    /// Build the screen from a loaded lexicon.
    pub fn from_lexicon(lexicon: &SymptomLexicon) -> Self {
        Self {
            terms: lexicon
                .emergency_terms()
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            critical_symptoms: lexicon.critical_symptoms().clone(),
        }
    }

    /// Whether the utterance or its affirmed symptoms signal an emergency.
    pub fn is_emergency(&self, text: &str, affirmed: &BTreeSet<String>) -> bool {
        let lower = text.to_lowercase();
        if self.terms.iter().any(|term| lower.contains(term.as_str())) {
            return true;
        }
        affirmed.iter().any(|s| self.critical_symptoms.contains(s))
    }
}

// ---------------------------------------------------------------------------
// Boundary: screen + model + fallback
// ---------------------------------------------------------------------------

/// The full intent boundary the orchestrator consumes.
///
/// Order of precedence: emergency screen, configured model, keyword
/// fallback. The boundary never fails: a delegated model error is logged and
/// recovered through the fallback.
pub struct IntentBoundary {
    model: Box<dyn IntentModel>,
    fallback: KeywordIntentModel,
    screen: EmergencyScreen,
}

impl std::fmt::Debug for IntentBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentBoundary")
            .field("model", &self.model.name())
            .finish_non_exhaustive()
    }
}

impl IntentBoundary {
    /// Build a boundary with the keyword model as the primary classifier.
    pub fn keyword_only(lexicon: &SymptomLexicon) -> Self {
        Self {
            model: Box::new(KeywordIntentModel),
            fallback: KeywordIntentModel,
            screen: EmergencyScreen::from_lexicon(lexicon),
        }
    }

    /// Build a boundary delegating to an external model.
    pub fn with_model(lexicon: &SymptomLexicon, model: Box<dyn IntentModel>) -> Self {
        Self {
            model,
            fallback: KeywordIntentModel,
            screen: EmergencyScreen::from_lexicon(lexicon),
        }
    }

    /// Classify an utterance, with the emergency override applied.
    ///
    /// `affirmed` is the symptom set extracted from this utterance (not the
    /// conversation's accumulated evidence): the override must fire on what
    /// was just said.
    pub fn classify(&self, text: &str, affirmed: &BTreeSet<String>) -> IntentClassification {
        if self.screen.is_emergency(text, affirmed) {
            return IntentClassification {
                intent: Intent::Emergency,
                confidence: 1.0,
            };
        }

        match self.model.classify(text) {
            Ok(classification) => classification,
            Err(IntentError::Model { message }) => {
                tracing::warn!(
                    model = self.model.name(),
                    %message,
                    "delegated intent model failed, using keyword fallback"
                );
                // Infallible by construction.
                self.fallback
                    .classify(text)
                    .unwrap_or(IntentClassification {
                        intent: Intent::SymptomReport,
                        confidence: 0.0,
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::SymptomLexicon;

    /// A delegated model that always returns a fixed label.
    struct FixedModel(Intent);

    impl IntentModel for FixedModel {
        fn classify(&self, _text: &str) -> IntentResult<IntentClassification> {
            Ok(IntentClassification {
                intent: self.0,
                confidence: 0.99,
            })
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// A delegated model that always fails.
    struct BrokenModel;

    impl IntentModel for BrokenModel {
        fn classify(&self, _text: &str) -> IntentResult<IntentClassification> {
            Err(IntentError::Model {
                message: "connection refused".into(),
            })
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn boundary() -> IntentBoundary {
        let lexicon = SymptomLexicon::bundled().unwrap();
        IntentBoundary::keyword_only(&lexicon)
    }

    #[test]
    fn emergency_override_beats_the_model() {
        let lexicon = SymptomLexicon::bundled().unwrap();
        let boundary = IntentBoundary::with_model(&lexicon, Box::new(FixedModel(Intent::Greeting)));
        let c = boundary.classify("I have severe chest pain", &BTreeSet::new());
        assert_eq!(c.intent, Intent::Emergency);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn critical_affirmed_symptom_triggers_override() {
        let boundary = boundary();
        let affirmed: BTreeSet<String> = ["chest_pain".to_string()].into_iter().collect();
        let c = boundary.classify("it started an hour ago", &affirmed);
        assert_eq!(c.intent, Intent::Emergency);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn keyword_rules_first_match_wins() {
        let boundary = boundary();
        let none = BTreeSet::new();
        assert_eq!(boundary.classify("hello", &none).intent, Intent::Greeting);
        assert_eq!(boundary.classify("hi there", &none).intent, Intent::Greeting);
        assert_eq!(boundary.classify("bye", &none).intent, Intent::Farewell);
        assert_eq!(
            boundary.classify("what should I take for this?", &none).intent,
            Intent::Inquiry
        );
        assert_eq!(
            boundary.classify("my head hurts and I feel sick", &none).intent,
            Intent::SymptomReport
        );
    }

    #[test]
    fn long_salutation_is_a_report() {
        let boundary = boundary();
        let c = boundary.classify("hi, I have a terrible cough", &BTreeSet::new());
        assert_eq!(c.intent, Intent::SymptomReport);
    }

    #[test]
    fn broken_model_falls_back_to_keywords() {
        let lexicon = SymptomLexicon::bundled().unwrap();
        let boundary = IntentBoundary::with_model(&lexicon, Box::new(BrokenModel));
        let c = boundary.classify("hello", &BTreeSet::new());
        assert_eq!(c.intent, Intent::Greeting);
    }
}
