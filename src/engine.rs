//! Engine facade: top-level API for the sekhmet triage pipeline.
//!
//! The `Engine` loads the static packs once at startup (fatal on failure),
//! owns the stateless pipeline stages, and serializes turns per conversation
//! while serving any number of conversations concurrently.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::conversation::ConversationState;
use crate::error::{EngineError, EngineResult};
use crate::explain::{AttributionProvider, Explanation, LinearAttribution, explain};
use crate::extract::{ExtractionResult, NegationPolicy, SymptomExtractor};
use crate::intent::IntentBoundary;
use crate::lexicon::SymptomLexicon;
use crate::orchestrator::{Orchestrator, ResponseCatalog, TurnResponse};
use crate::rank::{
    LinearModel, OverlapStrategy, ProbabilityModel, ProbabilityStrategy, RankedPrediction, Ranker,
    ScoreStrategy, StrategyKind,
};
use crate::signature::SignatureTable;

/// Configuration for the triage engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum distinct affirmed symptoms before ranking unlocks.
    pub threshold: usize,
    /// How many ranked conditions the engine returns.
    pub top_k: usize,
    /// Which scoring strategy drives the ranking.
    pub strategy: StrategyKind,
    /// Negation window radii for the phrase matcher.
    pub negation: NegationPolicy,
    /// External pack directory. `None` uses the bundled packs.
    pub packs_dir: Option<PathBuf>,
    /// Response templates for the conversation orchestrator.
    pub catalog: ResponseCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            top_k: 5,
            strategy: StrategyKind::default(),
            negation: NegationPolicy::default(),
            packs_dir: None,
            catalog: ResponseCatalog::default(),
        }
    }
}

/// The sekhmet triage engine.
///
/// Owns all pipeline stages: lexicon, extractor, intent boundary, ranker,
/// attribution provider, and the conversation table. Lexicon, signatures,
/// and model are read-only after startup and shared without copying.
pub struct Engine {
    config: EngineConfig,
    lexicon: Arc<SymptomLexicon>,
    signatures: Arc<SignatureTable>,
    model: Arc<LinearModel>,
    extractor: Arc<SymptomExtractor>,
    ranker: Ranker,
    attribution: LinearAttribution,
    orchestrator: Orchestrator,
    conversations: DashMap<String, Arc<Mutex<ConversationState>>>,
}

impl Engine {
    /// Create a new engine with the given configuration.
    ///
    /// Pack loading failures are fatal: the engine cannot serve without its
    /// lexicon, signatures, and model.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        if config.threshold == 0 {
            return Err(EngineError::InvalidConfig {
                message: "evidence threshold must be at least 1".into(),
            }
            .into());
        }
        if config.top_k == 0 {
            return Err(EngineError::InvalidConfig {
                message: "top_k must be at least 1".into(),
            }
            .into());
        }

        let (lexicon, signatures, model) = match &config.packs_dir {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(EngineError::PackDir {
                        path: dir.display().to_string(),
                    }
                    .into());
                }
                let lexicon = SymptomLexicon::from_path(&dir.join("lexicon.toml"))?;
                let signatures = SignatureTable::from_path(&dir.join("signatures.toml"), &lexicon)?;
                let model = LinearModel::from_path(&dir.join("model.json"))?;
                (lexicon, signatures, model)
            }
            None => {
                let lexicon = SymptomLexicon::bundled()?;
                let signatures = SignatureTable::bundled(&lexicon)?;
                let model = LinearModel::bundled()?;
                (lexicon, signatures, model)
            }
        };

        let lexicon = Arc::new(lexicon);
        let signatures = Arc::new(signatures);
        let model = Arc::new(model);

        tracing::info!(
            lexicon = %lexicon.meta().name,
            symptoms = lexicon.len(),
            diseases = signatures.len(),
            strategy = %config.strategy,
            threshold = config.threshold,
            "initializing sekhmet engine"
        );

        let extractor = Arc::new(SymptomExtractor::new(lexicon.clone(), config.negation));
        let strategy: Arc<dyn ScoreStrategy> = match config.strategy {
            StrategyKind::Overlap => Arc::new(OverlapStrategy::new(signatures.clone())),
            StrategyKind::Model => {
                let capability: Arc<dyn ProbabilityModel> = model.clone();
                Arc::new(ProbabilityStrategy::new(capability))
            }
        };
        let ranker = Ranker::new(strategy.clone(), config.top_k);
        let orchestrator = Orchestrator::new(
            extractor.clone(),
            IntentBoundary::keyword_only(&lexicon),
            Ranker::new(strategy, config.top_k),
            config.catalog.clone(),
            config.threshold,
        );

        Ok(Self {
            attribution: LinearAttribution::new(model.clone()),
            config,
            lexicon,
            signatures,
            model,
            extractor,
            ranker,
            orchestrator,
            conversations: DashMap::new(),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The loaded lexicon.
    pub fn lexicon(&self) -> &Arc<SymptomLexicon> {
        &self.lexicon
    }

    /// The loaded signature table.
    pub fn signatures(&self) -> &Arc<SignatureTable> {
        &self.signatures
    }

    /// Extract affirmed and negated symptoms from one utterance.
    pub fn extract(&self, text: &str) -> ExtractionResult {
        self.extractor.extract(text)
    }

    /// Process one conversation turn.
    ///
    /// Turns of the same conversation are serialized on a per-conversation
    /// lock; turns of distinct conversations run concurrently. A new
    /// conversation id starts at the greeting phase.
    pub fn process_turn(&self, conversation_id: &str, text: &str) -> TurnResponse {
        let state = self
            .conversations
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        self.orchestrator.process(&mut state, text)
    }

    /// Rank all known conditions against an evidence set.
    pub fn rank(&self, evidence: &BTreeSet<String>) -> EngineResult<RankedPrediction> {
        Ok(self.ranker.rank(evidence)?)
    }

    /// Rank and explain: attribution plus rendered rationale.
    ///
    /// Degrades to a ranking-only explanation when attribution is
    /// unavailable for the evidence.
    pub fn explain(&self, evidence: &BTreeSet<String>) -> EngineResult<Explanation> {
        let ranking = self.ranker.rank(evidence)?;
        let attribution = self.attribution.attribute(evidence);
        if attribution.is_none() {
            tracing::debug!(
                provider = self.attribution.name(),
                "attribution unavailable, degrading to ranking-only explanation"
            );
        }
        Ok(explain(attribution.as_ref(), &ranking)?)
    }

    /// Force a conversation back to the greeting phase.
    ///
    /// Returns `false` if the conversation id was never seen.
    pub fn reset(&self, conversation_id: &str) -> bool {
        match self.conversations.get(conversation_id) {
            Some(entry) => {
                entry.lock().unwrap_or_else(PoisonError::into_inner).reset();
                true
            }
            None => false,
        }
    }

    /// Number of conversations the engine has seen since startup.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Human-readable engine summary.
    pub fn info(&self) -> String {
        format!(
            "sekhmet engine\n  lexicon: {} v{} ({} symptoms, {})\n  signatures: {} v{} ({} conditions)\n  model: {} v{}\n  strategy: {} (top-{})\n  threshold: {} symptoms\n  conversations: {}",
            self.lexicon.meta().name,
            self.lexicon.meta().version,
            self.lexicon.len(),
            self.lexicon.source(),
            self.signatures.meta().name,
            self.signatures.meta().version,
            self.signatures.len(),
            self.model.artifact_name(),
            self.model.version(),
            self.ranker.strategy_name(),
            self.config.top_k,
            self.config.threshold,
            self.conversations.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Phase;

    #[test]
    fn zero_threshold_is_rejected() {
        let config = EngineConfig {
            threshold: 0,
            ..Default::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn missing_pack_dir_is_fatal() {
        let config = EngineConfig {
            packs_dir: Some(PathBuf::from("/nonexistent/packs")),
            ..Default::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn conversations_are_isolated() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.process_turn("a", "hello");
        engine.process_turn("a", "I have a fever and a cough");
        let b = engine.process_turn("b", "hello");
        assert_eq!(b.phase, Phase::Collecting);
        assert!(b.symptoms.is_empty());

        let a = engine.process_turn("a", "also a headache");
        assert_eq!(a.symptoms.len(), 3);
        assert_eq!(engine.conversation_count(), 2);
    }

    #[test]
    fn reset_only_touches_known_conversations() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        assert!(!engine.reset("ghost"));
        engine.process_turn("a", "hello");
        assert!(engine.reset("a"));
    }
}
