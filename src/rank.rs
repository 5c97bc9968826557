//! Diagnosis ranking engine: strategy-polymorphic scoring over accumulated
//! evidence.
//!
//! Two interchangeable strategies implement [`ScoreStrategy`]:
//!
//! - [`OverlapStrategy`]: signature-overlap heuristic,
//!   `|evidence ∩ signature| / |signature|`. Pure, deterministic,
//!   explainable by construction, no training dependency.
//! - [`ProbabilityStrategy`]: projects evidence onto the delegated model's
//!   stable binary feature vector and reads class probabilities straight
//!   from [`ProbabilityModel::predict_proba`].
//!
//! The engine is stateless across calls: identical evidence yields identical
//! output, ties always break lexicographically, and the empty evidence set
//! produces the defined neutral ordering rather than an error.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RankError, RankResult};
use crate::signature::SignatureTable;

/// The bundled linear model artifact.
const CORE_MODEL_JSON: &str = include_str!("../data/model.json");

// ---------------------------------------------------------------------------
// Ranked output
// ---------------------------------------------------------------------------

/// One ranked disease with its score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub disease: String,
    pub score: f64,
}

/// A top-K ranking, strictly descending by score; exact-score ties are
/// ordered lexicographically by disease name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    pub entries: Vec<RankEntry>,
}

impl RankedPrediction {
    /// Sort raw scores into a ranking and keep the top `k`.
    fn from_scores(mut scores: Vec<(String, f64)>, k: usize) -> Self {
        scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scores.truncate(k);
        Self {
            entries: scores
                .into_iter()
                .map(|(disease, score)| RankEntry { disease, score })
                .collect(),
        }
    }

    /// The top-ranked entry, if any.
    pub fn top(&self) -> Option<&RankEntry> {
        self.entries.first()
    }

    /// The runner-up, if any.
    pub fn runner_up(&self) -> Option<&RankEntry> {
        self.entries.get(1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Strategy boundary
// ---------------------------------------------------------------------------

/// Which scoring strategy the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Signature-overlap heuristic.
    Overlap,
    /// Delegated probabilistic model.
    Model,
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::Overlap
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overlap => write!(f, "overlap"),
            Self::Model => write!(f, "model"),
        }
    }
}

impl StrategyKind {
    /// Parse from a string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "overlap" | "heuristic" | "signature" => Some(Self::Overlap),
            "model" | "probabilistic" | "proba" => Some(Self::Model),
            _ => None,
        }
    }
}

/// A scoring strategy: one score per known disease for a given evidence set.
///
/// Implementations must be stateless with respect to conversations and safe
/// to call concurrently.
pub trait ScoreStrategy: Send + Sync {
    /// All known diseases, for the neutral ordering.
    fn diseases(&self) -> Vec<String>;

    /// Score every disease against the evidence, each in `[0, 1]`.
    fn score_all(&self, evidence: &BTreeSet<String>) -> RankResult<Vec<(String, f64)>>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Overlap heuristic
// ---------------------------------------------------------------------------

/// Signature-overlap scoring: the fraction of a disease's expected symptoms
/// present in the evidence.
#[derive(Debug)]
pub struct OverlapStrategy {
    signatures: Arc<SignatureTable>,
}

impl OverlapStrategy {
    pub fn new(signatures: Arc<SignatureTable>) -> Self {
        Self { signatures }
    }
}

impl ScoreStrategy for OverlapStrategy {
    fn diseases(&self) -> Vec<String> {
        self.signatures.diseases().map(|d| d.to_string()).collect()
    }

    fn score_all(&self, evidence: &BTreeSet<String>) -> RankResult<Vec<(String, f64)>> {
        Ok(self
            .signatures
            .entries()
            .map(|(disease, signature)| {
                let hits = signature
                    .iter()
                    .filter(|s| evidence.contains(s.as_str()))
                    .count();
                (disease.to_string(), hits as f64 / signature.len() as f64)
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "overlap"
    }
}

// ---------------------------------------------------------------------------
// Delegated probability capability
// ---------------------------------------------------------------------------

/// The opaque probability-producing capability.
///
/// The feature vector ordering is owned by the model: callers project
/// evidence onto [`ProbabilityModel::vocabulary`] in order. A remote
/// implementation must bound its own latency and surface expiry as
/// [`RankError::Timeout`].
pub trait ProbabilityModel: Send + Sync {
    /// Class labels, in the model's output order.
    fn classes(&self) -> &[String];

    /// The stable feature ordering the model was trained with.
    fn vocabulary(&self) -> &[String];

    /// Per-class probabilities for one binary symptom vector.
    fn predict_proba(&self, features: &[f64]) -> RankResult<Vec<f64>>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Project an evidence set onto a binary vector in vocabulary order.
///
/// Symptoms outside the vocabulary are silently ignored: the vocabulary is
/// closed.
pub fn project(vocabulary: &[String], evidence: &BTreeSet<String>) -> Vec<f64> {
    vocabulary
        .iter()
        .map(|s| if evidence.contains(s) { 1.0 } else { 0.0 })
        .collect()
}

/// Raw JSON shape of the linear model artifact.
#[derive(Debug, Deserialize)]
struct RawLinearModel {
    name: String,
    version: String,
    classes: Vec<String>,
    vocabulary: Vec<String>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

/// A multinomial linear model (softmax over `W·x + b`), loaded from the JSON
/// artifact the training pipeline exports.
///
/// This is the in-process realization of [`ProbabilityModel`]; its weights
/// also drive the closed-form attribution in
/// [`explain`](crate::explain).
#[derive(Debug)]
pub struct LinearModel {
    name: String,
    version: String,
    classes: Vec<String>,
    vocabulary: Vec<String>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    class_index: HashMap<String, usize>,
}

impl LinearModel {
    /// Load the model artifact bundled into the binary.
    pub fn bundled() -> RankResult<Self> {
        Self::from_json_str(CORE_MODEL_JSON)
    }

    /// Load a model artifact from an external JSON file.
    pub fn from_path(path: &Path) -> RankResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RankError::ModelIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and shape-check a model artifact.
    pub fn from_json_str(content: &str) -> RankResult<Self> {
        let raw: RawLinearModel =
            serde_json::from_str(content).map_err(|e| RankError::ModelParse {
                message: e.to_string(),
            })?;

        if raw.classes.is_empty() {
            return Err(RankError::ModelShape {
                message: "model has no classes".into(),
            });
        }
        if raw.weights.len() != raw.classes.len() || raw.bias.len() != raw.classes.len() {
            return Err(RankError::ModelShape {
                message: format!(
                    "{} classes but {} weight rows and {} bias entries",
                    raw.classes.len(),
                    raw.weights.len(),
                    raw.bias.len()
                ),
            });
        }
        for (i, row) in raw.weights.iter().enumerate() {
            if row.len() != raw.vocabulary.len() {
                return Err(RankError::ModelShape {
                    message: format!(
                        "weight row for \"{}\" has {} entries, vocabulary has {}",
                        raw.classes[i],
                        row.len(),
                        raw.vocabulary.len()
                    ),
                });
            }
        }

        let class_index = raw
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        tracing::debug!(
            model = %raw.name,
            version = %raw.version,
            classes = raw.classes.len(),
            features = raw.vocabulary.len(),
            "loaded linear model artifact"
        );

        Ok(Self {
            name: raw.name,
            version: raw.version,
            classes: raw.classes,
            vocabulary: raw.vocabulary,
            weights: raw.weights,
            bias: raw.bias,
            class_index,
        })
    }

    /// Artifact name.
    pub fn artifact_name(&self) -> &str {
        &self.name
    }

    /// Artifact version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The weight of `feature` toward `class`, if both are known.
    pub fn weight(&self, class: &str, feature_idx: usize) -> Option<f64> {
        let row = self.weights.get(*self.class_index.get(class)?)?;
        row.get(feature_idx).copied()
    }
}

impl ProbabilityModel for LinearModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    fn predict_proba(&self, features: &[f64]) -> RankResult<Vec<f64>> {
        if features.len() != self.vocabulary.len() {
            return Err(RankError::Unavailable {
                reason: format!(
                    "feature vector has {} entries, model expects {}",
                    features.len(),
                    self.vocabulary.len()
                ),
            });
        }

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();

        // Numerically stable softmax.
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / total).collect())
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Delegated probabilistic scoring over a [`ProbabilityModel`].
pub struct ProbabilityStrategy {
    model: Arc<dyn ProbabilityModel>,
}

impl std::fmt::Debug for ProbabilityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbabilityStrategy")
            .field("model", &self.model.name())
            .finish()
    }
}

impl ProbabilityStrategy {
    pub fn new(model: Arc<dyn ProbabilityModel>) -> Self {
        Self { model }
    }
}

impl ScoreStrategy for ProbabilityStrategy {
    fn diseases(&self) -> Vec<String> {
        self.model.classes().to_vec()
    }

    fn score_all(&self, evidence: &BTreeSet<String>) -> RankResult<Vec<(String, f64)>> {
        let features = project(self.model.vocabulary(), evidence);
        let probabilities = self.model.predict_proba(&features)?;
        Ok(self
            .model
            .classes()
            .iter()
            .cloned()
            .zip(probabilities)
            .collect())
    }

    fn name(&self) -> &'static str {
        "model"
    }
}

// ---------------------------------------------------------------------------
// Ranker
// ---------------------------------------------------------------------------

/// Top-K ranking over a scoring strategy.
pub struct Ranker {
    strategy: Arc<dyn ScoreStrategy>,
    top_k: usize,
}

impl std::fmt::Debug for Ranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ranker")
            .field("strategy", &self.strategy.name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl Ranker {
    pub fn new(strategy: Arc<dyn ScoreStrategy>, top_k: usize) -> Self {
        Self { strategy, top_k }
    }

    /// The strategy's short name.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Rank all known diseases against the evidence.
    ///
    /// Empty evidence yields the neutral result: every disease at 0.0 in
    /// lexicographic order. Unknown evidence symptoms are ignored by the
    /// strategies (closed vocabulary).
    pub fn rank(&self, evidence: &BTreeSet<String>) -> RankResult<RankedPrediction> {
        if evidence.is_empty() {
            let mut diseases = self.strategy.diseases();
            diseases.sort();
            let scores = diseases.into_iter().map(|d| (d, 0.0)).collect();
            return Ok(RankedPrediction::from_scores(scores, self.top_k));
        }

        let scores = self.strategy.score_all(evidence)?;
        Ok(RankedPrediction::from_scores(scores, self.top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::SymptomLexicon;

    fn evidence(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn overlap_ranker(k: usize) -> Ranker {
        let lexicon = SymptomLexicon::bundled().unwrap();
        let signatures = Arc::new(SignatureTable::bundled(&lexicon).unwrap());
        Ranker::new(Arc::new(OverlapStrategy::new(signatures)), k)
    }

    fn model_ranker(k: usize) -> Ranker {
        let model: Arc<dyn ProbabilityModel> = Arc::new(LinearModel::bundled().unwrap());
        Ranker::new(Arc::new(ProbabilityStrategy::new(model)), k)
    }

    #[test]
    fn overlap_score_is_signature_fraction() {
        let lexicon = SymptomLexicon::bundled().unwrap();
        let signatures = Arc::new(SignatureTable::bundled(&lexicon).unwrap());
        let strategy = OverlapStrategy::new(signatures);

        let scores = strategy
            .score_all(&evidence(&["fever", "cough", "headache"]))
            .unwrap();
        let influenza = scores.iter().find(|(d, _)| d == "Influenza").unwrap();
        // 3 of Influenza's 5 signature symptoms present.
        assert!((influenza.1 - 0.6).abs() < 1e-9);
    }

    #[test]
    fn ranking_is_descending_with_lexicographic_ties() {
        let prediction = overlap_ranker(10)
            .rank(&evidence(&["fever", "cough", "headache"]))
            .unwrap();
        for pair in prediction.entries.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].disease < pair[1].disease)
            );
        }
    }

    #[test]
    fn empty_evidence_is_neutral_not_an_error() {
        let prediction = overlap_ranker(10).rank(&BTreeSet::new()).unwrap();
        assert!(!prediction.is_empty());
        assert!(prediction.entries.iter().all(|e| e.score == 0.0));
        let names: Vec<&str> = prediction.entries.iter().map(|e| e.disease.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn unknown_symptoms_are_ignored() {
        let ranker = overlap_ranker(10);
        let with_unknown = ranker
            .rank(&evidence(&["fever", "cough", "dragon_scales"]))
            .unwrap();
        let without = ranker.rank(&evidence(&["fever", "cough"])).unwrap();
        assert_eq!(with_unknown, without);
    }

    #[test]
    fn ranking_is_deterministic_and_stateless() {
        let ranker = model_ranker(5);
        let e = evidence(&["nausea", "vomiting", "diarrhea"]);
        assert_eq!(ranker.rank(&e).unwrap(), ranker.rank(&e).unwrap());
    }

    #[test]
    fn model_probabilities_sum_to_one() {
        let model = LinearModel::bundled().unwrap();
        let features = project(model.vocabulary(), &evidence(&["fever", "cough"]));
        let probabilities = model.predict_proba(&features).unwrap();
        let total: f64 = probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn model_strategy_ranks_gastro_for_gastro_evidence() {
        let prediction = model_ranker(3)
            .rank(&evidence(&["nausea", "vomiting", "diarrhea", "stomach_pain"]))
            .unwrap();
        assert_eq!(prediction.top().unwrap().disease, "Gastroenteritis");
    }

    #[test]
    fn top_k_truncates() {
        let prediction = overlap_ranker(3)
            .rank(&evidence(&["fever", "cough", "headache"]))
            .unwrap();
        assert_eq!(prediction.len(), 3);
    }

    #[test]
    fn malformed_artifact_is_rejected() {
        let err = LinearModel::from_json_str("{\"classes\": []}").unwrap_err();
        assert!(matches!(err, RankError::ModelParse { .. }));

        let json = r#"{
            "name": "bad", "version": "0",
            "classes": ["A", "B"],
            "vocabulary": ["x", "y"],
            "weights": [[1.0, 2.0]],
            "bias": [0.0, 0.0]
        }"#;
        let err = LinearModel::from_json_str(json).unwrap_err();
        assert!(matches!(err, RankError::ModelShape { .. }));
    }

    #[test]
    fn mismatched_feature_vector_is_unavailable() {
        let model = LinearModel::bundled().unwrap();
        let err = model.predict_proba(&[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, RankError::Unavailable { .. }));
    }
}
