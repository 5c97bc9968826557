//! Explanation generator: attribution-to-prose rendering for a ranking.
//!
//! Attribution values come from a delegated [`AttributionProvider`]; the
//! generator itself is pure formatting over numeric input and never
//! recomputes the model. When attribution is unavailable it degrades to a
//! ranking-only rendering instead of failing.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, ExplainResult};
use crate::lexicon::SymptomLexicon;
use crate::rank::{LinearModel, ProbabilityModel, RankedPrediction, project};

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

/// Per-class signed symptom contributions.
///
/// Invariant: only symptoms present in the input evidence appear; an absent
/// symptom's contribution is defined as zero and excluded from rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    per_class: HashMap<String, Vec<(String, f64)>>,
}

impl Attribution {
    /// Build from per-class contribution lists.
    pub fn new(per_class: HashMap<String, Vec<(String, f64)>>) -> Self {
        Self { per_class }
    }

    /// The contributions toward one disease, if attributed.
    pub fn for_class(&self, disease: &str) -> Option<&[(String, f64)]> {
        self.per_class.get(disease).map(|v| v.as_slice())
    }
}

/// The delegated attribution capability.
///
/// Returns `None` when attribution cannot be computed; the generator then
/// degrades gracefully.
pub trait AttributionProvider: Send + Sync {
    fn attribute(&self, evidence: &BTreeSet<String>) -> Option<Attribution>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Closed-form attribution for the linear model artifact: the contribution
/// of a present symptom toward a class is exactly its weight.
pub struct LinearAttribution {
    model: Arc<LinearModel>,
}

impl std::fmt::Debug for LinearAttribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearAttribution").finish_non_exhaustive()
    }
}

impl LinearAttribution {
    pub fn new(model: Arc<LinearModel>) -> Self {
        Self { model }
    }
}

impl AttributionProvider for LinearAttribution {
    fn attribute(&self, evidence: &BTreeSet<String>) -> Option<Attribution> {
        if evidence.is_empty() {
            return None;
        }
        let vocabulary = self.model.vocabulary();
        let features = project(vocabulary, evidence);

        let mut per_class = HashMap::new();
        for class in self.model.classes() {
            let mut contributions = Vec::new();
            for (idx, symptom) in vocabulary.iter().enumerate() {
                if features[idx] == 0.0 {
                    continue;
                }
                let weight = self.model.weight(class, idx)?;
                contributions.push((symptom.clone(), weight * features[idx]));
            }
            per_class.insert(class.clone(), contributions);
        }
        Some(Attribution::new(per_class))
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// A rendered explanation for one ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Confidence statement plus the top contributing symptoms.
    pub text_explanation: String,
    /// Why the winner beat the runner-up; absent when the ranking has a
    /// single entry or attribution is unavailable.
    pub contrastive_explanation: Option<String>,
}

/// How many contributing symptoms the main explanation lists.
const TOP_CONTRIBUTORS: usize = 5;
/// How many symptoms each side of the contrastive explanation lists.
const CONTRAST_FEATURES: usize = 3;

/// Render an explanation for a ranking.
///
/// With attribution: confidence statement, top contributors sorted by
/// descending absolute contribution annotated "increases"/"decreases", and
/// a pairwise contrast between the top two candidates. Without attribution:
/// a ranking-only rendering. Never fails on missing attribution.
pub fn explain(
    attribution: Option<&Attribution>,
    ranking: &RankedPrediction,
) -> ExplainResult<Explanation> {
    let top = ranking.top().ok_or(ExplainError::EmptyRanking)?;

    let contributions =
        attribution.and_then(|a| a.for_class(&top.disease)).filter(|c| !c.is_empty());

    let Some(contributions) = contributions else {
        return Ok(Explanation {
            text_explanation: render_ranking_only(ranking),
            contrastive_explanation: None,
        });
    };

    let mut text = format!(
        "The ranking favors {} with {:.1}% confidence.\n",
        top.disease,
        top.score * 100.0
    );
    text.push_str("Key contributing symptoms:\n");

    let mut sorted: Vec<&(String, f64)> = contributions.iter().collect();
    sorted.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(&b.0)));
    for (symptom, contribution) in sorted.into_iter().take(TOP_CONTRIBUTORS) {
        let direction = if *contribution >= 0.0 { "increases" } else { "decreases" };
        let _ = writeln!(
            text,
            "- {} {} the likelihood (weight {:.2})",
            SymptomLexicon::display_name(symptom),
            direction,
            contribution.abs()
        );
    }

    let contrastive = ranking
        .runner_up()
        .and_then(|runner| attribution.and_then(|a| render_contrast(a, &top.disease, &runner.disease)));

    Ok(Explanation {
        text_explanation: text,
        contrastive_explanation: contrastive,
    })
}

/// The degraded rendering: ranking without attribution text.
fn render_ranking_only(ranking: &RankedPrediction) -> String {
    let mut text = String::from("Attribution data is unavailable; ranked candidates:\n");
    for entry in &ranking.entries {
        let _ = writeln!(text, "- {} ({:.1}%)", entry.disease, entry.score * 100.0);
    }
    text
}

/// Per-symptom contribution delta between the top two candidates.
fn render_contrast(attribution: &Attribution, top: &str, runner: &str) -> Option<String> {
    let top_contributions = attribution.for_class(top)?;
    let runner_contributions: HashMap<&str, f64> = attribution
        .for_class(runner)?
        .iter()
        .map(|(s, c)| (s.as_str(), *c))
        .collect();

    let mut deltas: Vec<(&str, f64)> = top_contributions
        .iter()
        .map(|(symptom, c)| {
            let other = runner_contributions.get(symptom.as_str()).copied().unwrap_or(0.0);
            (symptom.as_str(), c - other)
        })
        .collect();
    deltas.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let favoring_top: Vec<String> = deltas
        .iter()
        .filter(|(_, d)| *d > 0.0)
        .take(CONTRAST_FEATURES)
        .map(|(s, _)| SymptomLexicon::display_name(s))
        .collect();
    let favoring_runner: Vec<String> = deltas
        .iter()
        .rev()
        .filter(|(_, d)| *d < 0.0)
        .take(CONTRAST_FEATURES)
        .map(|(s, _)| SymptomLexicon::display_name(s))
        .collect();

    if favoring_top.is_empty() && favoring_runner.is_empty() {
        return None;
    }

    let mut text = format!("The ranking favored {top} over {runner} because:\n");
    if !favoring_top.is_empty() {
        let _ = writeln!(text, "- higher weight given to: {}", favoring_top.join(", "));
    }
    if !favoring_runner.is_empty() {
        let _ = writeln!(text, "- lower weight given to: {}", favoring_runner.join(", "));
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::{ProbabilityModel, ProbabilityStrategy, Ranker};

    fn evidence(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn model_ranking(e: &BTreeSet<String>, k: usize) -> RankedPrediction {
        let model: Arc<dyn ProbabilityModel> = Arc::new(LinearModel::bundled().unwrap());
        Ranker::new(Arc::new(ProbabilityStrategy::new(model)), k)
            .rank(e)
            .unwrap()
    }

    #[test]
    fn missing_attribution_degrades_to_ranking_only() {
        let e = evidence(&["fever", "cough"]);
        let ranking = model_ranking(&e, 3);
        let explanation = explain(None, &ranking).unwrap();
        assert!(explanation.text_explanation.contains("unavailable"));
        assert!(explanation.contrastive_explanation.is_none());
        // Every ranked candidate still appears.
        for entry in &ranking.entries {
            assert!(explanation.text_explanation.contains(&entry.disease));
        }
    }

    #[test]
    fn attribution_lists_top_contributors_with_direction() {
        let model = Arc::new(LinearModel::bundled().unwrap());
        let provider = LinearAttribution::new(model);
        let e = evidence(&["fever", "cough", "nausea"]);
        let ranking = model_ranking(&e, 5);
        assert_eq!(ranking.top().unwrap().disease, "Influenza");

        let attribution = provider.attribute(&e).unwrap();
        let explanation = explain(Some(&attribution), &ranking).unwrap();
        assert!(explanation.text_explanation.contains("Influenza"));
        assert!(explanation.text_explanation.contains("increases"));
        // nausea carries a negative weight toward Influenza.
        assert!(explanation.text_explanation.contains("decreases"));
    }

    #[test]
    fn absent_symptoms_are_excluded_from_attribution() {
        let model = Arc::new(LinearModel::bundled().unwrap());
        let provider = LinearAttribution::new(model);
        let e = evidence(&["fever"]);
        let attribution = provider.attribute(&e).unwrap();
        let contributions = attribution.for_class("Influenza").unwrap();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].0, "fever");
    }

    #[test]
    fn contrastive_explains_top_two() {
        let model = Arc::new(LinearModel::bundled().unwrap());
        let provider = LinearAttribution::new(model);
        let e = evidence(&["headache", "nausea", "fever", "dizziness"]);
        let ranking = model_ranking(&e, 5);
        let attribution = provider.attribute(&e).unwrap();
        let explanation = explain(Some(&attribution), &ranking).unwrap();

        let contrast = explanation.contrastive_explanation.unwrap();
        let top = &ranking.top().unwrap().disease;
        let runner = &ranking.runner_up().unwrap().disease;
        assert!(contrast.contains(top.as_str()));
        assert!(contrast.contains(runner.as_str()));
    }

    #[test]
    fn empty_ranking_is_an_error() {
        let ranking = RankedPrediction { entries: vec![] };
        assert!(matches!(
            explain(None, &ranking),
            Err(ExplainError::EmptyRanking)
        ));
    }

    #[test]
    fn empty_evidence_yields_no_attribution() {
        let model = Arc::new(LinearModel::bundled().unwrap());
        let provider = LinearAttribution::new(model);
        assert!(provider.attribute(&BTreeSet::new()).is_none());
    }
}
