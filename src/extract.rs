//! Phrase matcher: symptom extraction with negation scoping.
//!
//! The extractor performs three passes over the input:
//! 1. **Tokenize**: NFC-normalize, lowercase, split on word boundaries;
//!    hyphenated compounds are split into sub-tokens while the compound
//!    itself stays searchable in both hyphenated and fused forms
//! 2. **Match**: greedy longest-match of lexicon patterns at each start
//!    position, against a first-token-bucketed index built once at startup
//! 3. **Negation scoping**: every cue occurrence opens a bounded token
//!    window; a symptom match overlapping any window is negated, and
//!    negation wins over any non-negated match of the same symptom
//!
//! Extraction is a pure function over the lexicon + cue set: no side
//! effects, deterministic output for identical input.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::lexicon::SymptomLexicon;

/// Word-ish tokens: letters/digits with internal apostrophes, hyphen-joined
/// runs kept together for compound handling.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+(?:'[a-z0-9]+)*(?:-[a-z0-9]+(?:'[a-z0-9]+)*)*").unwrap());

// ---------------------------------------------------------------------------
// Result and policy types
// ---------------------------------------------------------------------------

/// The outcome of extracting one utterance.
///
/// Invariant: `affirmed` and `negated` are disjoint. A symptom with any
/// match inside a negation window lands in `negated` only, even if the same
/// symptom also matched outside every window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Symptoms the speaker reports having.
    pub affirmed: BTreeSet<String>,
    /// Symptoms the speaker explicitly denies.
    pub negated: BTreeSet<String>,
    /// The input text, unmodified.
    pub raw_text: String,
}

impl ExtractionResult {
    /// An empty result for unusable input.
    pub fn empty(raw_text: impl Into<String>) -> Self {
        Self {
            affirmed: BTreeSet::new(),
            negated: BTreeSet::new(),
            raw_text: raw_text.into(),
        }
    }

    /// Whether nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.affirmed.is_empty() && self.negated.is_empty()
    }
}

/// Token-distance scope of a negation cue.
///
/// The window around a cue spanning tokens `[c, d)` is
/// `[c - before, d + after)`. The asymmetry is deliberate: denials scope
/// mostly forward ("no fever or chills"), while the backward reach only has
/// to catch a symptom the cue directly trails ("fever? not really").
/// Symptoms further back stay affirmed: in "headache and nausea but no
/// fever" the cue must not reach `nausea`. Both radii are tunable through
/// [`EngineConfig`](crate::engine::EngineConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegationPolicy {
    /// Tokens before the cue that fall inside its scope.
    pub before: usize,
    /// Tokens after the cue that fall inside its scope.
    pub after: usize,
}

impl Default for NegationPolicy {
    fn default() -> Self {
        Self { before: 1, after: 4 }
    }
}

// ---------------------------------------------------------------------------
// Tokenization
// ---------------------------------------------------------------------------

/// Half-open token-index span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A hyphenated compound: sub-tokens live in the stream, the original
/// surface stays searchable as a unit.
#[derive(Debug)]
struct Compound {
    span: Span,
    /// Sub-tokens joined with nothing: "light-headed" → "lightheaded".
    fused: String,
}

#[derive(Debug)]
struct TokenStream {
    tokens: Vec<String>,
    compounds: Vec<Compound>,
}

/// Normalize and tokenize input text.
///
/// NFC first so composed/decomposed forms compare equal, then lowercase.
/// Curly apostrophes are folded to straight ones before the token scan.
fn tokenize(text: &str) -> TokenStream {
    let normalized: String = text.nfc().collect::<String>().to_lowercase().replace('\u{2019}', "'");

    let mut tokens = Vec::new();
    let mut compounds = Vec::new();

    for m in TOKEN_RE.find_iter(&normalized) {
        let word = m.as_str();
        if word.contains('-') {
            let start = tokens.len();
            let parts: Vec<&str> = word.split('-').filter(|p| !p.is_empty()).collect();
            for part in &parts {
                tokens.push((*part).to_string());
            }
            if parts.len() > 1 {
                compounds.push(Compound {
                    span: Span {
                        start,
                        end: tokens.len(),
                    },
                    fused: parts.concat(),
                });
            }
        } else {
            tokens.push(word.to_string());
        }
    }

    TokenStream { tokens, compounds }
}

// ---------------------------------------------------------------------------
// Pattern index
// ---------------------------------------------------------------------------

/// A pre-tokenized surface pattern for one canonical symptom.
#[derive(Debug, Clone)]
struct Phrase {
    tokens: Vec<String>,
    symptom: String,
}

/// Search index over all lexicon patterns, built once at startup.
///
/// Phrases are bucketed by first token, longest-first inside each bucket so
/// the scan prefers the longest contiguous match at a given start position.
/// The fused view maps separator-stripped pattern text to symptoms so
/// hyphenated input matches spaced patterns and vice versa.
#[derive(Debug)]
struct PatternIndex {
    by_first: HashMap<String, Vec<Phrase>>,
    fused: HashMap<String, Vec<String>>,
}

impl PatternIndex {
    fn build(lexicon: &SymptomLexicon) -> Self {
        let mut by_first: HashMap<String, Vec<Phrase>> = HashMap::new();
        let mut fused: HashMap<String, Vec<String>> = HashMap::new();

        for (symptom, patterns) in lexicon.entries() {
            for pattern in patterns {
                let stream = tokenize(pattern);
                if stream.tokens.is_empty() {
                    continue;
                }
                let fused_key = stream.tokens.concat();
                let entry = fused.entry(fused_key).or_default();
                if !entry.iter().any(|s| s == symptom) {
                    entry.push(symptom.to_string());
                }
                by_first
                    .entry(stream.tokens[0].clone())
                    .or_default()
                    .push(Phrase {
                        tokens: stream.tokens,
                        symptom: symptom.to_string(),
                    });
            }
        }
        for bucket in by_first.values_mut() {
            bucket.sort_by(|a, b| {
                b.tokens
                    .len()
                    .cmp(&a.tokens.len())
                    .then_with(|| a.symptom.cmp(&b.symptom))
            });
        }

        Self { by_first, fused }
    }

    /// The longest phrase matching at `pos`, if any.
    fn longest_at(&self, tokens: &[String], pos: usize) -> Option<&Phrase> {
        let bucket = self.by_first.get(&tokens[pos])?;
        bucket
            .iter()
            .find(|phrase| tokens[pos..].starts_with(&phrase.tokens))
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// A symptom match with its token span, prior to negation classification.
#[derive(Debug)]
struct SymptomMatch {
    symptom: String,
    span: Span,
}

/// The phrase matcher. Cheap to share: holds only the pattern index, the
/// pre-tokenized cue set, and the window policy.
#[derive(Debug)]
pub struct SymptomExtractor {
    lexicon: Arc<SymptomLexicon>,
    index: PatternIndex,
    cues: Vec<Vec<String>>,
    policy: NegationPolicy,
}

impl SymptomExtractor {
    /// Build an extractor over a loaded lexicon.
    pub fn new(lexicon: Arc<SymptomLexicon>, policy: NegationPolicy) -> Self {
        let index = PatternIndex::build(&lexicon);
        let mut cues: Vec<Vec<String>> = lexicon
            .negation_cues()
            .iter()
            .map(|cue| tokenize(cue).tokens)
            .filter(|tokens| !tokens.is_empty())
            .collect();
        // Longest-first so "don't have" wins over "don't" at the same position.
        cues.sort_by(|a, b| b.len().cmp(&a.len()));

        Self {
            lexicon,
            index,
            cues,
            policy,
        }
    }

    /// The lexicon this extractor was built over.
    pub fn lexicon(&self) -> &Arc<SymptomLexicon> {
        &self.lexicon
    }

    /// The active negation window policy.
    pub fn policy(&self) -> NegationPolicy {
        self.policy
    }

    /// Extract affirmed and negated symptoms from one utterance.
    ///
    /// Empty or word-free input yields an empty result, not an error.
    pub fn extract(&self, text: &str) -> ExtractionResult {
        let stream = tokenize(text);
        if stream.tokens.is_empty() {
            return ExtractionResult::empty(text);
        }

        let matches = self.find_matches(&stream);
        let windows = self.negation_windows(&stream, &matches);

        let mut affirmed = BTreeSet::new();
        let mut negated = BTreeSet::new();
        for m in &matches {
            if windows.iter().any(|w| w.overlaps(&m.span)) {
                negated.insert(m.symptom.clone());
            } else {
                affirmed.insert(m.symptom.clone());
            }
        }
        // Negation wins on any overlapping match of the same symptom.
        for symptom in &negated {
            affirmed.remove(symptom);
        }

        ExtractionResult {
            affirmed,
            negated,
            raw_text: text.to_string(),
        }
    }

    /// Scan the token stream for symptom matches: greedy longest-match at
    /// each position, then compound aliases against the fused pattern view.
    fn find_matches(&self, stream: &TokenStream) -> Vec<SymptomMatch> {
        let mut matches = Vec::new();

        let mut pos = 0;
        while pos < stream.tokens.len() {
            if let Some(phrase) = self.index.longest_at(&stream.tokens, pos) {
                matches.push(SymptomMatch {
                    symptom: phrase.symptom.clone(),
                    span: Span {
                        start: pos,
                        end: pos + phrase.tokens.len(),
                    },
                });
                pos += phrase.tokens.len();
                continue;
            }
            // Single-token fused fallback: "stomachache" matches the
            // spaced pattern "stomach ache".
            if let Some(symptoms) = self.index.fused.get(&stream.tokens[pos]) {
                for symptom in symptoms {
                    matches.push(SymptomMatch {
                        symptom: symptom.clone(),
                        span: Span {
                            start: pos,
                            end: pos + 1,
                        },
                    });
                }
                pos += 1;
                continue;
            }
            pos += 1;
        }

        // Hyphenated compounds: the original surface, fused, against
        // single-unit patterns ("stomach-ache" → "stomachache").
        for compound in &stream.compounds {
            if let Some(symptoms) = self.index.fused.get(&compound.fused) {
                for symptom in symptoms {
                    if !matches
                        .iter()
                        .any(|m| m.symptom == *symptom && m.span.overlaps(&compound.span))
                    {
                        matches.push(SymptomMatch {
                            symptom: symptom.clone(),
                            span: compound.span,
                        });
                    }
                }
            }
        }

        matches
    }

    /// Open a window per cue occurrence.
    ///
    /// A cue whose tokens sit entirely inside a symptom match span does not
    /// open a window: in "no appetite" the "no" is part of the evidence for
    /// `loss_of_appetite`, not a denial of it.
    fn negation_windows(&self, stream: &TokenStream, matches: &[SymptomMatch]) -> Vec<Span> {
        let mut windows = Vec::new();

        let mut pos = 0;
        while pos < stream.tokens.len() {
            let hit = self
                .cues
                .iter()
                .find(|cue| stream.tokens[pos..].starts_with(cue.as_slice()));
            match hit {
                Some(cue) => {
                    let span = Span {
                        start: pos,
                        end: pos + cue.len(),
                    };
                    let consumed = matches.iter().any(|m| m.span.contains(&span));
                    if !consumed {
                        windows.push(Span {
                            start: span.start.saturating_sub(self.policy.before),
                            end: span.end + self.policy.after,
                        });
                    }
                    pos += cue.len();
                }
                None => pos += 1,
            }
        }

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SymptomExtractor {
        let lexicon = Arc::new(SymptomLexicon::bundled().unwrap());
        SymptomExtractor::new(lexicon, NegationPolicy::default())
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn negation_scoping() {
        let result = extractor().extract("I have a headache and nausea but no fever");
        assert_eq!(result.affirmed, set(&["headache", "nausea"]));
        assert_eq!(result.negated, set(&["fever"]));
    }

    #[test]
    fn extraction_is_deterministic() {
        let ex = extractor();
        let text = "coughing all night, sore throat, but I don't have a fever";
        assert_eq!(ex.extract(text), ex.extract(text));
    }

    #[test]
    fn empty_input_is_empty_result_not_error() {
        let ex = extractor();
        assert!(ex.extract("").is_empty());
        assert!(ex.extract("   \t\n").is_empty());
        assert!(ex.extract("!!! ???").is_empty());
    }

    #[test]
    fn multi_token_patterns_match_contiguously() {
        let result = extractor().extract("there is a sore throat and some muscle pain");
        assert_eq!(result.affirmed, set(&["sore_throat", "body_aches"]));
        // "sore ... throat" with intervening words must not match.
        let result = extractor().extract("my throat hurts and everything is sore");
        assert!(!result.affirmed.contains("sore_throat"));
    }

    #[test]
    fn longest_match_wins_at_a_position() {
        // "nasal congestion" is a congestion variant; the shorter
        // "congestion" must not produce a second, different match.
        let result = extractor().extract("terrible nasal congestion since monday");
        assert_eq!(result.affirmed, set(&["congestion"]));
    }

    #[test]
    fn repeated_mentions_do_not_double_count() {
        let result = extractor().extract("fever, high temperature, feeling feverish");
        assert_eq!(result.affirmed, set(&["fever"]));
    }

    #[test]
    fn hyphenated_compound_matches_both_forms() {
        let ex = extractor();
        // Hyphenated surface → sub-tokens + compound alias.
        assert!(ex.extract("feeling light-headed today").affirmed.contains("dizziness"));
        // Fused single token matches directly.
        assert!(ex.extract("feeling lightheaded today").affirmed.contains("dizziness"));
        // Hyphenated input against a spaced pattern.
        assert!(ex.extract("awful stomach-ache").affirmed.contains("stomach_pain"));
    }

    #[test]
    fn fused_token_matches_spaced_pattern() {
        let result = extractor().extract("woke up with a stomachache");
        assert_eq!(result.affirmed, set(&["stomach_pain"]));
    }

    #[test]
    fn cue_inside_pattern_does_not_negate_it() {
        let result = extractor().extract("I have no appetite at all");
        assert_eq!(result.affirmed, set(&["loss_of_appetite"]));
        assert!(result.negated.is_empty());

        let result = extractor().extract("just not hungry these days");
        assert_eq!(result.affirmed, set(&["loss_of_appetite"]));
    }

    #[test]
    fn negation_wins_over_separate_affirmed_match() {
        // "fever" matches twice; the occurrence inside the "no" window
        // forces the symptom out of the affirmed set entirely.
        let result = extractor().extract("no fever today although the fever was bad yesterday");
        assert!(result.negated.contains("fever"));
        assert!(!result.affirmed.contains("fever"));
    }

    #[test]
    fn multi_token_cue_scopes_forward() {
        let result = extractor().extract("I don't have chills but my head hurts");
        assert!(result.negated.contains("fever"));
        assert!(!result.affirmed.contains("fever"));
    }

    #[test]
    fn negation_window_is_bounded() {
        // The denied symptom sits outside the forward radius of the cue, so
        // the cue must not reach it.
        let result = extractor()
            .extract("nothing serious happened, not even once, but lately I keep sneezing and my eyes are itchy eyes");
        assert!(result.affirmed.contains("sneezing"));
    }

    #[test]
    fn apostrophe_variants_fold_together() {
        let ex = extractor();
        let straight = ex.extract("I don't have a cough");
        let curly = ex.extract("I don\u{2019}t have a cough");
        assert_eq!(straight.affirmed, curly.affirmed);
        assert_eq!(straight.negated, curly.negated);
        assert!(straight.negated.contains("cough"));
    }

    #[test]
    fn affirmed_and_negated_are_disjoint() {
        let ex = extractor();
        for text in [
            "no fever but fever",
            "headache, no headache",
            "cough without cough and more cough",
        ] {
            let result = ex.extract(text);
            assert!(result.affirmed.is_disjoint(&result.negated), "{text}");
        }
    }
}
