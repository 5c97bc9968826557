//! Symptom lexicon pack: canonical symptoms, surface patterns, negation cues,
//! and emergency term sets.
//!
//! A lexicon pack is a TOML-defined bundle loaded exactly once at engine
//! startup and shared read-only (behind `Arc`) across every conversation for
//! the rest of the process lifetime. One pack is bundled into the binary via
//! `include_str!`; an external pack directory can override it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LexiconError, LexiconResult};

/// The bundled English lexicon pack.
const CORE_LEXICON_TOML: &str = include_str!("../data/lexicon.toml");

// ---------------------------------------------------------------------------
// Pack data model
// ---------------------------------------------------------------------------

/// Where a lexicon pack came from.
#[derive(Debug, Clone)]
pub enum PackSource {
    /// Bundled into the binary via `include_str!`.
    Bundled,
    /// Loaded from an external pack directory.
    External(PathBuf),
}

impl std::fmt::Display for PackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bundled => write!(f, "bundled"),
            Self::External(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Pack identification metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct PackMeta {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

/// Raw TOML shape of a lexicon pack.
#[derive(Debug, Deserialize)]
struct RawLexiconPack {
    pack: PackMeta,
    negation: RawNegation,
    emergency: RawEmergency,
    /// `canonical_id = ["surface pattern", ...]`, ordered per symptom.
    symptoms: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawNegation {
    cues: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawEmergency {
    /// Free-text phrases that force the emergency intent when present in an
    /// utterance ("difficulty breathing", "bleeding heavily", ...).
    terms: Vec<String>,
    /// Canonical symptom ids that force the emergency intent when affirmed.
    symptoms: Vec<String>,
}

// ---------------------------------------------------------------------------
// SymptomLexicon
// ---------------------------------------------------------------------------

/// Immutable symptom lexicon: canonical ids mapped to ordered surface-pattern
/// variants, plus the negation cue set and emergency term sets.
///
/// Canonical ids are snake_case (`sore_throat`); [`display_name`] renders the
/// human-readable form. The symptom key ordering (BTreeMap, lexicographic) is
/// the stable vocabulary ordering used wherever a fixed feature order is
/// needed.
///
/// [`display_name`]: SymptomLexicon::display_name
#[derive(Debug)]
pub struct SymptomLexicon {
    meta: PackMeta,
    symptoms: BTreeMap<String, Vec<String>>,
    negation_cues: Vec<String>,
    emergency_terms: Vec<String>,
    critical_symptoms: BTreeSet<String>,
    source: PackSource,
}

impl SymptomLexicon {
    /// Load the lexicon pack bundled into the binary.
    pub fn bundled() -> LexiconResult<Self> {
        Self::from_toml_str(CORE_LEXICON_TOML, PackSource::Bundled)
    }

    /// Load a lexicon pack from an external TOML file.
    pub fn from_path(path: &Path) -> LexiconResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LexiconError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, PackSource::External(path.to_path_buf()))
    }

    /// Parse and validate a lexicon pack from TOML text.
    pub fn from_toml_str(content: &str, source: PackSource) -> LexiconResult<Self> {
        let raw: RawLexiconPack =
            toml::from_str(content).map_err(|e| LexiconError::Parse {
                message: e.to_string(),
            })?;

        if raw.symptoms.is_empty() {
            return Err(LexiconError::Empty);
        }
        for (symptom, patterns) in &raw.symptoms {
            if patterns.iter().all(|p| p.trim().is_empty()) {
                return Err(LexiconError::NoPatterns {
                    symptom: symptom.clone(),
                });
            }
        }
        // A typo in the critical-symptom list would silently disable the
        // emergency screen for that symptom, so unknown ids are fatal.
        for symptom in &raw.emergency.symptoms {
            if !raw.symptoms.contains_key(symptom) {
                return Err(LexiconError::Parse {
                    message: format!(
                        "[emergency] symptoms entry \"{symptom}\" is not a canonical symptom id"
                    ),
                });
            }
        }

        tracing::debug!(
            pack = %raw.pack.name,
            version = %raw.pack.version,
            symptoms = raw.symptoms.len(),
            cues = raw.negation.cues.len(),
            %source,
            "loaded symptom lexicon"
        );

        Ok(Self {
            meta: raw.pack,
            symptoms: raw.symptoms,
            negation_cues: raw.negation.cues,
            emergency_terms: raw.emergency.terms,
            critical_symptoms: raw.emergency.symptoms.into_iter().collect(),
            source,
        })
    }

    /// Pack metadata.
    pub fn meta(&self) -> &PackMeta {
        &self.meta
    }

    /// Where this pack was loaded from.
    pub fn source(&self) -> &PackSource {
        &self.source
    }

    /// Number of canonical symptoms.
    pub fn len(&self) -> usize {
        self.symptoms.len()
    }

    /// Whether the lexicon is empty (never true for a validated pack).
    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }

    /// Whether `id` is a known canonical symptom.
    pub fn contains(&self, id: &str) -> bool {
        self.symptoms.contains_key(id)
    }

    /// Iterate `(canonical id, ordered patterns)` in vocabulary order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.symptoms.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The ordered surface patterns for one canonical symptom.
    pub fn patterns(&self, id: &str) -> Option<&[String]> {
        self.symptoms.get(id).map(|v| v.as_slice())
    }

    /// The stable, lexicon-derived symptom ordering.
    pub fn vocabulary(&self) -> Vec<String> {
        self.symptoms.keys().cloned().collect()
    }

    /// Negation cue phrases, as authored in the pack.
    pub fn negation_cues(&self) -> &[String] {
        &self.negation_cues
    }

    /// Free-text emergency phrases.
    pub fn emergency_terms(&self) -> &[String] {
        &self.emergency_terms
    }

    /// Canonical symptom ids that signal an emergency when affirmed.
    pub fn critical_symptoms(&self) -> &BTreeSet<String> {
        &self.critical_symptoms
    }

    /// Human-readable form of a canonical id (`sore_throat` → "sore throat").
    pub fn display_name(id: &str) -> String {
        id.replace('_', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_pack_loads_and_validates() {
        let lexicon = SymptomLexicon::bundled().unwrap();
        assert!(!lexicon.is_empty());
        assert!(lexicon.contains("fever"));
        assert!(lexicon.contains("headache"));
        assert!(!lexicon.negation_cues().is_empty());
        assert!(!lexicon.emergency_terms().is_empty());
        // Critical symptoms validated against the symptom table at load.
        for symptom in lexicon.critical_symptoms() {
            assert!(lexicon.contains(symptom));
        }
    }

    #[test]
    fn vocabulary_ordering_is_stable() {
        let a = SymptomLexicon::bundled().unwrap().vocabulary();
        let b = SymptomLexicon::bundled().unwrap().vocabulary();
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(a, sorted);
    }

    #[test]
    fn empty_pack_is_rejected() {
        let toml = r#"
            [pack]
            name = "empty"
            version = "0.0.0"

            [negation]
            cues = ["no"]

            [emergency]
            terms = []
            symptoms = []

            [symptoms]
        "#;
        let err = SymptomLexicon::from_toml_str(toml, PackSource::Bundled).unwrap_err();
        assert!(matches!(err, LexiconError::Empty));
    }

    #[test]
    fn unknown_critical_symptom_is_rejected() {
        let toml = r#"
            [pack]
            name = "bad"
            version = "0.0.0"

            [negation]
            cues = ["no"]

            [emergency]
            terms = []
            symptoms = ["cardiac_arrest"]

            [symptoms]
            chest_tightness = ["chest tightness"]
        "#;
        let err = SymptomLexicon::from_toml_str(toml, PackSource::Bundled).unwrap_err();
        assert!(matches!(err, LexiconError::Parse { .. }));
    }

    #[test]
    fn display_name_replaces_underscores() {
        assert_eq!(SymptomLexicon::display_name("sore_throat"), "sore throat");
        assert_eq!(SymptomLexicon::display_name("fever"), "fever");
    }
}
