//! Disease signature pack: the expected symptom presentation per condition.
//!
//! Like the lexicon, signatures are a TOML pack loaded once at startup and
//! shared read-only thereafter. Every symptom a signature references must be
//! a canonical id from the lexicon; dangling references are fatal at load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{SignatureError, SignatureResult};
use crate::lexicon::{PackMeta, PackSource, SymptomLexicon};

/// The bundled signature pack for common conditions.
const CORE_SIGNATURES_TOML: &str = include_str!("../data/signatures.toml");

/// Raw TOML shape of a signature pack.
#[derive(Debug, Deserialize)]
struct RawSignaturePack {
    pack: PackMeta,
    /// `"Disease Name" = ["symptom_id", ...]`, ordered per disease.
    signatures: BTreeMap<String, Vec<String>>,
}

/// Immutable disease → expected-symptom table.
///
/// Disease names keep their human-readable form ("Common Cold"); the BTreeMap
/// keeps iteration lexicographic, which is also the ranking tie-break order.
#[derive(Debug)]
pub struct SignatureTable {
    meta: PackMeta,
    signatures: BTreeMap<String, Vec<String>>,
    source: PackSource,
}

impl SignatureTable {
    /// Load the signature pack bundled into the binary.
    pub fn bundled(lexicon: &SymptomLexicon) -> SignatureResult<Self> {
        Self::from_toml_str(CORE_SIGNATURES_TOML, PackSource::Bundled, lexicon)
    }

    /// Load a signature pack from an external TOML file.
    pub fn from_path(path: &Path, lexicon: &SymptomLexicon) -> SignatureResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SignatureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, PackSource::External(path.to_path_buf()), lexicon)
    }

    /// Parse and validate a signature pack against the lexicon.
    pub fn from_toml_str(
        content: &str,
        source: PackSource,
        lexicon: &SymptomLexicon,
    ) -> SignatureResult<Self> {
        let raw: RawSignaturePack =
            toml::from_str(content).map_err(|e| SignatureError::Parse {
                message: e.to_string(),
            })?;

        if raw.signatures.is_empty() {
            return Err(SignatureError::Empty);
        }
        for (disease, symptoms) in &raw.signatures {
            if symptoms.is_empty() {
                return Err(SignatureError::Parse {
                    message: format!("signature for \"{disease}\" is empty"),
                });
            }
            for symptom in symptoms {
                if !lexicon.contains(symptom) {
                    return Err(SignatureError::UnknownSymptom {
                        disease: disease.clone(),
                        symptom: symptom.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            pack = %raw.pack.name,
            version = %raw.pack.version,
            diseases = raw.signatures.len(),
            %source,
            "loaded disease signatures"
        );

        Ok(Self {
            meta: raw.pack,
            signatures: raw.signatures,
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

    /// Number of diseases in the table.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the table is empty (never true for a validated pack).
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Disease names in lexicographic order.
    pub fn diseases(&self) -> impl Iterator<Item = &str> {
        self.signatures.keys().map(|k| k.as_str())
    }

    /// The expected symptoms for one disease.
    pub fn signature(&self, disease: &str) -> Option<&[String]> {
        self.signatures.get(disease).map(|v| v.as_slice())
    }

    /// Iterate `(disease, signature)` in lexicographic disease order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.signatures.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_pack_loads_against_bundled_lexicon() {
        let lexicon = SymptomLexicon::bundled().unwrap();
        let table = SignatureTable::bundled(&lexicon).unwrap();
        assert!(!table.is_empty());
        assert!(table.signature("Influenza").is_some());
        // Every signature symptom resolves in the lexicon.
        for (_, symptoms) in table.entries() {
            for symptom in symptoms {
                assert!(lexicon.contains(symptom));
            }
        }
    }

    #[test]
    fn dangling_symptom_reference_is_fatal() {
        let lexicon = SymptomLexicon::bundled().unwrap();
        let toml = r#"
            [pack]
            name = "bad"
            version = "0.0.0"

            [signatures]
            "Dragon Pox" = ["scaly_skin"]
        "#;
        let err =
            SignatureTable::from_toml_str(toml, PackSource::Bundled, &lexicon).unwrap_err();
        assert!(matches!(err, SignatureError::UnknownSymptom { .. }));
    }

    #[test]
    fn diseases_iterate_lexicographically() {
        let lexicon = SymptomLexicon::bundled().unwrap();
        let table = SignatureTable::bundled(&lexicon).unwrap();
        let names: Vec<&str> = table.diseases().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
