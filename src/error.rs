//! Rich diagnostic error types for the sekhmet engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the sekhmet engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TriageError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lexicon(#[from] LexiconError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Explain(#[from] ExplainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

/// Convenience alias used across the crate.
pub type TriageResult<T> = std::result::Result<T, TriageError>;

// ---------------------------------------------------------------------------
// Lexicon errors
// ---------------------------------------------------------------------------

/// Errors loading or validating the symptom lexicon pack.
///
/// All of these are fatal at startup: the engine cannot serve without a
/// lexicon.
#[derive(Debug, Error, Diagnostic)]
pub enum LexiconError {
    #[error("failed to read lexicon pack: {path}")]
    #[diagnostic(
        code(sekhmet::lexicon::io),
        help("Ensure the pack file exists and is readable, or omit --packs to use the bundled lexicon.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse lexicon pack: {message}")]
    #[diagnostic(
        code(sekhmet::lexicon::parse),
        help(
            "Check the lexicon.toml syntax: a [symptoms] table of \
             `canonical_id = [\"variant\", ...]` entries plus [negation] \
             and [emergency] sections."
        )
    )]
    Parse { message: String },

    #[error("lexicon pack contains no symptoms")]
    #[diagnostic(
        code(sekhmet::lexicon::empty),
        help("A lexicon must define at least one symptom with at least one surface pattern.")
    )]
    Empty,

    #[error("symptom \"{symptom}\" has an empty pattern list")]
    #[diagnostic(
        code(sekhmet::lexicon::no_patterns),
        help("Every canonical symptom needs at least one surface pattern to be matchable.")
    )]
    NoPatterns { symptom: String },
}

/// Result alias for lexicon operations.
pub type LexiconResult<T> = std::result::Result<T, LexiconError>;

// ---------------------------------------------------------------------------
// Signature errors
// ---------------------------------------------------------------------------

/// Errors loading or validating the disease signature pack.
#[derive(Debug, Error, Diagnostic)]
pub enum SignatureError {
    #[error("failed to read signature pack: {path}")]
    #[diagnostic(
        code(sekhmet::signature::io),
        help("Ensure the pack file exists and is readable, or omit --packs to use the bundled signatures.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse signature pack: {message}")]
    #[diagnostic(
        code(sekhmet::signature::parse),
        help(
            "Check the signatures.toml syntax: a [signatures] table of \
             `\"Disease Name\" = [\"symptom_id\", ...]` entries."
        )
    )]
    Parse { message: String },

    #[error("signature pack contains no diseases")]
    #[diagnostic(
        code(sekhmet::signature::empty),
        help("A signature table must define at least one disease.")
    )]
    Empty,

    #[error("signature for \"{disease}\" references unknown symptom \"{symptom}\"")]
    #[diagnostic(
        code(sekhmet::signature::unknown_symptom),
        help("Every symptom in a disease signature must be a canonical id defined in the lexicon pack.")
    )]
    UnknownSymptom { disease: String, symptom: String },
}

/// Result alias for signature operations.
pub type SignatureResult<T> = std::result::Result<T, SignatureError>;

// ---------------------------------------------------------------------------
// Intent errors
// ---------------------------------------------------------------------------

/// Errors from the intent classification boundary.
#[derive(Debug, Error, Diagnostic)]
pub enum IntentError {
    #[error("delegated intent model failed: {message}")]
    #[diagnostic(
        code(sekhmet::intent::model),
        help(
            "The external intent model returned an error. The keyword fallback \
             model never fails; configure it if the delegated model is unreliable."
        )
    )]
    Model { message: String },
}

/// Result alias for intent operations.
pub type IntentResult<T> = std::result::Result<T, IntentError>;

// ---------------------------------------------------------------------------
// Ranking errors
// ---------------------------------------------------------------------------

/// Errors from the diagnosis ranking engine.
///
/// `Unavailable` and `Timeout` are retryable: the caller may re-issue the
/// same evidence. Conversation state is never advanced past a failed ranking.
#[derive(Debug, Error, Diagnostic)]
pub enum RankError {
    #[error("failed to read model artifact: {path}")]
    #[diagnostic(
        code(sekhmet::rank::model_io),
        help("Ensure model.json exists in the pack directory, or select the overlap strategy which needs no model.")
    )]
    ModelIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {message}")]
    #[diagnostic(
        code(sekhmet::rank::model_parse),
        help("model.json must define classes, vocabulary, one weight row per class, and one bias per class.")
    )]
    ModelParse { message: String },

    #[error("model artifact is inconsistent: {message}")]
    #[diagnostic(
        code(sekhmet::rank::model_shape),
        help(
            "Each weight row must have one entry per vocabulary symptom, and \
             classes, weights, and bias must have equal lengths."
        )
    )]
    ModelShape { message: String },

    #[error("probability capability unavailable: {reason}")]
    #[diagnostic(
        code(sekhmet::rank::unavailable),
        help("The delegated scorer failed. Retry the ranking, or switch to the overlap strategy.")
    )]
    Unavailable { reason: String },

    #[error("probability capability exceeded time budget of {budget_ms}ms")]
    #[diagnostic(
        code(sekhmet::rank::timeout),
        help(
            "The delegated scorer took too long. Retry the ranking, increase \
             the budget, or switch to the overlap strategy."
        )
    )]
    Timeout { budget_ms: u64 },
}

/// Result alias for ranking operations.
pub type RankResult<T> = std::result::Result<T, RankError>;

// ---------------------------------------------------------------------------
// Explanation errors
// ---------------------------------------------------------------------------

/// Errors from the explanation pipeline.
///
/// Missing attribution data is NOT an error: the generator degrades to a
/// ranking-only rendering. These variants cover genuinely broken inputs.
#[derive(Debug, Error, Diagnostic)]
pub enum ExplainError {
    #[error("cannot explain an empty ranking")]
    #[diagnostic(
        code(sekhmet::explain::empty_ranking),
        help("Run the ranking engine first; an explanation needs at least one ranked disease.")
    )]
    EmptyRanking,
}

/// Result alias for explanation operations.
pub type ExplainResult<T> = std::result::Result<T, ExplainError>;

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Engine-level configuration and lifecycle errors.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid engine configuration: {message}")]
    #[diagnostic(
        code(sekhmet::engine::invalid_config),
        help("Check EngineConfig values: the evidence threshold and top_k must both be at least 1.")
    )]
    InvalidConfig { message: String },

    #[error("pack directory not found: {path}")]
    #[diagnostic(
        code(sekhmet::engine::pack_dir),
        help("The --packs directory must exist and contain lexicon.toml, signatures.toml, and model.json.")
    )]
    PackDir { path: String },
}

/// Result alias for engine-level operations returning the top-level error.
pub type EngineResult<T> = std::result::Result<T, TriageError>;
