//! # sekhmet
//!
//! A symptom triage engine: lexicon-driven phrase extraction with negation
//! scoping, a multi-turn conversation state machine, diagnosis ranking over
//! accumulated evidence, and attribution-based rationale rendering.
//!
//! ## Architecture
//!
//! - **Lexicon packs** (`lexicon`, `signature`): TOML-defined symptom and
//!   disease tables, loaded once at startup and shared read-only
//! - **Phrase matcher** (`extract`): greedy longest-match over a
//!   first-token-bucketed pattern index, with bounded negation windows
//! - **Intent boundary** (`intent`): pluggable classifier with a keyword
//!   fallback and a deterministic emergency override
//! - **Ranking engine** (`rank`): strategy-polymorphic scoring — signature
//!   overlap or a delegated probability model
//! - **Explanation** (`explain`): attribution-to-prose rendering with
//!   graceful degradation
//! - **Orchestrator** (`orchestrator`, `conversation`): the per-conversation
//!   finite-state machine
//!
//! ## Library usage
//!
//! ```
//! use sekhmet::engine::{Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let result = engine.extract("I have a headache and nausea but no fever");
//! assert!(result.affirmed.contains("headache"));
//! assert!(result.negated.contains("fever"));
//!
//! let response = engine.process_turn("demo", "hello");
//! println!("{}", response.text);
//! ```

pub mod conversation;
pub mod engine;
pub mod error;
pub mod explain;
pub mod extract;
pub mod intent;
pub mod lexicon;
pub mod orchestrator;
pub mod rank;
pub mod signature;
