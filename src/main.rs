//! sekhmet CLI: symptom triage engine.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{Result, miette};

use sekhmet::conversation::Phase;
use sekhmet::engine::{Engine, EngineConfig};
use sekhmet::lexicon::SymptomLexicon;
use sekhmet::orchestrator::display_symptoms;
use sekhmet::rank::StrategyKind;

#[derive(Parser)]
#[command(name = "sekhmet", version, about = "Symptom triage engine")]
struct Cli {
    /// External pack directory (lexicon.toml, signatures.toml, model.json).
    #[arg(long, global = true)]
    packs: Option<PathBuf>,

    /// Scoring strategy: overlap or model.
    #[arg(long, global = true, default_value = "overlap")]
    strategy: String,

    /// Distinct affirmed symptoms required before ranking unlocks.
    #[arg(long, global = true, default_value = "3")]
    threshold: usize,

    /// How many ranked conditions to return.
    #[arg(long, global = true, default_value = "5")]
    top_k: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive triage conversation.
    Chat,

    /// Extract affirmed and negated symptoms from text.
    Extract {
        /// The utterance to analyze.
        text: String,
    },

    /// Rank conditions against a set of symptoms.
    Rank {
        /// Canonical symptom ids (comma-separated, e.g. "fever,cough").
        symptoms: String,
    },

    /// Rank conditions and explain the result.
    Explain {
        /// Canonical symptom ids (comma-separated).
        symptoms: String,
    },

    /// Inspect the loaded lexicon.
    Lexicon {
        #[command(subcommand)]
        action: LexiconAction,
    },

    /// Show engine info and statistics.
    Info,
}

#[derive(Subcommand)]
enum LexiconAction {
    /// List all canonical symptoms.
    List,
    /// Show the surface patterns for one symptom.
    Show {
        /// Canonical symptom id.
        id: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let strategy = StrategyKind::from_str_loose(&cli.strategy)
        .ok_or_else(|| miette!("unknown strategy \"{}\" (use overlap or model)", cli.strategy))?;
    let config = EngineConfig {
        threshold: cli.threshold,
        top_k: cli.top_k,
        strategy,
        packs_dir: cli.packs.clone(),
        ..Default::default()
    };
    let engine = Engine::new(config)?;

    match cli.command {
        Commands::Chat => chat_repl(&engine)?,

        Commands::Extract { text } => {
            let result = engine.extract(&text);
            println!("affirmed: {}", join_ids(&result.affirmed));
            println!("negated:  {}", join_ids(&result.negated));
        }

        Commands::Rank { symptoms } => {
            let evidence = parse_symptoms(&symptoms);
            let prediction = engine.rank(&evidence)?;
            for (i, entry) in prediction.entries.iter().enumerate() {
                println!("{}. {} ({:.1}%)", i + 1, entry.disease, entry.score * 100.0);
            }
        }

        Commands::Explain { symptoms } => {
            let evidence = parse_symptoms(&symptoms);
            let explanation = engine.explain(&evidence)?;
            println!("{}", explanation.text_explanation);
            if let Some(contrast) = explanation.contrastive_explanation {
                println!("{contrast}");
            }
        }

        Commands::Lexicon { action } => match action {
            LexiconAction::List => {
                for (id, patterns) in engine.lexicon().entries() {
                    println!("{id} ({} patterns)", patterns.len());
                }
            }
            LexiconAction::Show { id } => match engine.lexicon().patterns(&id) {
                Some(patterns) => {
                    println!("{} ({})", id, SymptomLexicon::display_name(&id));
                    for pattern in patterns {
                        println!("  - {pattern}");
                    }
                }
                None => return Err(miette!("unknown symptom id \"{id}\"")),
            },
        },

        Commands::Info => {
            println!("{}", engine.info());
        }
    }

    Ok(())
}

/// Interactive REPL over a single conversation.
fn chat_repl(engine: &Engine) -> Result<()> {
    println!("==================================================");
    println!("sekhmet - interactive symptom triage");
    println!("==================================================");
    println!("Type 'quit' to exit, 'reset' to start a new conversation");
    println!("--------------------------------------------------");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let conversation_id = "repl";

    loop {
        print!("\nYou: ");
        stdout.flush().map_err(|e| miette!("stdout: {e}"))?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| miette!("stdin: {e}"))?;
        if read == 0 {
            // EOF
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            println!("\nTake care!");
            break;
        }

        let response = engine.process_turn(conversation_id, input);
        println!("\nsekhmet: {}", response.text);

        if response.phase == Phase::Collecting && !response.symptoms.is_empty() {
            println!("Current symptoms: {}", display_symptoms(&response.symptoms));
        }
    }

    Ok(())
}

fn parse_symptoms(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn join_ids(ids: &BTreeSet<String>) -> String {
    if ids.is_empty() {
        "(none)".to_string()
    } else {
        ids.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
