//! # askdoc CLI
//!
//! The `askdoc` binary loads a document and answers questions about it,
//! routing each question to casual chat, section retrieval, or a
//! whole-document answer.
//!
//! ## Usage
//!
//! ```bash
//! askdoc --config ./config/askdoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdoc ask <doc> "<question>"` | Load a document and answer one question |
//! | `askdoc chat <doc>` | Interactive session on stdin |
//! | `askdoc chunks <doc>` | Print the segments a document is split into |
//! | `askdoc classify "<question>"` | Print the route a question would take |
//! | `askdoc serve` | Start the HTTP session server |
//! | `askdoc completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # One-shot question, showing the chosen route on stderr
//! askdoc ask syllabus.pdf "What is covered in week 2?" --show-route
//!
//! # Conversation about a handbook
//! askdoc chat handbook.pdf
//!
//! # Inspect how a document is segmented (no model calls)
//! askdoc chunks handbook.pdf --json
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use askdoc::classify::Classifier;
use askdoc::config::{self, Config};
use askdoc::embedding::create_embedder;
use askdoc::ingest::ingest;
use askdoc::llm::create_model;
use askdoc::models::Role;
use askdoc::progress::{IngestProgressReporter, ProgressMode};
use askdoc::prompts::Prompts;
use askdoc::server;
use askdoc::session::SessionState;

/// askdoc: ask questions about a document.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/askdoc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "askdoc",
    about = "Ask questions about a PDF, Word or text document",
    version,
    long_about = "askdoc splits a document into overlapping segments, embeds them, and answers \
    questions by routing each one to casual chat, retrieval over the most relevant segments, \
    or a whole-document answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/askdoc.toml`. Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/askdoc.toml")]
    config: PathBuf,

    /// Progress output while a document loads. Defaults to `human` when
    /// stderr is a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Load a document and answer a single question.
    ///
    /// The answer is printed on stdout.
    Ask {
        /// Document to load (`.pdf`, `.docx`, `.txt`, `.md`).
        document: PathBuf,

        /// The question to answer.
        question: String,

        /// Print the chosen route (CHAT, LOCAL, GLOBAL) on stderr.
        #[arg(long)]
        show_route: bool,
    },

    /// Start an interactive session about a document.
    ///
    /// Reads questions from stdin, one per line. Commands: `/load <path>`,
    /// `/reset`, `/history`, `/quit`.
    Chat {
        /// Document to load at start.
        document: PathBuf,

        /// Print the chosen route before each answer.
        #[arg(long)]
        show_route: bool,
    },

    /// Print the segments a document is split into.
    ///
    /// Makes no model or embedding calls.
    Chunks {
        document: PathBuf,

        /// Emit a JSON array instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the route a question would take.
    Classify {
        question: String,
    },

    /// Start the HTTP session server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "askdoc", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_or_default(&cli.config)?;
    let progress = cli
        .progress
        .map(ProgressMode::from)
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Ask {
            document,
            question,
            show_route,
        } => {
            run_ask(&cfg, &document, &question, show_route, progress.as_ref()).await?;
        }
        Commands::Chat {
            document,
            show_route,
        } => {
            run_chat(&cfg, &document, show_route, progress.as_ref()).await?;
        }
        Commands::Chunks { document, json } => {
            run_chunks(&cfg, &document, json)?;
        }
        Commands::Classify { question } => {
            let model = create_model(&cfg.llm)?;
            let classifier = Classifier::new(model, Arc::new(Prompts::from_config(&cfg.prompts)));
            let classification = classifier.classify(&question).await?;
            println!("{}", classification.route());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

async fn run_ask(
    cfg: &Config,
    document: &Path,
    question: &str,
    show_route: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<()> {
    let mut session = SessionState::new();
    session
        .initialize(
            cfg,
            document,
            create_model(&cfg.llm)?,
            create_embedder(&cfg.embedding)?,
            progress,
        )
        .await?;

    let answer = session.ask(question).await?;
    if show_route {
        eprintln!("route: {}", answer.route);
    }
    println!("{}", answer.text.trim_end());
    Ok(())
}

async fn run_chat(
    cfg: &Config,
    document: &Path,
    show_route: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<()> {
    let model = create_model(&cfg.llm)?;
    let embedder = create_embedder(&cfg.embedding)?;
    let mut session = SessionState::new();

    let pipeline = session
        .initialize(cfg, document, model.clone(), embedder.clone(), progress)
        .await?;
    eprintln!(
        "Loaded {} ({} pages, {} segments). Ask a question, or /quit to exit.",
        document.display(),
        pipeline.document().pages.len(),
        pipeline.index().len()
    );

    let interactive = atty::is(atty::Stream::Stdin);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if interactive {
            eprint!("> ");
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit" | "/exit", _) => break,
            ("/reset", _) => {
                session.reset();
                eprintln!("Session cleared. Load a document with /load <path>.");
            }
            ("/load", path) if !path.trim().is_empty() => {
                let path = Path::new(path.trim());
                match session
                    .initialize(cfg, path, model.clone(), embedder.clone(), progress)
                    .await
                {
                    Ok(pipeline) => eprintln!(
                        "Loaded {} ({} pages, {} segments).",
                        path.display(),
                        pipeline.document().pages.len(),
                        pipeline.index().len()
                    ),
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            ("/load", _) => eprintln!("usage: /load <path>"),
            ("/history", _) => {
                for turn in session.transcript().turns() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "askdoc",
                    };
                    println!("[{}] {}: {}", turn.at.format("%H:%M:%S"), who, turn.text.trim_end());
                }
            }
            _ => match session.ask(line).await {
                Ok(answer) => {
                    if show_route {
                        eprintln!("route: {}", answer.route);
                    }
                    println!("{}", answer.text.trim_end());
                }
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }

    Ok(())
}

fn run_chunks(cfg: &Config, document: &Path, json: bool) -> Result<()> {
    let ingested = ingest(document, &cfg.chunking)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingested.segments)?);
        return Ok(());
    }

    println!(
        "{}: {} pages, {} segments",
        document.display(),
        ingested.document.pages.len(),
        ingested.segments.len()
    );
    for segment in &ingested.segments {
        println!(
            "\n--- segment {} (page {}, offset {}, {} chars) ---",
            segment.index,
            segment.page,
            segment.char_offset,
            segment.text.chars().count()
        );
        println!("{}", segment.text);
    }
    Ok(())
}
