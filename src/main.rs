//! Meeting Reporter CLI
//!
//! Drives article threads through the reporting pipeline, one gate at a time
//! or interactively.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meeting_reporter::gate::{GateAnswer, TerminalGate};
use meeting_reporter::generator::create_generator;
use meeting_reporter::steps::engine_from_config;
use meeting_reporter::verify::{find_unmatched, QuoteVerifier};
use meeting_reporter::workflow::{CheckpointStore, FileCheckpointStore};
use meeting_reporter::{
    ArticleRecord, Config, Conversation, Error, RecordUpdate, Result, RunOutcome,
};

#[derive(Parser)]
#[command(name = "meeting-reporter")]
#[command(author, version, about = "Human-in-the-loop news reports from meeting transcripts")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a thread and run it to the intake form
    Start {
        /// Thread ID (generated when omitted)
        thread: Option<String>,
    },

    /// Answer the form a thread is suspended at and run on to the next gate
    Resume {
        /// Thread ID
        thread: String,

        /// Set a record field: key=value, value parsed as JSON when possible
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// JSON file with an object of field updates
        #[arg(long, value_name = "FILE")]
        updates: Option<PathBuf>,

        /// Source document URL
        #[arg(long)]
        url: Option<String>,

        /// Local source document
        #[arg(long)]
        file: Option<String>,

        /// Article length in words
        #[arg(long)]
        words: Option<u32>,

        /// Ask for changes
        #[arg(long, conflicts_with_all = ["accept", "cancel"])]
        critique: Option<String>,

        /// Accept without changes
        #[arg(long, conflicts_with = "cancel")]
        accept: bool,

        /// Abandon the article
        #[arg(long)]
        cancel: bool,

        /// Replace the article body with the contents of a file
        #[arg(long, value_name = "FILE")]
        body_file: Option<PathBuf>,

        /// Directory to write the finished article to
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Run a thread interactively, answering each form at the terminal
    Run {
        /// Thread ID (generated when omitted; an existing thread is continued)
        thread: Option<String>,

        /// Directory to write the finished article to
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Show where a thread stands
    Status {
        /// Thread ID
        thread: String,
    },

    /// List known threads
    List,

    /// Delete a thread's checkpoint
    Discard {
        /// Thread ID
        thread: String,
    },

    /// Check that every quote in a draft appears verbatim in a source
    Verify {
        /// Source transcript or minutes
        #[arg(long)]
        source: PathBuf,

        /// Draft article
        #[arg(long)]
        draft: PathBuf,

        /// Ask the generator to repair unmatched quotes
        #[arg(long)]
        repair: bool,
    },

    /// Initialize .meeting-reporter directory
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Start { thread } => {
            let thread = thread.unwrap_or_else(new_thread_id);
            let engine = engine_from_config(&config)?;
            let outcome = engine.start(&thread).await?;
            report(&thread, &outcome, cli.json, None)?;
        }

        Commands::Resume {
            thread,
            set,
            updates,
            url,
            file,
            words,
            critique,
            accept,
            cancel,
            body_file,
            output_dir,
        } => {
            let mut update = RecordUpdate::new();
            if let Some(path) = updates {
                let content = std::fs::read_to_string(&path)?;
                let fields: RecordUpdate = serde_json::from_str(&content).map_err(|e| {
                    Error::InvalidUpdate(format!("{}: {}", path.display(), e))
                })?;
                update = update.merge(fields);
            }
            for assignment in &set {
                update = update.assign(assignment)?;
            }
            if let Some(url) = url {
                update = update.url(&url);
            }
            if let Some(file) = file {
                update = update.file(&file);
            }
            if let Some(words) = words {
                update = update.words(words);
            }
            if let Some(path) = body_file {
                update = update.body(&std::fs::read_to_string(path)?);
            }
            if let Some(critique) = critique {
                update = update.revise(&critique);
            } else if accept {
                update = update.accept();
            } else if cancel {
                update = update.cancel();
            }

            let engine = engine_from_config(&config)?;
            let outcome = engine.resume(&thread, &update).await?;
            report(&thread, &outcome, cli.json, Some(&output_dir))?;
        }

        Commands::Run { thread, output_dir } => {
            let thread = thread.unwrap_or_else(new_thread_id);
            run_interactive(&config, &thread, &output_dir).await?;
        }

        Commands::Status { thread } => {
            let store = FileCheckpointStore::new(config.checkpoint_dir());
            let checkpoint = store
                .load(&thread)
                .await?
                .ok_or_else(|| Error::NoCheckpoint(thread.clone()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&checkpoint)?);
            } else {
                println!("{}", checkpoint.summary());
                if let Some(critique) = &checkpoint.record.critique {
                    println!("\nPending critique:\n{}", critique);
                }
            }
        }

        Commands::List => {
            let store = FileCheckpointStore::new(config.checkpoint_dir());
            let checkpoints = store.list().await?;
            if cli.json {
                let rows: Vec<_> = checkpoints
                    .iter()
                    .map(|c| {
                        json!({
                            "thread": c.thread_id,
                            "step": c.step,
                            "finished": c.finished,
                            "form_number": c.record.form_number,
                            "updated_at": c.updated_at,
                            "title": c.record.title,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if checkpoints.is_empty() {
                println!("No threads");
            } else {
                for checkpoint in checkpoints {
                    println!("{}", checkpoint.summary());
                }
            }
        }

        Commands::Discard { thread } => {
            let store = FileCheckpointStore::new(config.checkpoint_dir());
            if store.discard(&thread).await? {
                info!("Discarded thread {}", thread);
            } else {
                return Err(Error::NoCheckpoint(thread));
            }
        }

        Commands::Verify {
            source,
            draft,
            repair,
        } => {
            let source_text = std::fs::read_to_string(&source)?;
            let draft_text = std::fs::read_to_string(&draft)?;
            if !verify_draft(&config, &source_text, draft_text, repair, cli.json).await? {
                std::process::exit(1);
            }
        }

        Commands::Init => {
            let path = meeting_reporter::config::init()?;
            info!("Initialized configuration at {}", path.display());
        }

        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to serialize config: {}", e),
        },
    }

    Ok(())
}

fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Print an outcome and write the rendered article once finished
fn report(
    thread: &str,
    outcome: &RunOutcome,
    as_json: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    let written = match (outcome, output_dir) {
        (RunOutcome::Finished { record }, Some(dir)) => write_article(record, dir)?,
        _ => None,
    };

    if as_json {
        let status = if outcome.is_finished() { "finished" } else { "suspended" };
        let value = json!({
            "thread": thread,
            "status": status,
            "step": outcome.suspended_at(),
            "form_number": outcome.form_number(),
            "output": written.as_ref().map(|p| p.display().to_string()),
            "record": outcome.record(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match outcome {
        RunOutcome::Suspended { step, record } => {
            println!("Thread {} suspended after {} (form {})", thread, step, record.form_number);
            if let Some(title) = &record.title {
                println!("Title: {}", title);
            }
            if let Some(critique) = &record.critique {
                println!("Critique: {}", critique);
            }
        }
        RunOutcome::Finished { record } => {
            println!(
                "Thread {} finished: {}",
                thread,
                record.title.as_deref().unwrap_or("(untitled)")
            );
            if let Some(path) = written {
                println!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

fn write_article(record: &ArticleRecord, dir: &Path) -> Result<Option<PathBuf>> {
    let (Some(formatted), Some(name)) = (&record.formatted, &record.output_name) else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, formatted)?;
    Ok(Some(path))
}

async fn run_interactive(config: &Config, thread: &str, output_dir: &Path) -> Result<()> {
    let engine = engine_from_config(config)?;
    let mut gate = TerminalGate::stdio(config.article.words);

    info!("Running thread {}", thread);
    let mut outcome = match engine.start(thread).await {
        // Stopped on a step error last time: retry from the last checkpoint
        Err(Error::ThreadInProgress(_)) => engine.resume(thread, &RecordUpdate::new()).await?,
        other => other?,
    };

    loop {
        if let RunOutcome::Finished { record } = &outcome {
            if let Some(path) = write_article(record, output_dir)? {
                println!("Finished article written to {}", path.display());
            }
            return Ok(());
        }

        match gate.ask(&outcome)? {
            GateAnswer::Quit => {
                println!(
                    "Thread {} left suspended; continue with: meeting-reporter run {}",
                    thread, thread
                );
                return Ok(());
            }
            GateAnswer::Resume(update) => {
                outcome = engine.resume(thread, &update).await?;
            }
        }
    }
}

/// Report unmatched quotes; returns whether the draft is clean
async fn verify_draft(
    config: &Config,
    source: &str,
    draft: String,
    repair: bool,
    as_json: bool,
) -> Result<bool> {
    let (text, unmatched) = if repair {
        let generator = create_generator(config)?;
        let conversation = Conversation::new("You are a careful news writer.")
            .with_user(format!("Source:\n{}", source))
            .with_assistant(draft.clone());
        let mut verifier = QuoteVerifier::new(generator.as_ref());
        verifier = verifier.with_model(&config.generator.model);
        let verification = verifier.verify(draft, source, conversation).await?;
        let unmatched: Vec<String> = verification
            .warning
            .as_ref()
            .map(|w| w.all().map(str::to_string).collect())
            .unwrap_or_default();
        (verification.text, unmatched)
    } else {
        let unmatched = find_unmatched(&draft, source);
        (draft, unmatched)
    };

    if as_json {
        let value = json!({ "verified": unmatched.is_empty(), "unmatched": unmatched, "text": text });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if unmatched.is_empty() {
        println!("All quotes found in source");
        if repair {
            println!("\n{}", text);
        }
    } else {
        println!("Quotes not found verbatim in source:");
        for quote in &unmatched {
            println!("  {}", quote);
        }
        if repair {
            println!("\n{}", text);
        }
    }

    Ok(unmatched.is_empty())
}
