//! eduagent — educational question-answering assistant, CLI entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args
//!   3. Load config
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Dispatch the subcommand

use std::path::Path;

use tracing::info;

use eduagent::agent::SubjectAgent;
use eduagent::config::{self, Config};
use eduagent::docstore::SubjectStore;
use eduagent::error::AppError;
use eduagent::logger;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level)?;

    info!(
        agent_name = %config.agent_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    match args.command {
        Command::Ask { subject, question } => ask(&config, &subject, &question).await,
        Command::Ingest { subject, title, paths } => ingest(&config, &subject, title, &paths),
        Command::Subjects => subjects(&config),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn ask(config: &Config, subject: &str, question: &str) -> Result<(), AppError> {
    let agent = SubjectAgent::from_config(config, subject)?;
    let answer = agent.comprehensive_answer(question).await;

    println!("{}", answer.final_answer);
    println!();
    println!("--- Documents ---");
    println!("{}", answer.rag_answer);
    println!("--- Model ---");
    println!("{}", answer.llm_answer);
    println!("--- Web ---");
    println!("{}", answer.web_answer);
    println!();
    println!("Sources:");
    for source in &answer.sources {
        println!("  - {source}");
    }
    Ok(())
}

fn ingest(
    config: &Config,
    subject: &str,
    title: Option<String>,
    paths: &[String],
) -> Result<(), AppError> {
    let profile = config.subjects.resolve(subject);
    let store = SubjectStore::create(&config.docstore_root(), &profile.slug)?;

    for path in paths {
        let path = Path::new(path);
        let content = std::fs::read_to_string(path)?;
        // An explicit --title only makes sense for a single file.
        let title = match (&title, paths.len()) {
            (Some(t), 1) => t.clone(),
            _ => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".to_string()),
        };

        let report = store.add_document(
            &title,
            &path.display().to_string(),
            &content,
            config.retrieval.chunk_size,
        )?;

        if report.deduplicated {
            println!("already indexed: {title} ({})", report.doc_id);
        } else {
            println!(
                "indexed: {title} ({} chunks, doc {})",
                report.chunks_indexed, report.doc_id
            );
        }
    }
    Ok(())
}

fn subjects(config: &Config) -> Result<(), AppError> {
    let root = config.docstore_root();
    for name in config.subjects.names() {
        let profile = config.subjects.resolve(&name);
        match SubjectStore::open_existing(&root, &profile.slug) {
            Some(store) => {
                let docs = store.document_count()?;
                println!("{name}  ({docs} documents)");
            }
            None => println!("{name}  (no index)"),
        }
    }
    Ok(())
}

// ── CLI args ──────────────────────────────────────────────────────────────────

enum Command {
    Ask { subject: String, question: String },
    Ingest { subject: String, title: Option<String>, paths: Vec<String> },
    Subjects,
}

struct CliArgs {
    command: Command,
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn print_usage() {
    println!("Usage: eduagent [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  ask <QUESTION...>          Answer a question from documents, model, and web");
    println!("  ingest <FILE...>           Index text files into a subject's document store");
    println!("  subjects                   List configured subjects and their index status");
    println!();
    println!("Options:");
    println!("  -h, --help                 Print help");
    println!("  -s, --subject <NAME>       Subject (default: General)");
    println!("  -t, --title <TITLE>        Document title for ingest (default: file stem)");
    println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
    println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut subject: Option<String> = None;
    let mut title: Option<String> = None;
    let mut command_word: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            positional.extend(iter);
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-s" | "--subject" => {
                if let Some(name) = iter.next() {
                    subject = Some(name);
                } else {
                    eprintln!("error: -s/--subject requires a name argument");
                    std::process::exit(1);
                }
            }
            "-t" | "--title" => {
                if let Some(t) = iter.next() {
                    title = Some(t);
                } else {
                    eprintln!("error: -t/--title requires a title argument");
                    std::process::exit(1);
                }
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ if command_word.is_none() => command_word = Some(arg),
            _ => positional.push(arg),
        }
    }

    let subject = subject.unwrap_or_else(|| "General".to_string());
    let command = match command_word.as_deref() {
        Some("ask") => {
            if positional.is_empty() {
                eprintln!("error: ask requires a question");
                std::process::exit(1);
            }
            Command::Ask { subject, question: positional.join(" ") }
        }
        Some("ingest") => {
            if positional.is_empty() {
                eprintln!("error: ingest requires at least one file path");
                std::process::exit(1);
            }
            Command::Ingest { subject, title, paths: positional }
        }
        Some("subjects") => Command::Subjects,
        Some(other) => {
            eprintln!("error: unknown command '{other}'");
            std::process::exit(1);
        }
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    // Each -v raises verbosity one tier from the config default:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug
    //   -vvvv+  → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { command, log_level, config_path }
}
