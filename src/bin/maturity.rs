#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use maturity_harness::assessment::{Assessment, NextQuestion, QuestionView};
use maturity_harness::catalog::{Catalog, CatalogReader, CriterionFilter};
use maturity_harness::config::AppConfig;
use maturity_harness::interviewer::build_interviewer;
use maturity_harness::ledger::{Answer, CompanyInfo, SqliteLedger};
use maturity_harness::scoring::{complete_results, render_markdown, SessionResults};

#[derive(Parser)]
#[command(name = "maturity", version, about = "Digital maturity assessment CLI")]
struct Cli {
    /// TOML config file (MATURITY_* env vars override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite ledger path (overrides config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and print a criteria catalog
    Catalog {
        /// Catalog JSON to validate instead of the configured one
        #[arg(long)]
        file: Option<PathBuf>,
        /// Only criteria of this dimension code
        #[arg(long)]
        dimension: Option<String>,
        /// Pillar code, used together with --dimension
        #[arg(long, requires = "dimension")]
        pillar: Option<String>,
    },
    /// Open a new assessment session
    Start {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        sector: String,
        #[arg(long, default_value = "")]
        size: String,
    },
    /// Show the current question of a session
    Ask {
        #[arg(long)]
        session: String,
    },
    /// Answer the current question of a session
    Answer {
        #[arg(long)]
        session: String,
        #[arg(long)]
        text: String,
    },
    /// Run an interactive interview on stdin/stdout
    Interview {
        /// Resume an existing session instead of opening a new one
        #[arg(long, conflicts_with = "name")]
        session: Option<String>,
        #[arg(long, required_unless_present = "session")]
        name: Option<String>,
        #[arg(long, default_value = "")]
        sector: String,
        #[arg(long, default_value = "")]
        size: String,
    },
    /// Scores, profile, gaps and recommendations of a session
    Results {
        #[arg(long)]
        session: String,
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Full session export (company, dates, results, answers) as JSON
    Export {
        #[arg(long)]
        session: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export raw ledger answers of a session to JSONL
    AnswersExport {
        #[arg(long)]
        session: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Score a JSON list of {criterion_id, score} without a session
    Score {
        #[arg(long)]
        answers: PathBuf,
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Md,
}

#[derive(Deserialize)]
struct ScoreInput {
    criterion_id: String,
    score: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let catalog = load_catalog(&config)?;

    match cli.command {
        Commands::Catalog {
            file,
            dimension,
            pillar,
        } => {
            let catalog = match file {
                Some(path) => Catalog::from_json_path(path)?,
                None => catalog,
            };
            let filter = match (dimension, pillar) {
                (Some(d), Some(p)) => CriterionFilter::pillar(d, p),
                (Some(d), None) => CriterionFilter::dimension(d),
                _ => CriterionFilter::all(),
            };
            let criteria = catalog.list_criteria(&filter);
            emit_json(None, &criteria)?;
        }
        Commands::Score {
            answers,
            format,
            out,
        } => {
            let inputs: Vec<ScoreInput> = read_json(&answers)?;
            let answers = inputs
                .into_iter()
                .map(|i| Answer::scored("offline", i.criterion_id, i.score))
                .collect::<Result<Vec<_>, _>>()?;
            let results = SessionResults {
                session_id: "offline".to_string(),
                company_name: String::new(),
                results: complete_results(&catalog, &answers)?,
            };
            emit_results(out.as_deref(), &results, format)?;
        }
        command => {
            let store = cli.store.unwrap_or_else(|| config.store_path.clone());
            let ledger = SqliteLedger::new(&store)?;
            let service = Assessment::new(
                Arc::new(catalog),
                Arc::new(ledger.clone()),
                build_interviewer(&config),
            );
            run_session_command(command, &service, &ledger).await?;
        }
    }

    Ok(())
}

async fn run_session_command(
    command: Commands,
    service: &Assessment,
    ledger: &SqliteLedger,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Start { name, sector, size } => {
            let session = service.start(CompanyInfo { name, sector, size }).await?;
            emit_json(None, &session)?;
        }
        Commands::Ask { session } => {
            let next = service.next_question(&session).await?;
            emit_json(None, &next)?;
        }
        Commands::Answer { session, text } => {
            let outcome = service.submit_answer(&session, &text).await?;
            emit_json(None, &outcome)?;
        }
        Commands::Interview {
            session,
            name,
            sector,
            size,
        } => {
            let session_id = match session {
                Some(id) => id,
                None => {
                    let name = name.unwrap_or_default();
                    service.start(CompanyInfo { name, sector, size }).await?.id
                }
            };
            interview(service, &session_id).await?;
        }
        Commands::Results {
            session,
            format,
            out,
        } => {
            let results = service.results(&session).await?;
            emit_results(out.as_deref(), &results, format)?;
        }
        Commands::Export { session, out } => {
            let export = service.export(&session).await?;
            emit_json(out.as_deref(), &export)?;
        }
        Commands::AnswersExport { session, out } => {
            let rows = ledger.export_answers_jsonl(&session, &out).await?;
            eprintln!("exported {rows} answers to {}", out.display());
        }
        Commands::Catalog { .. } | Commands::Score { .. } => {}
    }
    Ok(())
}

async fn interview(service: &Assessment, session_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();
    writeln!(stdout, "Session {session_id} (type 'quit' to pause)")?;

    let mut question = match service.next_question(session_id).await? {
        NextQuestion::Question { question, .. } => Some(question),
        NextQuestion::Completed => None,
    };

    while let Some(current) = question.take() {
        print_question(&mut stdout, &current)?;
        let Some(line) = lines.next_line().await? else {
            writeln!(stdout, "\nPaused. Resume with --session {session_id}")?;
            return Ok(());
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") {
            writeln!(stdout, "Paused. Resume with --session {session_id}")?;
            return Ok(());
        }
        if line.is_empty() {
            question = Some(current);
            continue;
        }
        let outcome = service.submit_answer(session_id, line).await?;
        writeln!(stdout, "\n{}", outcome.ai_reaction)?;
        writeln!(stdout, "[{}/{}]", outcome.progress, outcome.total)?;
        question = outcome.next_question;
    }

    let results = service.results(session_id).await?;
    writeln!(stdout, "\n{}", render_markdown(&results))?;
    Ok(())
}

fn print_question(out: &mut impl Write, question: &QuestionView) -> io::Result<()> {
    writeln!(
        out,
        "\n[{} / {}] {}",
        question.dimension, question.pillar, question.question_text
    )?;
    write!(out, "> ")?;
    out.flush()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("maturity_harness=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_catalog(config: &AppConfig) -> Result<Catalog, Box<dyn std::error::Error>> {
    Ok(match &config.catalog_path {
        Some(path) => Catalog::from_json_path(path)?,
        None => Catalog::builtin()?,
    })
}

fn emit_results(
    out: Option<&Path>,
    results: &SessionResults,
    format: OutputFormat,
) -> Result<(), io::Error> {
    match format {
        OutputFormat::Json => emit_json(out, results),
        OutputFormat::Md => emit_text(out, &render_markdown(results)),
    }
}

fn emit_json<T: serde::Serialize>(out: Option<&Path>, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    emit_text(out, &json)
}

fn emit_text(out: Option<&Path>, text: &str) -> Result<(), io::Error> {
    match out {
        Some(path) => std::fs::write(path, text),
        None => writeln!(io::stdout(), "{text}"),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
