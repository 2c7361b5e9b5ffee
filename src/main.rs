//! Course Advisor - tiered academic advising over a prerequisite graph.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use course_advisor::ai::AdvisorClient;
use course_advisor::catalog::{
    default_catalog_path, sample_catalog, CodeTable, CourseCode, KnowledgeStore, MemoryStore,
    SqliteStore, StoreError,
};
use course_advisor::classify::YearLevel;
use course_advisor::config::{AdvisorConfig, ConfigError, ConfigLoader};
use course_advisor::display;
use course_advisor::engine::AdvisorEngine;
use course_advisor::graph::{GraphError, PrerequisiteGraph, Requirement};
use course_advisor::router::StudentContext;
use course_advisor::server::{AdvisorServer, ServerError};

#[derive(Parser)]
#[command(
    name = "course-advisor",
    about = "Answer academic advising questions from a course catalog",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question.
    Ask {
        /// The question to answer.
        question: String,
        /// Courses already completed (repeatable).
        #[arg(short, long)]
        completed: Vec<String>,
        /// Year level (freshman, sophomore, junior, senior, summer).
        #[arg(short, long)]
        year: Option<YearLevel>,
        /// Track the student follows.
        #[arg(short, long)]
        track: Option<String>,
    },
    /// List the prerequisites of a course.
    Prereqs {
        /// Course code, e.g. "CS 251".
        code: String,
    },
    /// Plan the remaining semesters of a track.
    Roadmap {
        /// Track id, name or alias.
        track: String,
        /// Courses already completed (repeatable).
        #[arg(short, long)]
        completed: Vec<String>,
    },
    /// Report cycles and dangling edges in the catalog.
    Check,
    /// Write the built-in sample catalog to the SQLite store.
    Seed {
        /// Database path; defaults to the configured or standard location.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Serve the HTTP API.
    Serve {
        /// Override the configured port.
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Unrecognized course code '{0}'")]
    UnknownCode(String),

    #[error("Unknown track '{0}'")]
    UnknownTrack(String),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<AdvisorConfig, ConfigError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load()
}

/// SQLite when a database is configured or already present, otherwise the
/// built-in sample catalog in memory.
async fn open_store(config: &AdvisorConfig) -> Result<Arc<dyn KnowledgeStore>, StoreError> {
    let path = config
        .store
        .path
        .clone()
        .or_else(|| Some(default_catalog_path()).filter(|p| p.exists()));

    if let Some(path) = path {
        tracing::info!(path = %path.display(), "Using SQLite catalog");
        return Ok(Arc::new(SqliteStore::open(path).await?));
    }
    tracing::info!("No catalog database found, using the sample catalog");
    Ok(Arc::new(MemoryStore::new(sample_catalog())))
}

async fn open_engine(config: AdvisorConfig) -> Result<AdvisorEngine, CliError> {
    let store = open_store(&config).await?;
    let ai = config.ai.clone();
    let engine = AdvisorEngine::open(config, Arc::new(CodeTable::default()), store).await?;

    match AdvisorClient::from_config(ai) {
        Ok(client) => {
            tracing::debug!(model = client.model(), "Escalation tier enabled");
            Ok(engine.with_generator(Arc::new(client)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Escalation tier disabled");
            Ok(engine)
        }
    }
}

fn parse_codes(codes: &CodeTable, raw: &[String]) -> Result<Vec<CourseCode>, CliError> {
    raw.iter()
        .map(|r| codes.parse(r).ok_or_else(|| CliError::UnknownCode(r.clone())))
        .collect()
}

/// Direct requirements and the full closure of `course`, in display form.
fn prerequisite_listing(
    graph: &PrerequisiteGraph,
    course: &CourseCode,
) -> Result<(Vec<Requirement>, Vec<String>), GraphError> {
    let direct = graph.prerequisites_of(course)?;
    let all = graph
        .all_prerequisites_of(course)?
        .iter()
        .map(ToString::to_string)
        .collect();
    Ok((direct, all))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Ask {
            question,
            completed,
            year,
            track,
        } => {
            let engine = open_engine(config).await?;
            let student = StudentContext {
                completed: parse_codes(engine.codes(), &completed)?
                    .into_iter()
                    .collect(),
                year,
                track,
            };
            let response = engine.ask(&question, &student).await;
            display::print_answer(&response, cli.verbose > 0);
        }
        Commands::Prereqs { code } => {
            let engine = open_engine(config).await?;
            let course = engine
                .codes()
                .parse(&code)
                .ok_or_else(|| CliError::UnknownCode(code.clone()))?;
            let (direct, all) = prerequisite_listing(&engine.graph(), &course)?;
            display::print_prerequisites(course.as_str(), &direct, &all);
        }
        Commands::Roadmap { track, completed } => {
            let engine = open_engine(config).await?;
            let mut found = engine
                .store()
                .get_track(&track)
                .await?
                .ok_or_else(|| CliError::UnknownTrack(track.clone()))?;
            found.required = found.required.iter().map(|c| engine.normalize_code(c)).collect();
            found.electives = found.electives.iter().map(|c| engine.normalize_code(c)).collect();
            let completed = parse_codes(engine.codes(), &completed)?.into_iter().collect();
            let roadmap = engine.graph().roadmap(
                &found,
                &completed,
                engine.config().graph.per_semester_cap,
            );
            display::print_roadmap(&roadmap);
        }
        Commands::Check => {
            let provider = format!("{:?}", config.ai.provider).to_lowercase();
            let model = config.ai.model.clone();
            let engine = open_engine(config).await?;
            display::print_integrity(&engine.integrity_report());
            display::print_safety_report(&engine.safety_report());
            display::print_generator(&provider, &model, engine.router().has_generator());
        }
        Commands::Seed { path } => {
            let path = path
                .or_else(|| config.store.path.clone())
                .unwrap_or_else(default_catalog_path);
            let store = SqliteStore::open(&path).await?;
            let catalog = sample_catalog();
            let courses = catalog.courses.len();
            store.replace_catalog(catalog).await?;
            display::print_ok(&format!(
                "Seeded {courses} courses into {}",
                path.display()
            ));
        }
        Commands::Serve { port } => {
            let mut server_config = config.server.clone();
            if let Some(port) = port {
                server_config.port = port;
            }
            let engine = Arc::new(open_engine(config).await?);
            display::print_integrity(&engine.integrity_report());

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl+C, shutting down");
                    shutdown.cancel();
                }
            });

            AdvisorServer::new(engine, cancel)
                .with_config(server_config)
                .run()
                .await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_advisor::graph::GraphPolicy;

    #[test]
    fn test_prerequisite_listing_formats_closure() {
        let graph = PrerequisiteGraph::from_catalog(&sample_catalog(), GraphPolicy::default());
        let (direct, all) = prerequisite_listing(&graph, &CourseCode::new("CS", 25200)).unwrap();

        assert_eq!(direct.len(), 2);
        assert!(all.contains(&"CS 18000".to_string()));
        assert!(all.contains(&"MA 16100".to_string()));
        assert!(!all.contains(&"CS 25200".to_string()));
    }

    #[test]
    fn test_prerequisite_listing_unknown_course() {
        let graph = PrerequisiteGraph::from_catalog(&sample_catalog(), GraphPolicy::default());
        let err = prerequisite_listing(&graph, &CourseCode::new("CS", 99900)).unwrap_err();
        assert_eq!(err, GraphError::NotFound(CourseCode::new("CS", 99900)));
    }
}
