//! `talentmatch`: index resumes and jobs, and query them, from the shell.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use talentmatch_documents::{JobRecord, ResumeRecord, StructuredRecord, analyze_resume};
use talentmatch_retrieval::{EngineConfig, RetrievalEngine};

#[derive(Debug, Parser)]
#[command(
    name = "talentmatch",
    version,
    about = "Semantic matching between resumes and job postings"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE", env = "TALENTMATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the vector collections (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Index a resume record read from a JSON file.
    IndexResume {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Index a job record read from a JSON file.
    IndexJob {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Index a record tagged with `"kind": "resume" | "job"`.
    Index {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Find resumes matching a free-text query.
    SearchResumes {
        query: String,

        /// Number of matches to return
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },

    /// Find jobs matching a candidate profile or free-text query.
    MatchJobs {
        query: String,

        /// Number of matches to return
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },

    /// Report word count, contact details and sections of a plain-text resume.
    Analyze {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Show collection sizes and the embedding setup.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn open_engine(config_path: Option<&Path>, root: Option<&Path>) -> Result<RetrievalEngine> {
    let mut config = match config_path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(root) = root {
        config.root = root.to_path_buf();
    }
    debug!("Using collection root {}", config.root.display());

    RetrievalEngine::open(config)
        .await
        .context("opening retrieval engine")
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path).await?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Records indexed without a timestamp are stamped with the current time.
fn stamp(record: &mut StructuredRecord) {
    match record {
        StructuredRecord::Resume(resume) => {
            resume.uploaded_at.get_or_insert_with(Utc::now);
        }
        StructuredRecord::Job(job) => {
            job.posted_at.get_or_insert_with(Utc::now);
        }
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let Cli {
        config,
        root,
        command,
    } = cli;
    let engine = || open_engine(config.as_deref(), root.as_deref());

    let output = match command {
        Command::IndexResume { path } => {
            let mut resume: ResumeRecord = read_json(&path).await?;
            resume.uploaded_at.get_or_insert_with(Utc::now);
            engine().await?.index_resume(&resume).await?;
            info!("Indexed resume {}", resume.filename);
            json!({ "indexed": "resume", "filename": resume.filename })
        }
        Command::IndexJob { path } => {
            let mut job: JobRecord = read_json(&path).await?;
            job.posted_at.get_or_insert_with(Utc::now);
            engine().await?.index_job(&job).await?;
            info!("Indexed job {} at {}", job.title, job.company);
            json!({ "indexed": "job", "title": job.title, "company": job.company })
        }
        Command::Index { path } => {
            let text = read_text(&path).await?;
            let mut record = StructuredRecord::from_json(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            stamp(&mut record);
            engine().await?.index_record(&record).await?;
            json!({ "indexed": record.kind().as_str() })
        }
        Command::SearchResumes { query, k } => {
            serde_json::to_value(engine().await?.search_resumes(&query, k).await?)?
        }
        Command::MatchJobs { query, k } => {
            serde_json::to_value(engine().await?.match_jobs(&query, k).await?)?
        }
        Command::Analyze { path } => {
            serde_json::to_value(analyze_resume(&read_text(&path).await?))?
        }
        Command::Stats => serde_json::to_value(engine().await?.stats().await)?,
    };
    Ok(output)
}
