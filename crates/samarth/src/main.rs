use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use futures_util::future::join_all;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use samarth::config::Settings;
use samarth::data::source_from_settings;
use samarth::{ask, build_executor};

/// Answer agriculture and rainfall questions
#[derive(Debug, Parser)]
#[command(name = "samarth", version)]
struct Cli {
    /// Questions to answer; they run concurrently
    #[arg(required = true)]
    questions: Vec<String>,

    /// Per-question timeout in seconds
    #[arg(long, env = "SAMARTH_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Directory with agriculture.json and rainfall.json
    #[arg(long, env = "SAMARTH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Print the topics each question travelled through
    #[arg(long)]
    history: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let mut settings = Settings::new()?;
    if let Some(secs) = cli.timeout_secs {
        settings.pipeline.timeout_secs = secs;
    }
    if cli.data_dir.is_some() {
        settings.data.dir = cli.data_dir.clone();
    }

    tracing::info!(
        questions = cli.questions.len(),
        timeout_secs = settings.pipeline.timeout_secs,
        data_dir = ?settings.data.dir,
        "samarth starting"
    );

    let executor = build_executor(&settings, source_from_settings(&settings.data))?;

    let answers = join_all(cli.questions.iter().map(|q| ask(&executor, q))).await;

    let mut failed = 0;
    for (question, answer) in cli.questions.iter().zip(answers) {
        let output = match answer {
            Ok(answer) => json!({ "question": question, "response": answer }),
            Err(e) => {
                failed += 1;
                tracing::error!(question = %question, error = %e, "question failed");
                json!({ "question": question, "error": e.to_string() })
            }
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    if cli.history {
        for event in executor.bus().history() {
            println!(
                "{:>4} {} {:<18} {}",
                event.cursor,
                event.time.format("%H:%M:%S%.3f"),
                event.topic,
                event.correlation_id().map(|id| id.to_string()).unwrap_or_default()
            );
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} question(s) failed", cli.questions.len());
    }
    Ok(())
}
