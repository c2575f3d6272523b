use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

use chainrun_core::domain::{JobRunId, JobSpec, TaskSpec};
use chainrun_core::impls::{HeadTracker, JsonFileStore};
use chainrun_core::ports::{Head, SystemClock};
use chainrun_core::{JobRunner, RunnerBuilder, RunnerConfig};

/// Run a sleep -> ethbool job through the chainrun execution core.
///
/// Runs left unfinished in the data directory by an earlier invocation are
/// resumed on startup.
#[derive(Parser, Debug)]
#[command(name = "chainrun", version)]
struct Args {
    /// Number of concurrent workers
    #[arg(long, env = "CHAINRUN_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Run requests buffered before producers block
    #[arg(long, env = "CHAINRUN_QUEUE_CAPACITY", default_value_t = 1000)]
    queue_capacity: usize,

    /// Directory holding one JSON file per run
    #[arg(long, env = "CHAINRUN_DATA_DIR", default_value = "./chainrun-data")]
    data_dir: PathBuf,

    /// How long the sleep step waits
    #[arg(long, env = "CHAINRUN_SLEEP_SECS", default_value_t = 2)]
    sleep_secs: u64,

    /// JSON value fed to the first step
    #[arg(long, default_value = "true")]
    input: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    tracing::info!(data_dir = %args.data_dir.display(), workers = args.workers, "chainrun starting");

    // (A) Store と Runner を用意
    let store = Arc::new(JsonFileStore::open(&args.data_dir).await?);
    let runner = RunnerBuilder::new()
        .config(RunnerConfig {
            worker_count: args.workers,
            queue_capacity: args.queue_capacity,
        })
        .store(store)
        .clock(Arc::new(SystemClock))
        .expect_adapters(&["sleep", "ethbool"])
        .build()?;

    // (B) ワーカー起動 + 前回の残りを再開
    let resumed = runner.start().await?;
    println!("resumed {resumed} run(s) from {}", args.data_dir.display());

    // (C) チェーン接続（ここでは固定のヘッドで代用）
    let tracker = HeadTracker::new();
    tracker.attach(runner.connection_resumer()).await;
    tracker.connect(Some(Head::new(1, "0x01"))).await;

    // (D) ジョブ投入
    let input: serde_json::Value = serde_json::from_str(&args.input)?;
    let until = chrono::Utc::now() + chrono::Duration::seconds(args.sleep_secs as i64);
    let spec = JobSpec::new(vec![
        TaskSpec::new("sleep", serde_json::json!({ "until": until })),
        TaskSpec::bare("ethbool"),
    ]);
    let id = runner.create_run(&spec, input).await?;
    println!("created run: {id}");

    // (E) 終了をポーリングで待つ（Ctrl-C で中断、run は次回起動時に再開）
    tokio::select! {
        result = wait_until_finished(&runner, id) => result?,
        _ = tokio::signal::ctrl_c() => println!("interrupted, {id} will resume on next start"),
    }

    runner.shutdown().await;
    Ok(())
}

async fn wait_until_finished(
    runner: &JobRunner,
    id: JobRunId,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let run = runner.load_run(id).await?;
        if run.is_terminal() {
            let output = run.last_output();
            println!(
                "final status: {:?} result={} error={:?}",
                run.status,
                output.map(|o| o.result().to_string()).unwrap_or_default(),
                output.and_then(|o| o.error.as_deref()),
            );
            return Ok(());
        }
        sleep(Duration::from_millis(100)).await;
    }
}
