use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::Parser;
use rand::Rng;
use rlquorum::{
    config::Config,
    future::{
        merging::{MergingResult, Source},
        settable::SettableResult,
        wait, AsyncResult,
    },
    telemetry::initialize_subscriber,
    test_utils::fault::{Fault, Kind},
};
use tracing::{event, Level};

#[derive(Debug, Parser)]
#[command(name = "quorum-read")]
#[command(about = "Simulates a quorum read over in-process replicas", long_about = None)]
struct Cli {
    #[arg(long)]
    config_path: PathBuf,
    /// Value returned by each replica, in replica order. An empty string means "no value"
    #[arg(long = "reply")]
    replies: Vec<String>,
    /// Index of a replica that fails instead of replying
    #[arg(long = "fail")]
    failing: Vec<usize>,
    #[arg(long, default_value = "50")]
    max_delay_ms: u64,
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

fn spawn_replica(
    index: usize,
    reply: Option<Bytes>,
    fault: Fault,
    max_delay: Duration,
) -> Source<Option<Bytes>> {
    let result = SettableResult::new();
    let handle = result.handle();
    let delay_ms = rand::thread_rng().gen_range(0..max_delay.as_millis().max(1) as u64);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        if fault.inject(&result, &format!("replica {}", index)) {
            event!(Level::INFO, "replica {} failed after {}ms", index, delay_ms);
        } else {
            event!(Level::INFO, "replica {} replied after {}ms", index, delay_ms);
            result.succeed(reply);
        }
    });

    Arc::new(handle)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    initialize_subscriber(args.json_logs);

    let config = Config::from_path(&args.config_path)
        .with_context(|| format!("unable to load {}", args.config_path.display()))?;
    if args.replies.len() != config.replicas {
        bail!(
            "expected {} replies (one per replica), got {}",
            config.replicas,
            args.replies.len()
        );
    }
    if let Some(index) = args.failing.iter().find(|i| **i >= config.replicas) {
        bail!("--fail {} is not a valid replica index", index);
    }

    let max_delay = Duration::from_millis(args.max_delay_ms);
    let sources = args
        .replies
        .into_iter()
        .enumerate()
        .map(|(index, reply)| {
            let reply = (!reply.is_empty()).then(|| Bytes::from(reply));
            let fault = if args.failing.contains(&index) {
                Fault::always(Kind::Fail)
            } else {
                Fault::default()
            };
            spawn_replica(index, reply, fault, max_delay)
        });

    let merged = MergingResult::builder()
        .merge_with(config.merger::<Bytes>()?)
        .add_all(sources)
        .build()?;

    match tokio::time::timeout(config.get_timeout(), wait(&merged)).await {
        Ok(Ok(Some(winner))) => println!("{}", String::from_utf8_lossy(&winner)),
        Ok(Ok(None)) => println!("no winner"),
        Ok(Err(err)) => bail!("quorum read failed: {}", err),
        Err(_) => {
            let all_cancelled = merged.cancel();
            event!(
                Level::WARN,
                "quorum read timed out after {:?} ({} of {} replicas replied, all cancelled: {})",
                config.get_timeout(),
                merged.completed(),
                merged.size(),
                all_cancelled
            );
            bail!("quorum read timed out");
        }
    }

    Ok(())
}
