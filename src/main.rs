//! CLI for redrive
//!
//! Subcommands:
//! - `run`: start the retry pipeline over an in-memory broker and feed it
//!   `key:payload` lines from stdin
//! - `dead-letters`: print the archived dead letters as JSON lines

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use redrive::broker::Broker;
use redrive::broker::message::Message;
use redrive::config::{Settings, load_config};
use redrive::persistence::DeadLetterArchive;
use redrive::pipeline::{
    BrokerPublisher, KeywordFailProcessor, Pipeline, Publisher, build_registry, publish_supervisor,
};
use redrive::utils::logging;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use uuid::Uuid;

/// How long `run` waits for in-flight retries to settle after stdin closes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "redrive")]
enum Command {
    /// Run the pipeline, publishing each stdin line (`key:payload` or `payload`)
    Run,
    /// List archived dead letters
    DeadLetters,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    logging::init(&settings.logging.level);

    let result = match cmd {
        Command::Run => run_pipeline(settings).await,
        Command::DeadLetters => list_dead_letters(&settings),
    };

    if let Err(e) = result {
        error!("redrive failed: {}", e);
        std::process::exit(1);
    }
}

fn open_archive(settings: &Settings) -> Result<DeadLetterArchive, Box<dyn std::error::Error>> {
    Ok(DeadLetterArchive::open(
        &settings.archive.path,
        Some(settings.archive.ttl_secs),
        Some(settings.archive.max_entries),
    )?)
}

async fn run_pipeline(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let broker = Arc::new(Mutex::new(Broker::new()));
    let archive = open_archive(&settings)?;

    let (tracker, supervisor) = publish_supervisor();
    let publish_stats = supervisor.stats();
    let supervisor_task = tokio::spawn(supervisor.run());

    let registry = build_registry(
        &settings,
        &broker,
        Arc::new(KeywordFailProcessor::default()),
        tracker,
        Some(archive.clone()),
    );
    let pipeline = Pipeline::start(
        broker.clone(),
        registry,
        settings.consumer.poll_interval(),
    );
    let producer = BrokerPublisher::new(broker.clone());

    info!(
        topic = %settings.topics.primary,
        dead_letter = %settings.topics.dead_letter,
        "pipeline running; reading messages from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interrupted = loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => produce(&producer, &settings.topics.primary, &line).await,
                None => break false,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting gracefully.");
                break true;
            }
        }
    };

    if !interrupted && !wait_until_drained(&broker, &settings, DRAIN_TIMEOUT).await {
        warn!("pipeline did not drain within {:?}", DRAIN_TIMEOUT);
    }

    let listeners = pipeline.shutdown().await;
    if let Err(e) = supervisor_task.await {
        error!("publish supervisor ended abnormally: {}", e);
    }
    archive.flush()?;

    for listener in &listeners {
        let stats = listener.stats();
        info!(
            topic = %listener.topic,
            group = %listener.group,
            processed = stats.processed,
            requeued = stats.requeued,
            dead_lettered = stats.dead_lettered,
            ack_failures = stats.ack_failures,
            "listener stats"
        );
    }
    info!(
        confirmed = publish_stats.confirmed(),
        failed = publish_stats.failed(),
        "publish stats"
    );

    Ok(())
}

async fn produce(producer: &BrokerPublisher, topic: &str, line: &str) {
    let (key, payload) = match line.split_once(':') {
        Some((key, payload)) => (key.trim().to_string(), payload.trim().to_string()),
        None => (Uuid::new_v4().to_string(), line.trim().to_string()),
    };

    match producer.send(topic, Message::new(key.clone(), payload)).await {
        Ok(offset) => info!(key = %key, topic, offset, "sent message"),
        Err(e) => error!(key = %key, "failed to send message: {}", e),
    }
}

/// Waits until both listeners have acknowledged everything in their topics.
async fn wait_until_drained(
    broker: &Arc<Mutex<Broker>>,
    settings: &Settings,
    timeout: Duration,
) -> bool {
    let drained = || -> bool {
        let Ok(broker) = broker.lock() else {
            return true;
        };
        let caught_up = |topic: &str, group: &str| {
            broker.committed_offset(topic, group) >= broker.topic_len(topic)
        };
        caught_up(&settings.topics.primary, &settings.consumer.group_id)
            && caught_up(&settings.topics.dead_letter, &settings.archive.group_id)
    };

    let deadline = tokio::time::Instant::now() + timeout;
    // republishes land asynchronously, so require two quiet checks in a row
    let mut quiet = 0;
    while tokio::time::Instant::now() < deadline {
        if drained() {
            quiet += 1;
            if quiet >= 2 {
                return true;
            }
        } else {
            quiet = 0;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

fn list_dead_letters(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let archive = open_archive(settings)?;
    let entries = archive.load(&settings.topics.dead_letter)?;

    for entry in &entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    info!(count = entries.len(), "dead letters listed");
    Ok(())
}
