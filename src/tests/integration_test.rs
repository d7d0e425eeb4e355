use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use crate::broker::Broker;
use crate::broker::message::Message;
use crate::config::Settings;
use crate::persistence::DeadLetterArchive;
use crate::pipeline::codec::{self, RETRY_HEADER};
use crate::pipeline::{
    KeywordFailProcessor, Pipeline, PublishStats, StatsSnapshot, build_registry,
    publish_supervisor,
};

struct Harness {
    settings: Settings,
    broker: Arc<Mutex<Broker>>,
    archive: DeadLetterArchive,
    pipeline: Pipeline,
    publish_stats: Arc<PublishStats>,
    supervisor: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl Harness {
    fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.archive.path = dir.path().to_str().unwrap().to_string();
        settings.consumer.concurrency = 2;

        let broker = Arc::new(Mutex::new(Broker::new()));
        let archive = DeadLetterArchive::open(&settings.archive.path, None, None).unwrap();
        let (tracker, supervisor) = publish_supervisor();
        let publish_stats = supervisor.stats();
        let supervisor = tokio::spawn(supervisor.run());

        let registry = build_registry(
            &settings,
            &broker,
            Arc::new(KeywordFailProcessor::default()),
            tracker,
            Some(archive.clone()),
        );
        let pipeline = Pipeline::start(broker.clone(), registry, Duration::from_millis(10));

        Self {
            settings,
            broker,
            archive,
            pipeline,
            publish_stats,
            supervisor,
            _dir: dir,
        }
    }

    fn send(&self, message: Message) {
        self.broker
            .lock()
            .unwrap()
            .publish(&self.settings.topics.primary, message);
    }

    fn primary(&self) -> Vec<Message> {
        let broker = self.broker.lock().unwrap();
        broker
            .records(&self.settings.topics.primary)
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    fn dead_letters(&self) -> Vec<Message> {
        let broker = self.broker.lock().unwrap();
        broker
            .records(&self.settings.topics.dead_letter)
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    fn primary_stats(&self) -> StatsSnapshot {
        self.pipeline
            .listener(
                &self.settings.topics.primary,
                &self.settings.consumer.group_id,
            )
            .unwrap()
            .stats()
    }

    /// Both topics fully acknowledged by their listeners.
    fn drained(&self) -> bool {
        let broker = self.broker.lock().unwrap();
        let topics = &self.settings.topics;
        broker.committed_offset(&topics.primary, &self.settings.consumer.group_id)
            == broker.topic_len(&topics.primary)
            && broker.committed_offset(&topics.dead_letter, &self.settings.archive.group_id)
                == broker.topic_len(&topics.dead_letter)
    }

    async fn wait_for(&self, condition: impl Fn(&Self) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition(self) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("pipeline did not reach the expected state");
    }

    async fn stop(self) -> Arc<PublishStats> {
        self.pipeline.shutdown().await;
        self.supervisor.await.unwrap();
        self.publish_stats
    }
}

#[tokio::test]
async fn scenario_a_success_is_acknowledged_without_sends() {
    let harness = Harness::start();

    harness.send(Message::new("a-1", "hello"));
    harness.wait_for(|h| h.primary_stats().processed == 1).await;
    harness.wait_for(Harness::drained).await;

    assert_eq!(harness.primary().len(), 1);
    assert!(harness.dead_letters().is_empty());
    assert_eq!(
        harness.primary_stats(),
        StatsSnapshot {
            processed: 1,
            ..StatsSnapshot::default()
        }
    );

    let publish_stats = harness.stop().await;
    assert_eq!(publish_stats.confirmed(), 0);
}

#[tokio::test]
async fn scenario_b_retries_three_times_then_dead_letters() {
    let harness = Harness::start();

    harness.send(Message::new("b-1", "please-fail"));
    harness
        .wait_for(|h| {
            let stats = h.primary_stats();
            stats.requeued == 3 && stats.dead_lettered == 1
        })
        .await;
    harness.wait_for(|h| h.dead_letters().len() == 1).await;
    harness.wait_for(Harness::drained).await;

    let chain = harness.primary();
    let counts: Vec<u32> = chain.iter().map(|m| codec::decode(&m.headers)).collect();
    assert_eq!(counts, vec![0, 1, 2, 3]);
    assert!(chain.iter().all(|m| m.key == "b-1" && m.payload == "please-fail"));
    assert!(chain[0].headers.last(RETRY_HEADER).is_none());

    let dead = harness.dead_letters();
    assert_eq!(dead[0].key, "b-1");
    assert_eq!(dead[0].payload, "please-fail");

    let stats = harness.primary_stats();
    assert_eq!(stats.requeued, 3);
    assert_eq!(stats.dead_lettered, 1);
    assert_eq!(stats.processed, 0);

    harness
        .wait_for(|h| h.archive.len(&h.settings.topics.dead_letter).unwrap() == 1)
        .await;
    let archived = harness
        .archive
        .load(&harness.settings.topics.dead_letter)
        .unwrap();
    assert_eq!(archived[0].key, "b-1");
    assert_eq!(archived[0].retry_count, 3);

    let publish_stats = harness.stop().await;
    assert_eq!(publish_stats.confirmed(), 4);
    assert_eq!(publish_stats.failed(), 0);
}

#[tokio::test]
async fn scenario_c_corrupted_count_restarts_budget() {
    let harness = Harness::start();

    harness.send(Message::new("c-1", "please-fail").with_header(RETRY_HEADER, "abc"));
    harness
        .wait_for(|h| h.primary_stats().dead_lettered == 1 && h.dead_letters().len() == 1)
        .await;
    harness.wait_for(Harness::drained).await;

    let chain = harness.primary();
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[1].headers.last(RETRY_HEADER), Some(&b"1"[..]));
    assert_eq!(codec::decode(&harness.dead_letters()[0].headers), 3);

    harness.stop().await;
}

#[tokio::test]
async fn mixed_traffic_keeps_chains_separate() {
    let harness = Harness::start();

    harness.send(Message::new("ok-1", "hello"));
    harness.send(Message::new("bad-1", "FAIL loudly"));
    harness.send(Message::new("ok-2", "world"));
    harness
        .send(Message::new("bad-2", "please-fail").with_header(RETRY_HEADER, "2"));

    harness
        .wait_for(|h| {
            let stats = h.primary_stats();
            stats.processed == 2 && stats.requeued == 4 && stats.dead_lettered == 2
        })
        .await;
    harness.wait_for(|h| h.dead_letters().len() == 2).await;
    harness.wait_for(Harness::drained).await;

    let mut dead: Vec<String> = harness.dead_letters().into_iter().map(|m| m.key).collect();
    dead.sort();
    assert_eq!(dead, vec!["bad-1", "bad-2"]);

    // per key, retry counts never decrease along the chain
    for key in ["bad-1", "bad-2"] {
        let counts: Vec<u32> = harness
            .primary()
            .iter()
            .filter(|m| m.key == key)
            .map(|m| codec::decode(&m.headers))
            .collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{key}: {counts:?}");
        assert_eq!(counts.last(), Some(&3));
    }

    let stats = harness.primary_stats();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.requeued, 3 + 1);
    assert_eq!(stats.dead_lettered, 2);

    harness.stop().await;
}
