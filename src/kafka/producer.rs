use crate::config::KafkaConfig;
use crate::jobs::{Job, JobQueue};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{BaseProducer, BaseRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Publishes jobs to the jobs topic, keyed so one subject's jobs stay ordered.
/// A [`super::KafkaConsumer`] feeds them to the runner.
#[derive(Clone)]
pub struct KafkaJobQueue {
    producer: Arc<Mutex<BaseProducer>>,
    topic: String,
}

impl KafkaJobQueue {
    pub fn new(config: &KafkaConfig) -> Result<Self, anyhow::Error> {
        let producer: BaseProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()?;

        Ok(KafkaJobQueue {
            producer: Arc::new(Mutex::new(producer)),
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl JobQueue for KafkaJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), anyhow::Error> {
        let payload = serde_json::to_vec(&job)?;
        let key = job.key();
        let producer = self.producer.lock().await;

        let record = BaseRecord::to(self.topic.as_str())
            .key(key.as_str())
            .payload(payload.as_slice());
        if let Err((e, _)) = producer.send(record) {
            log::error!("Failed to publish {} job {}: {:?}", job.name(), key, e);
            return Err(anyhow::anyhow!("Kafka send error: {:?}", e));
        }
        // Serve delivery callbacks without blocking the request
        producer.poll(Duration::from_millis(0));
        log::debug!("Published {} job {} to {}", job.name(), key, self.topic);
        Ok(())
    }
}
