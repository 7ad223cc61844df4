use crate::config::KafkaConfig;
use crate::jobs::{dispatch, Job, JobQueue, JobRunner};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{stream_consumer::StreamConsumer, Consumer};
use rdkafka::Message;
use std::sync::Arc;

pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, anyhow::Error> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &config.group_id)
            .set("bootstrap.servers", &config.brokers)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(KafkaConsumer { consumer })
    }

    /// Feeds every job on the topic to the runner, one task per job.
    pub fn start(self, runner: Arc<JobRunner>, queue: Arc<dyn JobQueue>) {
        tokio::spawn(async move {
            loop {
                match self.consumer.recv().await {
                    Ok(message) => {
                        let Some(payload) = message.payload() else {
                            log::error!("Received empty job message");
                            continue;
                        };
                        match serde_json::from_slice::<Job>(payload) {
                            Ok(job) => {
                                let runner = Arc::clone(&runner);
                                let queue = Arc::clone(&queue);
                                tokio::spawn(async move {
                                    let follow_ups = runner.execute(&job).await;
                                    dispatch(queue.as_ref(), follow_ups).await;
                                });
                            }
                            Err(e) => log::error!("Failed to parse job payload: {:?}", e),
                        }
                    }
                    Err(e) => {
                        log::error!("Error receiving job message: {:?}", e);
                        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
}
