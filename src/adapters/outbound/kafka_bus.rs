use crate::common::{DomainError, DomainResult};
use crate::config::KafkaConfig;
use crate::domains::ports::{BusMessage, DeliveryReceipt, MessageBus, QoS};
use crate::domains::topics::topic_matches;
use async_trait::async_trait;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const SUBSCRIPTION_BUFFER: usize = 256;

/// Kafka carrier for `robots/{id}/{channel}` traffic. Kafka topic names
/// cannot hold the slash-separated hierarchy, so the robot topic travels as
/// the record key: commands go to one commands topic, event envelopes to the
/// events topic, and telemetry is read from the telemetry topic.
pub struct KafkaMessageBus {
    producer: FutureProducer,
    config: KafkaConfig,
    connected: Arc<AtomicBool>,
}

impl KafkaMessageBus {
    pub fn new(config: KafkaConfig) -> Result<Self, String> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| format!("Failed to create Kafka producer: {}", e))?;

        Ok(Self {
            producer,
            config,
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Fetches cluster metadata to decide whether the brokers are reachable.
    pub async fn probe(&self) -> bool {
        let producer = self.producer.clone();
        let timeout = Duration::from_millis(self.config.message_timeout_ms);
        let reachable = tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(None, timeout).is_ok()
        })
        .await
        .unwrap_or(false);

        self.connected.store(reachable, Ordering::SeqCst);
        if reachable {
            tracing::info!("Kafka brokers reachable: {:?}", self.config.brokers);
        } else {
            tracing::warn!("Kafka brokers unreachable: {:?}", self.config.brokers);
        }
        reachable
    }

    /// Picks the Kafka topic from the last level of a robot topic or pattern.
    fn topic_for(&self, robot_topic: &str) -> &str {
        match robot_topic.rsplit('/').next().unwrap_or_default() {
            "events" => &self.config.topics.events,
            "location" | "status" | "battery" | "+" | "#" => &self.config.topics.telemetry,
            _ => &self.config.topics.commands,
        }
    }

    fn consumer(&self) -> DomainResult<StreamConsumer> {
        ClientConfig::new()
            .set("bootstrap.servers", self.config.brokers.join(","))
            .set("group.id", &self.config.group_id)
            .set("client.id", &self.config.client_id)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|e| DomainError::Transport(format!("Failed to create Kafka consumer: {}", e)))
    }
}

#[async_trait]
impl MessageBus for KafkaMessageBus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> DomainResult<DeliveryReceipt> {
        let kafka_topic = self.topic_for(topic);
        let level = qos.level().to_string();
        let headers = OwnedHeaders::new().insert(Header {
            key: "qos",
            value: Some(level.as_str()),
        });
        let record = FutureRecord::to(kafka_topic)
            .key(topic)
            .payload(&payload)
            .headers(headers);

        let timeout = Duration::from_millis(self.config.message_timeout_ms);
        match self.producer.send(record, timeout).await {
            Ok((partition, offset)) => {
                self.connected.store(true, Ordering::SeqCst);
                tracing::debug!("Delivered {} to {}[{}]@{}", topic, kafka_topic, partition, offset);
                Ok(DeliveryReceipt {
                    topic: topic.to_string(),
                    delivered_at: Utc::now(),
                    offset: Some(offset),
                })
            }
            Err((e, _)) => {
                tracing::error!("Kafka delivery of {} failed: {}", topic, e);
                Err(DomainError::Transport(format!("Kafka delivery failed: {}", e)))
            }
        }
    }

    async fn subscribe(&self, pattern: &str) -> DomainResult<mpsc::Receiver<BusMessage>> {
        let consumer = self.consumer()?;
        let source = self.topic_for(pattern).to_string();
        consumer
            .subscribe(&[source.as_str()])
            .map_err(|e| DomainError::Transport(format!("Failed to subscribe to {}: {}", source, e)))?;

        tracing::info!("Subscribed to {} on Kafka topic {}", pattern, source);
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let pattern = pattern.to_string();
        tokio::spawn(async move {
            loop {
                let forwarded = match consumer.recv().await {
                    Ok(message) => match message.key_view::<str>() {
                        Some(Ok(topic)) if topic_matches(&pattern, topic) => BusMessage {
                            topic: topic.to_string(),
                            payload: message.payload().unwrap_or_default().to_vec(),
                        },
                        _ => continue,
                    },
                    Err(e) => {
                        tracing::error!("Kafka receive on {} failed: {}", source, e);
                        continue;
                    }
                };
                if tx.send(forwarded).await.is_err() {
                    tracing::debug!("Subscriber for {} dropped", pattern);
                    break;
                }
            }
        });

        Ok(rx)
    }
}
