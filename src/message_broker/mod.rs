// region:    --- Imports
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Offset};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Topics

/// 경매 수명주기 이벤트 발행 토픽
pub const AUCTION_EVENTS_TOPIC: &str = "auctions";

/// 입찰 이벤트 수신 토픽
pub const BID_EVENTS_TOPIC: &str = "bids";

/// 처리 불가능한 입찰 이벤트를 보내는 데드레터 토픽
pub const BID_DEAD_LETTER_TOPIC: &str = "bids-dead-letter";

// endregion: --- Topics

// region:    --- Event Publisher Trait

/// 이벤트 발행 트레이트
/// 커맨드 핸들러는 이 트레이트를 통해서만 전송 계층에 접근한다
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), String>;
}

// endregion: --- Event Publisher Trait

// region:    --- Kafka Producer
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

/// KafkaProducer 구현
impl KafkaProducer {
    pub fn new(brokers: &str) -> Self {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .expect("Producer creation error");

        KafkaProducer {
            producer: Arc::new(producer),
        }
    }

    /// 메시지 전송
    /// key로 파티션이 정해지므로 같은 경매의 이벤트는 같은 파티션으로 간다
    pub async fn send_message(&self, topic: &str, key: &str, value: &str) -> Result<(), String> {
        info!(
            "{:<12} --> Kafka 메시지 전송: topic={}, key={}",
            "Producer", topic, key
        );
        let record = FutureRecord::to(topic).key(key).payload(value);

        self.producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(e, _)| format!("Error sending message: {:?}", e))?;

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for KafkaProducer {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), String> {
        self.send_message(topic, key, payload).await
    }
}

// endregion: --- Kafka Producer

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
}

/// KafkaConsumer 구현
impl KafkaConsumer {
    pub fn new(brokers: &str, group_id: &str) -> Self {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            // 처리 성공 후에만 오프셋을 커밋한다 (at-least-once)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("fetch.max.bytes", "5242880")
            .set("allow.auto.create.topics", "true")
            .create()
            .expect("Consumer creation failed");

        KafkaConsumer {
            consumer: Arc::new(consumer),
        }
    }

    /// 메시지 소비 루프
    /// 핸들러가 Ok를 반환한 메시지만 커밋하고,
    /// Err를 반환한 메시지는 커밋하지 않아 재전달된다
    pub async fn consume_messages<F, Fut>(
        &self,
        topic: &str,
        handler: F,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Fn(Vec<u8>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
    {
        info!(
            "{:<12} --> Kafka 메시지 소비 시작: topic={}",
            "Consumer", topic
        );
        self.consumer.subscribe(&[topic])?;

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    info!(
                        "{:<12} --> 메시지 수신: topic={}, partition={}, offset={}",
                        "Consumer",
                        message.topic(),
                        message.partition(),
                        message.offset()
                    );

                    if let Some(payload) = message.payload() {
                        match handler(payload.to_vec()).await {
                            Ok(()) => {
                                if let Err(e) =
                                    self.consumer.commit_message(&message, CommitMode::Async)
                                {
                                    warn!(
                                        "{:<12} --> 오프셋 커밋 실패 (재전달될 수 있음): {:?}",
                                        "Consumer", e
                                    );
                                }
                            }
                            // 일시적 오류: 커밋하지 않고 실패한 오프셋으로 되돌려
                            // 같은 메시지를 다시 받는다
                            Err(e) => {
                                error!(
                                    "{:<12} --> 메시지 처리 실패, 재전달 대기: {}",
                                    "Consumer", e
                                );
                                if let Err(seek_err) = self.consumer.seek(
                                    message.topic(),
                                    message.partition(),
                                    Offset::Offset(message.offset()),
                                    Duration::from_secs(5),
                                ) {
                                    error!(
                                        "{:<12} --> 오프셋 되돌리기 실패: {:?}",
                                        "Consumer", seek_err
                                    );
                                }
                                time::sleep(Duration::from_millis(500)).await;
                            }
                        }
                    } else {
                        // 빈 페이로드는 재처리할 내용이 없으므로 커밋한다
                        warn!("{:<12} --> 빈 페이로드 수신", "Consumer");
                        if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                            warn!("{:<12} --> 오프셋 커밋 실패: {:?}", "Consumer", e);
                        }
                    }
                }
                Err(e) => error!("{:<12} --> 메시지 수신 오류: {:?}", "Consumer", e),
            }
        }
    }
}

// endregion: --- Kafka Consumer

// region:    --- Kafka Manager
pub struct KafkaManager {
    producer: Arc<KafkaProducer>,
    consumer: Arc<KafkaConsumer>,
    brokers: String,
}

impl Default for KafkaManager {
    fn default() -> Self {
        Self::new()
    }
}

/// KafkaManager 구현
impl KafkaManager {
    pub fn new() -> Self {
        let brokers =
            std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let group_id = "bid-events-group".to_string();

        let producer = Arc::new(KafkaProducer::new(&brokers));
        let consumer = Arc::new(KafkaConsumer::new(&brokers, &group_id));

        KafkaManager {
            producer,
            consumer,
            brokers,
        }
    }

    /// 프로듀서 반환
    pub fn get_producer(&self) -> Arc<KafkaProducer> {
        Arc::clone(&self.producer)
    }

    /// 컨슈머 반환
    pub fn get_consumer(&self) -> Arc<KafkaConsumer> {
        Arc::clone(&self.consumer)
    }

    /// 초기화 메시지 전송
    pub async fn send_init_message(&self) -> Result<(), String> {
        info!("{:<12} --> Kafka 초기화 메시지 전송", "Manager");
        self.producer
            .send_message("init-topic", "init-key", "init-message")
            .await
    }

    /// Kafka 초기화
    /// 브로커와의 왕복이 가능한지 확인한 뒤에만 기동을 계속한다
    pub async fn initialize(&self) -> Result<(), String> {
        info!("{:<12} --> Kafka 초기화 시작", "Manager");

        // 초기화 토픽 구독
        self.consumer
            .consumer
            .subscribe(&["init-topic"])
            .map_err(|e| e.to_string())?;

        // 초기화 메시지 전송
        self.send_init_message().await?;

        // 초기화 메시지 수신 대기
        let mut attempts = 0;
        let max_attempts = 10;
        while attempts < max_attempts {
            match time::timeout(Duration::from_secs(1), self.consumer.consumer.recv()).await {
                Ok(Ok(message)) => {
                    if let Some(payload) = message.payload() {
                        if payload == b"init-message" {
                            info!("{:<12} --> Kafka 초기화 메시지 수신 확인", "Manager");
                            return Ok(());
                        }
                    }
                }
                Ok(Err(e)) => error!(
                    "{:<12} --> Kafka 초기화 메시지 수신 오류: {:?}",
                    "Manager", e
                ),
                Err(_) => {
                    attempts += 1;
                    warn!(
                        "{:<12} --> Kafka 초기화 메시지 수신 대기 중... (시도: {}/{})",
                        "Manager", attempts, max_attempts
                    );
                }
            }
        }

        Err("Kafka 초기화 메시지 수신 실패".to_string())
    }

    /// 토픽 생성
    pub async fn create_topic(
        &self,
        topic_name: &str,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<(), String> {
        info!("{:<12} --> Kafka 토픽 생성 시작: {}", "Manager", topic_name);

        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| format!("AdminClient 생성 실패: {:?}", e))?;

        let new_topic = NewTopic::new(
            topic_name,
            num_partitions,
            TopicReplication::Fixed(replication_factor),
        );

        match admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await
        {
            Ok(_) => {
                info!("{:<12} --> Kafka 토픽 생성 성공: {}", "Manager", topic_name);
                Ok(())
            }
            Err(e) => {
                error!("{:<12} --> Kafka 토픽 생성 실패: {:?}", "Manager", e);
                Err(format!("토픽 생성 실패: {:?}", e))
            }
        }
    }
}

// endregion: --- Kafka Manager
