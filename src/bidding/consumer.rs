// region:    --- Imports
use crate::bidding::events::BidPlaced;
use crate::message_broker::{
    KafkaConsumer, KafkaProducer, BID_DEAD_LETTER_TOPIC, BID_EVENTS_TOPIC,
};
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Bid Event Consumer

// 입찰 반영 트랜잭션 제한 시간
const APPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// 입찰 이벤트 소비자
/// 외부 입찰 서비스의 이벤트를 받아 경매의 최고 입찰가 프로젝션을 유지한다
/// 전달 보장은 at-least-once이고 순서 보장이 없으므로
/// 갱신 규칙은 중복/역순 수신에 대해 멱등이어야 한다
pub struct BidEventConsumer {
    pool: Arc<PgPool>,
    kafka_consumer: Arc<KafkaConsumer>,
    kafka_producer: Arc<KafkaProducer>,
}

/// 입찰 이벤트 소비자 메서드 구현
impl BidEventConsumer {
    /// 입찰 이벤트 소비자 생성
    pub fn new(
        pool: Arc<PgPool>,
        kafka_consumer: Arc<KafkaConsumer>,
        kafka_producer: Arc<KafkaProducer>,
    ) -> Self {
        BidEventConsumer {
            pool,
            kafka_consumer,
            kafka_producer,
        }
    }

    /// 입찰 이벤트 소비 시작
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        let producer = Arc::clone(&self.kafka_producer);
        if let Err(e) = self
            .kafka_consumer
            .consume_messages(BID_EVENTS_TOPIC, move |payload| {
                let pool = Arc::clone(&pool);
                let producer = Arc::clone(&producer);
                // Return a boxed future
                Box::pin(async move { Self::process_message(&pool, &producer, payload).await })
            })
            .await
        {
            error!("{:<12} --> 입찰 이벤트 소비 오류: {:?}", "BidConsume", e);
        }
    }

    /// 입찰 이벤트 한 건 처리
    /// Ok 반환 시 오프셋이 커밋되고, Err 반환 시 커밋 없이 재전달을 기다린다
    async fn process_message(
        pool: &PgPool,
        producer: &KafkaProducer,
        payload: Vec<u8>,
    ) -> Result<(), String> {
        info!("{:<12} --> 입찰(BidPlaced) 수신", "BidConsume");

        // 역직렬화 실패는 poison 메시지: 재시도해도 소용없으므로 데드레터로 보낸다
        let bid: BidPlaced = match serde_json::from_slice(&payload) {
            Ok(bid) => bid,
            Err(e) => {
                warn!(
                    "{:<12} --> poison 메시지: 역직렬화 실패: {:?}",
                    "BidConsume", e
                );
                return Self::dead_letter(producer, "unparsed", &payload).await;
            }
        };

        let auction_id = match bid.parse_auction_id() {
            Ok(id) => id,
            Err(e) => {
                warn!("{:<12} --> poison 메시지: {}", "BidConsume", e);
                return Self::dead_letter(producer, &bid.auction_id, &payload).await;
            }
        };

        // 일시적 저장소 오류와 시간 초과는 Err로 돌려보내 재전달되게 한다
        match tokio::time::timeout(APPLY_TIMEOUT, Self::apply_bid(pool, auction_id, &bid)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("입찰 반영 실패: {:?}", e)),
            Err(_) => Err("입찰 반영 트랜잭션 시간 초과".to_string()),
        }
    }

    /// 최고 입찰가 프로젝션 갱신
    /// 행 잠금으로 같은 경매에 대한 동시 갱신을 직렬화하고,
    /// 낙찰 입찰이면서 현재 최고가보다 높은 경우에만 반영한다
    async fn apply_bid(pool: &PgPool, auction_id: i64, bid: &BidPlaced) -> Result<(), sqlx::Error> {
        // 트랜잭션 시작
        let mut tx = pool.begin().await?;

        let row = sqlx::query("SELECT current_highest_bid FROM auctions WHERE id = $1 FOR UPDATE")
            .bind(auction_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            // 경매가 삭제되었거나 아직 보이지 않는 경우: 오류가 아니라 정상적인 무시
            tx.rollback().await?;
            info!(
                "{:<12} --> 입찰 무시: 대상 경매 없음 id: {}",
                "BidConsume", auction_id
            );
            return Ok(());
        };

        let current: Option<i64> = row.get("current_highest_bid");

        if bid.beats(current) {
            sqlx::query(
                "UPDATE auctions SET current_highest_bid = $1, updated_at = $2 WHERE id = $3",
            )
            .bind(bid.amount)
            .bind(Utc::now())
            .bind(auction_id)
            .execute(&mut *tx)
            .await?;

            // 트랜잭션 커밋
            tx.commit().await?;
            info!(
                "{:<12} --> 입찰 반영: 경매 {} 최고가 {:?} -> {}",
                "BidConsume", auction_id, current, bid.amount
            );
        } else if !bid.is_accepted() {
            // 롤백
            tx.rollback().await?;
            info!(
                "{:<12} --> 입찰 무시: 낙찰 상태 아님 (경매 {}, status: {})",
                "BidConsume", auction_id, bid.bid_status
            );
        } else {
            // 롤백
            tx.rollback().await?;
            info!(
                "{:<12} --> 입찰 무시: 현재 최고가보다 높지 않음 (경매 {}, {} <= {:?})",
                "BidConsume", auction_id, bid.amount, current
            );
        }

        Ok(())
    }

    /// poison 메시지를 데드레터 토픽으로 이동
    /// 전송에 성공해야 원본 메시지를 커밋한다
    async fn dead_letter(
        producer: &KafkaProducer,
        key: &str,
        payload: &[u8],
    ) -> Result<(), String> {
        producer
            .send_message(
                BID_DEAD_LETTER_TOPIC,
                key,
                &String::from_utf8_lossy(payload),
            )
            .await?;
        warn!(
            "{:<12} --> poison 메시지를 데드레터 토픽으로 이동 (key: {})",
            "BidConsume", key
        );
        Ok(())
    }
}
// endregion: --- Bid Event Consumer
