/// 경매 관련 커맨드 처리
/// 1. 경매 생성
/// 2. 경매 수정
/// 3. 경매 삭제
/// 저장소 커밋이 완료된 뒤에만 수명주기 이벤트를 발행한다
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::{Auction, CreateAuctionCommand, UpdateAuctionPatch};
use crate::database::DatabaseManager;
use crate::message_broker::{EventPublisher, AUCTION_EVENTS_TOPIC};
use chrono::Utc;
use sqlx::Row;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Command Error

/// 커맨드 처리 오류 분류
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// 대상 경매가 존재하지 않음
    NotFound,
    /// 요청자가 판매자가 아님
    Forbidden,
    /// 입력 값 오류
    Validation(String),
    /// 저장소 오류
    Database(String),
    /// 저장은 커밋되었으나 이벤트 발행이 재시도 한도 내에 완료되지 않음
    /// 호출자가 후속 조치를 할 수 있도록 반드시 표면화한다
    Publication(String),
}

impl From<sqlx::Error> for CommandError {
    fn from(e: sqlx::Error) -> Self {
        CommandError::Database(e.to_string())
    }
}

// endregion: --- Command Error

// region:    --- Publish Retry

// 발행 재시도 한도
const MAX_PUBLISH_RETRIES: u32 = 3;
// 재시도 간격
const PUBLISH_RETRY_DELAY_MS: u64 = 200;

/// 수명주기 이벤트 발행 (제한된 재시도)
async fn publish_with_retry(
    publisher: &impl EventPublisher,
    event: &AuctionEvent,
) -> Result<(), String> {
    let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
    let key = event.partition_key();

    let mut attempt = 1;
    loop {
        match publisher.publish(AUCTION_EVENTS_TOPIC, &key, &payload).await {
            Ok(()) => {
                if attempt > 1 {
                    info!(
                        "{:<12} --> {} 이벤트 재시도 후 발행 성공 (시도: {})",
                        "Command",
                        event.event_type(),
                        attempt
                    );
                }
                return Ok(());
            }
            Err(e) if attempt < MAX_PUBLISH_RETRIES => {
                warn!(
                    "{:<12} --> {} 이벤트 발행 실패, 재시도 (시도: {}/{}): {}",
                    "Command",
                    event.event_type(),
                    attempt,
                    MAX_PUBLISH_RETRIES,
                    e
                );
                sleep(Duration::from_millis(PUBLISH_RETRY_DELAY_MS)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 커밋 이후의 이벤트 발행
/// 실패하더라도 저장소 쓰기는 이미 완료된 상태이므로
/// 조용히 삼키지 않고 Publication 오류로 보고한다
async fn publish_after_commit(
    publisher: &impl EventPublisher,
    event: AuctionEvent,
) -> Result<(), CommandError> {
    if let Err(e) = publish_with_retry(publisher, &event).await {
        error!(
            "{:<12} --> 저장은 커밋되었으나 {} 이벤트 발행 실패 (key: {}): {}",
            "Command",
            event.event_type(),
            event.partition_key(),
            e
        );
        return Err(CommandError::Publication(format!(
            "{} 이벤트 발행 실패 (경매 id: {}): {}",
            event.event_type(),
            event.partition_key(),
            e
        )));
    }
    Ok(())
}

// endregion: --- Publish Retry

// region:    --- Commands

/// 1. 경매 생성
pub async fn handle_create_auction(
    cmd: CreateAuctionCommand,
    seller: &str,
    db_manager: &DatabaseManager,
    publisher: &impl EventPublisher,
) -> Result<Auction, CommandError> {
    info!("{:<12} --> 경매 생성 처리 시작: {:?}", "Command", cmd);
    cmd.validate().map_err(CommandError::Validation)?;

    let seller = seller.to_string();
    let now = Utc::now();

    // 경매 저장 (최고 입찰가는 없음으로 시작)
    let auction = db_manager
        .transaction::<_, Auction, CommandError>(|tx| {
            Box::pin(async move {
                let auction = sqlx::query_as::<_, Auction>(
                    "INSERT INTO auctions (make, model, color, mileage, year, seller, current_highest_bid, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, NULL, $7, $7)
                     RETURNING *",
                )
                .bind(&cmd.make)
                .bind(&cmd.model)
                .bind(&cmd.color)
                .bind(cmd.mileage)
                .bind(cmd.year)
                .bind(&seller)
                .bind(now)
                .fetch_one(&mut **tx)
                .await?;
                Ok(auction)
            })
        })
        .await?;

    info!("{:<12} --> 경매 생성 완료 id: {}", "Command", auction.id);

    // 커밋 이후에 생성 이벤트 발행
    publish_after_commit(
        publisher,
        AuctionEvent::AuctionCreated {
            auction: auction.clone(),
        },
    )
    .await?;

    Ok(auction)
}

/// 2. 경매 수정
/// 판매자 본인만 수정할 수 있고, 지정된 필드만 교체된다
pub async fn handle_update_auction(
    auction_id: i64,
    caller: &str,
    patch: UpdateAuctionPatch,
    db_manager: &DatabaseManager,
    publisher: &impl EventPublisher,
) -> Result<Auction, CommandError> {
    info!(
        "{:<12} --> 경매 수정 처리 시작 id: {}, patch: {:?}",
        "Command", auction_id, patch
    );
    patch.validate().map_err(CommandError::Validation)?;

    let caller = caller.to_string();

    let auction = db_manager
        .transaction::<_, Auction, CommandError>(|tx| {
            Box::pin(async move {
                // 행 잠금으로 같은 경매에 대한 동시 갱신을 직렬화
                let existing = sqlx::query_as::<_, Auction>(
                    "SELECT * FROM auctions WHERE id = $1 FOR UPDATE",
                )
                .bind(auction_id)
                .fetch_optional(&mut **tx)
                .await?;

                let mut auction = existing.ok_or(CommandError::NotFound)?;

                if auction.seller != caller {
                    return Err(CommandError::Forbidden);
                }

                patch.apply_to(&mut auction.item);
                auction.updated_at = Utc::now();

                sqlx::query(
                    "UPDATE auctions
                     SET make = $1, model = $2, color = $3, mileage = $4, year = $5, updated_at = $6
                     WHERE id = $7",
                )
                .bind(&auction.item.make)
                .bind(&auction.item.model)
                .bind(&auction.item.color)
                .bind(auction.item.mileage)
                .bind(auction.item.year)
                .bind(auction.updated_at)
                .bind(auction.id)
                .execute(&mut **tx)
                .await?;

                Ok(auction)
            })
        })
        .await?;

    info!("{:<12} --> 경매 수정 완료 id: {}", "Command", auction.id);

    // 커밋 이후에 수정 이벤트 발행 (수정 후 스냅샷)
    publish_after_commit(
        publisher,
        AuctionEvent::AuctionUpdated {
            auction: auction.clone(),
        },
    )
    .await?;

    Ok(auction)
}

/// 3. 경매 삭제
/// 삭제 이후 도착하는 입찰 이벤트는 소비자에서 무시된다
pub async fn handle_delete_auction(
    auction_id: i64,
    caller: &str,
    db_manager: &DatabaseManager,
    publisher: &impl EventPublisher,
) -> Result<(), CommandError> {
    info!("{:<12} --> 경매 삭제 처리 시작 id: {}", "Command", auction_id);

    let caller = caller.to_string();

    db_manager
        .transaction::<_, (), CommandError>(|tx| {
            Box::pin(async move {
                let row = sqlx::query("SELECT seller FROM auctions WHERE id = $1 FOR UPDATE")
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                let row = row.ok_or(CommandError::NotFound)?;
                let seller: String = row.get("seller");

                if seller != caller {
                    return Err(CommandError::Forbidden);
                }

                sqlx::query("DELETE FROM auctions WHERE id = $1")
                    .bind(auction_id)
                    .execute(&mut **tx)
                    .await?;

                Ok(())
            })
        })
        .await?;

    info!("{:<12} --> 경매 삭제 완료 id: {}", "Command", auction_id);

    // 커밋 이후에 삭제 이벤트 발행 (id만 전달)
    publish_after_commit(publisher, AuctionEvent::AuctionDeleted { id: auction_id }).await?;

    Ok(())
}

// endregion: --- Commands

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::model::Item;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// 지정한 횟수만큼 실패한 뒤 성공하는 발행자
    struct FlakyPublisher {
        failures_left: AtomicU32,
        attempts: AtomicU32,
        published: Mutex<Vec<(String, String, String)>>,
    }

    impl FlakyPublisher {
        fn failing(times: u32) -> Self {
            FlakyPublisher {
                failures_left: AtomicU32::new(times),
                attempts: AtomicU32::new(0),
                published: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EventPublisher for FlakyPublisher {
        async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), String> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err("일시적 전송 오류".to_string());
            }
            self.published.lock().unwrap().push((
                topic.to_string(),
                key.to_string(),
                payload.to_string(),
            ));
            Ok(())
        }
    }

    fn sample_event() -> AuctionEvent {
        AuctionEvent::AuctionCreated {
            auction: Auction {
                id: 7,
                item: Item {
                    make: "Kia".to_string(),
                    model: "EV6".to_string(),
                    color: "Blue".to_string(),
                    mileage: 100,
                    year: 2024,
                },
                seller: "seller-1".to_string(),
                current_highest_bid: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn publish_succeeds_after_one_transient_failure() {
        let publisher = FlakyPublisher::failing(1);

        let result = publish_with_retry(&publisher, &sample_event()).await;

        assert!(result.is_ok());
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 2);
        // 구독자 입장에서는 정확히 한 번의 발행
        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, AUCTION_EVENTS_TOPIC);
        assert_eq!(published[0].1, "7");
    }

    #[tokio::test]
    async fn publish_surfaces_error_when_budget_exhausted() {
        let publisher = FlakyPublisher::failing(MAX_PUBLISH_RETRIES);

        let result = publish_after_commit(&publisher, sample_event()).await;

        assert!(matches!(result, Err(CommandError::Publication(_))));
        assert_eq!(
            publisher.attempts.load(Ordering::SeqCst),
            MAX_PUBLISH_RETRIES
        );
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[test]
    fn deleted_event_carries_only_id() {
        let event = AuctionEvent::AuctionDeleted { id: 42 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({ "AuctionDeleted": { "id": 42 } }));
        assert_eq!(event.partition_key(), "42");
    }
}
