// region:    --- Imports
use super::queries;
use crate::auction::model::Auction;
use crate::database::DatabaseManager;
use chrono::{DateTime, Utc};
use sqlx::Error as SqlxError;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 경매 조회
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Auction>, SqlxError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 경매 목록 조회
/// since가 주어지면 그 이후에 수정된 경매만 반환한다
pub async fn get_all_auctions(
    db_manager: &DatabaseManager,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<Auction>, SqlxError> {
    info!("{:<12} --> 경매 목록 조회 since: {:?}", "Query", since);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                match since {
                    Some(since) => {
                        sqlx::query_as::<_, Auction>(queries::GET_AUCTIONS_UPDATED_SINCE)
                            .bind(since)
                            .fetch_all(&mut **tx)
                            .await
                    }
                    None => {
                        sqlx::query_as::<_, Auction>(queries::GET_ALL_AUCTIONS)
                            .fetch_all(&mut **tx)
                            .await
                    }
                }
            })
        })
        .await
}

// endregion: --- Query Handlers
