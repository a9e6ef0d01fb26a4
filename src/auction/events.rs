use crate::auction::model::Auction;
use serde::{Deserialize, Serialize};

/// 경매 수명주기 이벤트 (발행 전용)
/// 한 번 발행된 이벤트는 회수할 수 없다
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 경매 생성 이벤트 (전체 스냅샷)
    AuctionCreated { auction: Auction },
    // 경매 수정 이벤트 (수정 후 스냅샷)
    AuctionUpdated { auction: Auction },
    // 경매 삭제 이벤트 (id만 전달)
    AuctionDeleted { id: i64 },
}

impl AuctionEvent {
    /// 이벤트 타입 이름
    pub fn event_type(&self) -> &'static str {
        match self {
            AuctionEvent::AuctionCreated { .. } => "AuctionCreated",
            AuctionEvent::AuctionUpdated { .. } => "AuctionUpdated",
            AuctionEvent::AuctionDeleted { .. } => "AuctionDeleted",
        }
    }

    /// 파티션 키: 같은 경매의 이벤트는 같은 파티션으로 보낸다
    pub fn partition_key(&self) -> String {
        match self {
            AuctionEvent::AuctionCreated { auction } => auction.id.to_string(),
            AuctionEvent::AuctionUpdated { auction } => auction.id.to_string(),
            AuctionEvent::AuctionDeleted { id } => id.to_string(),
        }
    }
}
