use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 입찰 서비스가 발행하는 입찰 이벤트 (수신 전용)
/// auction_id는 문자열 형태로 전달된다
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BidPlaced {
    pub auction_id: String,
    pub amount: i64,
    pub bid_status: String,
    pub bidder: String,
    pub bid_time: DateTime<Utc>,
}

impl BidPlaced {
    /// 경매 id 파싱 (실패 시 poison 메시지로 처리)
    pub fn parse_auction_id(&self) -> Result<i64, String> {
        self.auction_id
            .parse::<i64>()
            .map_err(|e| format!("경매 id 파싱 실패: {} ({})", self.auction_id, e))
    }

    /// 낙찰 여부: 상태 문자열에 "Accepted"가 포함되어야 한다
    pub fn is_accepted(&self) -> bool {
        self.bid_status.contains("Accepted")
    }

    /// 최고 입찰가 갱신 조건
    /// 낙찰된 입찰이면서 현재 최고가가 없거나 현재 최고가보다 높은 경우에만 갱신
    /// 중복/역순 수신에도 같은 결과가 나오도록 최대값 비교로만 판단한다
    pub fn beats(&self, current_highest_bid: Option<i64>) -> bool {
        self.is_accepted()
            && match current_highest_bid {
                None => true,
                Some(current) => self.amount > current,
            }
    }
}
