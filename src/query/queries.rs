/// 경매 조회
pub const GET_AUCTION: &str =
    "SELECT id, make, model, color, mileage, year, seller, current_highest_bid, created_at, updated_at FROM auctions WHERE id = $1";

/// 모든 경매 조회 (제조사 순 정렬)
pub const GET_ALL_AUCTIONS: &str =
    "SELECT id, make, model, color, mileage, year, seller, current_highest_bid, created_at, updated_at FROM auctions ORDER BY make";

/// 특정 시각 이후 수정된 경매 조회 (다운스트림 동기화용 변경 피드)
pub const GET_AUCTIONS_UPDATED_SINCE: &str = r#"
    SELECT id, make, model, color, mileage, year, seller, current_highest_bid, created_at, updated_at
    FROM auctions
    WHERE updated_at > $1
    ORDER BY make
"#;
