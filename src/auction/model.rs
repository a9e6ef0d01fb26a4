use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Auction {
    pub id: i64,
    #[sqlx(flatten)]
    pub item: Item,
    pub seller: String,
    pub current_highest_bid: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// 매물(차량) 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Item {
    pub make: String,
    pub model: String,
    pub color: String,
    pub mileage: i32,
    pub year: i32,
}

/// 경매 생성 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAuctionCommand {
    pub make: String,
    pub model: String,
    pub color: String,
    pub mileage: i32,
    pub year: i32,
}

impl CreateAuctionCommand {
    /// 입력 검증
    pub fn validate(&self) -> Result<(), String> {
        if self.make.trim().is_empty() {
            return Err("제조사(make)는 비어 있을 수 없습니다.".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("모델(model)은 비어 있을 수 없습니다.".to_string());
        }
        if self.color.trim().is_empty() {
            return Err("색상(color)은 비어 있을 수 없습니다.".to_string());
        }
        if self.mileage < 0 {
            return Err("주행거리(mileage)는 0 이상이어야 합니다.".to_string());
        }
        if self.year <= 0 {
            return Err("연식(year)은 0보다 커야 합니다.".to_string());
        }
        Ok(())
    }
}

/// 경매 수정 패치
/// 지정되지 않은 필드는 기존 값을 유지한다
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UpdateAuctionPatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub mileage: Option<i32>,
    pub year: Option<i32>,
}

impl UpdateAuctionPatch {
    /// 입력 검증
    pub fn validate(&self) -> Result<(), String> {
        if let Some(make) = &self.make {
            if make.trim().is_empty() {
                return Err("제조사(make)는 비어 있을 수 없습니다.".to_string());
            }
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err("모델(model)은 비어 있을 수 없습니다.".to_string());
            }
        }
        if let Some(color) = &self.color {
            if color.trim().is_empty() {
                return Err("색상(color)은 비어 있을 수 없습니다.".to_string());
            }
        }
        if let Some(mileage) = self.mileage {
            if mileage < 0 {
                return Err("주행거리(mileage)는 0 이상이어야 합니다.".to_string());
            }
        }
        if let Some(year) = self.year {
            if year <= 0 {
                return Err("연식(year)은 0보다 커야 합니다.".to_string());
            }
        }
        Ok(())
    }

    /// 패치 적용: 지정된 필드만 교체
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(make) = &self.make {
            item.make = make.clone();
        }
        if let Some(model) = &self.model {
            item.model = model.clone();
        }
        if let Some(color) = &self.color {
            item.color = color.clone();
        }
        if let Some(mileage) = self.mileage {
            item.mileage = mileage;
        }
        if let Some(year) = self.year {
            item.year = year;
        }
    }
}
