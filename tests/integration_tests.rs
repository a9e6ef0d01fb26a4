use car_auction_service::database::DatabaseManager;
use car_auction_service::message_broker::{KafkaProducer, BID_EVENTS_TOPIC};
use car_auction_service::query;
use reqwest::Client;
use serde_json::json;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const BASE_URL: &str = "http://localhost:3000";

/// 트레이싱 초기화
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("트레이싱 구독자 설정 실패");
}

/// 데이터베이스 매니저 설정
async fn setup() -> Arc<DatabaseManager> {
    Arc::new(DatabaseManager::new().await)
}

/// 테스트용 Kafka 프로듀서 생성
fn setup_producer() -> KafkaProducer {
    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    KafkaProducer::new(&brokers)
}

/// 테스트용 경매 생성 (API 경유)
async fn create_test_auction(client: &Client, seller: &str) -> Value {
    let auction_data = json!({
        "make": "Hyundai",
        "model": "Ioniq 5",
        "color": "White",
        "mileage": 12000,
        "year": 2023
    });

    let response = client
        .post(format!("{}/api/auctions", BASE_URL))
        .header("x-username", seller)
        .json(&auction_data)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    response.json().await.expect("Failed to parse response")
}

/// 입찰 이벤트 발행
async fn publish_bid(producer: &KafkaProducer, auction_id: i64, amount: i64, status: &str) {
    let bid_data = json!({
        "auction_id": auction_id.to_string(),
        "amount": amount,
        "bid_status": status,
        "bidder": "test-bidder",
        "bid_time": chrono::Utc::now()
    });

    producer
        .send_message(
            BID_EVENTS_TOPIC,
            &auction_id.to_string(),
            &bid_data.to_string(),
        )
        .await
        .expect("입찰 이벤트 발행 실패");
}

/// 경매 생성 테스트
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_create_auction() {
    let client = Client::new();

    let created = create_test_auction(&client, "seller-1").await;

    assert_eq!(created["seller"], "seller-1");
    assert_eq!(created["item"]["make"], "Hyundai");
    assert_eq!(created["item"]["model"], "Ioniq 5");
    // 최고 입찰가는 없음으로 시작
    assert!(created["current_highest_bid"].is_null());

    // 조회로 재확인
    let fetched: Value = client
        .get(format!("{}/api/auctions/{}", BASE_URL, created["id"]))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(fetched["id"], created["id"]);
}

/// 부분 수정 테스트: 지정하지 않은 필드는 유지
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_partial_update_keeps_unspecified_fields() {
    let client = Client::new();

    let created = create_test_auction(&client, "seller-1").await;

    // 색상만 수정
    let response = client
        .put(format!("{}/api/auctions/{}", BASE_URL, created["id"]))
        .header("x-username", "seller-1")
        .json(&json!({ "color": "Black" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let updated: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(updated["item"]["color"], "Black");
    // 나머지 필드는 그대로
    assert_eq!(updated["item"]["make"], "Hyundai");
    assert_eq!(updated["item"]["model"], "Ioniq 5");
    assert_eq!(updated["item"]["mileage"], 12000);
    assert_eq!(updated["item"]["year"], 2023);
}

/// 판매자가 아닌 사용자의 수정 거부 테스트
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_update_by_non_seller_is_forbidden() {
    let client = Client::new();

    let created = create_test_auction(&client, "seller-1").await;

    let response = client
        .put(format!("{}/api/auctions/{}", BASE_URL, created["id"]))
        .header("x-username", "intruder")
        .json(&json!({ "color": "Black" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

/// 없는 경매 삭제 테스트
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_delete_missing_auction_is_not_found() {
    let client = Client::new();

    let response = client
        .delete(format!("{}/api/auctions/{}", BASE_URL, i64::MAX))
        .header("x-username", "seller-1")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

/// 입찰 이벤트 프로젝션 테스트
/// 낙찰 입찰의 최대값만 반영되는지 확인한다
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_bid_event_projection() {
    // 테스트 시작 시 tracing 초기화
    init_tracing();

    let db_manager = setup().await;
    let client = Client::new();
    let producer = setup_producer();

    let created = create_test_auction(&client, "seller-1").await;
    let auction_id = created["id"].as_i64().expect("id 없음");

    // 낙찰 500 -> 반영
    publish_bid(&producer, auction_id, 500, "Accepted").await;
    // 낙찰 400 -> 더 낮으므로 무시
    publish_bid(&producer, auction_id, 400, "Accepted").await;
    // 거절 700 -> 낙찰 상태가 아니므로 무시
    publish_bid(&producer, auction_id, 700, "Rejected").await;
    // 낙찰 700 -> 반영
    publish_bid(&producer, auction_id, 700, "Accepted").await;

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(2000)).await;

    let auction = query::handlers::get_auction(&db_manager, auction_id)
        .await
        .unwrap()
        .expect("경매가 존재해야 합니다");
    assert_eq!(auction.current_highest_bid, Some(700));
    info!("최종 최고 입찰가: {:?}", auction.current_highest_bid);
}

/// 중복 전달 테스트: 같은 이벤트를 다시 받아도 상태가 변하지 않는다
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_duplicate_bid_events_are_idempotent() {
    let db_manager = setup().await;
    let client = Client::new();
    let producer = setup_producer();

    let created = create_test_auction(&client, "seller-1").await;
    let auction_id = created["id"].as_i64().expect("id 없음");

    publish_bid(&producer, auction_id, 500, "Accepted").await;
    publish_bid(&producer, auction_id, 500, "Accepted").await;
    publish_bid(&producer, auction_id, 500, "Accepted").await;

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(2000)).await;

    let auction = query::handlers::get_auction(&db_manager, auction_id)
        .await
        .unwrap()
        .expect("경매가 존재해야 합니다");
    assert_eq!(auction.current_highest_bid, Some(500));
}

/// 삭제된 경매에 대한 입찰 이벤트 테스트
/// 오류도 부활도 없이 무시되어야 한다
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_bids_for_deleted_auction_are_ignored() {
    let client = Client::new();
    let producer = setup_producer();

    let created = create_test_auction(&client, "seller-1").await;
    let auction_id = created["id"].as_i64().expect("id 없음");

    // 경매 삭제
    let response = client
        .delete(format!("{}/api/auctions/{}", BASE_URL, auction_id))
        .header("x-username", "seller-1")
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // 삭제 후 도착하는(in-flight) 입찰 이벤트
    publish_bid(&producer, auction_id, 900, "Accepted").await;

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(2000)).await;

    // 경매는 여전히 없어야 한다
    let response = client
        .get(format!("{}/api/auctions/{}", BASE_URL, auction_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

/// poison 메시지 테스트: 역직렬화 불가능한 입찰 이벤트는 데드레터로 이동하고
/// 이후의 정상 이벤트 처리를 막지 않는다
#[tokio::test]
#[ignore = "실행 중인 서비스와 로컬 Postgres/Kafka가 필요합니다"]
async fn test_poison_message_does_not_block_consumer() {
    let db_manager = setup().await;
    let client = Client::new();
    let producer = setup_producer();

    let created = create_test_auction(&client, "seller-1").await;
    let auction_id = created["id"].as_i64().expect("id 없음");

    // 역직렬화 불가능한 페이로드
    producer
        .send_message(BID_EVENTS_TOPIC, "poison", "{ not json")
        .await
        .expect("메시지 전송 실패");

    // 뒤이어 정상 이벤트
    publish_bid(&producer, auction_id, 500, "Accepted").await;

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(2000)).await;

    let auction = query::handlers::get_auction(&db_manager, auction_id)
        .await
        .unwrap()
        .expect("경매가 존재해야 합니다");
    assert_eq!(auction.current_highest_bid, Some(500));
}
