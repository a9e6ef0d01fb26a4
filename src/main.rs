// region:    --- Imports
use crate::bidding::consumer::BidEventConsumer;
use crate::database::DatabaseManager;
use axum::{routing::get, Router};
use message_broker::{KafkaManager, AUCTION_EVENTS_TOPIC, BID_DEAD_LETTER_TOPIC, BID_EVENTS_TOPIC};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auction;
mod bidding;
mod database;
mod handlers;
mod message_broker;
mod query;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new().await);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 매니저 생성 및 초기화
    let kafka_manager = Arc::new(KafkaManager::new());
    if let Err(e) = kafka_manager.initialize().await {
        error!("{:<12} --> Kafka 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> Kafka 초기화 성공", "Main");

    // 토픽 생성 (경매 id를 키로 쓰므로 파티션 내 순서는 경매 단위로 유지된다)
    kafka_manager.create_topic(AUCTION_EVENTS_TOPIC, 5, 1).await?;
    kafka_manager.create_topic(BID_EVENTS_TOPIC, 5, 1).await?;
    kafka_manager.create_topic(BID_DEAD_LETTER_TOPIC, 1, 1).await?;

    // 입찰 이벤트 소비 시작
    let bid_consumer = BidEventConsumer::new(
        db_manager.get_pool(),
        kafka_manager.get_consumer(),
        kafka_manager.get_producer(),
    );
    tokio::spawn(async move {
        bid_consumer.start().await;
    });

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = Router::new()
        .route(
            "/api/auctions",
            get(handlers::handle_get_auctions).post(handlers::handle_create_auction),
        )
        .route(
            "/api/auctions/:id",
            get(handlers::handle_get_auction)
                .put(handlers::handle_update_auction)
                .delete(handlers::handle_delete_auction),
        )
        .layer(cors)
        .with_state((db_manager, kafka_manager.get_producer()));

    // 리스너 생성(로컬 호스트의 3000번 포트를 사용)
    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
