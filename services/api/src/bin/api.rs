//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiChatAdapter, OpenAiSttAdapter, OpenAiTtsAdapter},
    config::Config,
    error::ApiError,
    services::{ConversationService, EvaluationService, WorksheetService},
    web::{
        close_conversation_handler, create_worksheet_handler, evaluate_answer_handler,
        get_transcript_handler, get_worksheet_handler, list_conversations_handler,
        list_lessons_handler, preview_worksheet_handler, rest::ApiDoc,
        start_conversation_handler, state::AppState, submit_message_handler, ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, types::audio::SpeechModel, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use lingua_core::ports::{
    ChatCompletionService, DatabaseService, SpeechToTextService, TextToSpeechService,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let chat_adapter: Arc<dyn ChatCompletionService> = Arc::new(OpenAiChatAdapter::new(
        openai_client.clone(),
        config.chat_model.clone(),
    ));
    let stt_adapter: Arc<dyn SpeechToTextService> = Arc::new(OpenAiSttAdapter::new(
        openai_client.clone(),
        config.stt_model.clone(),
    ));

    let tts_model = match config.tts_model.as_str() {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    };
    let tts_adapter: Arc<dyn TextToSpeechService> =
        Arc::new(OpenAiTtsAdapter::new(openai_client, tts_model));

    // --- 4. Build the Application Services & Shared AppState ---
    let db: Arc<dyn DatabaseService> = db_adapter;
    let app_state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        stt_adapter,
        tts_adapter,
        conversations: ConversationService::new(db.clone(), chat_adapter.clone()),
        worksheets: WorksheetService::new(db.clone(), chat_adapter.clone()),
        evaluations: EvaluationService::new(db, chat_adapter),
    });

    // --- 5. Configure CORS ---
    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route("/api/conversations", post(start_conversation_handler))
        .route("/api/conversations/{conversation_id}", get(get_transcript_handler))
        .route(
            "/api/conversations/{conversation_id}/message",
            post(submit_message_handler),
        )
        .route(
            "/api/conversations/{conversation_id}/close",
            post(close_conversation_handler),
        )
        .route("/api/conversations/{conversation_id}/ws", get(ws_handler))
        .route("/api/worksheets", post(create_worksheet_handler))
        .route("/api/worksheets/preview", post(preview_worksheet_handler))
        .route("/api/worksheets/evaluate", post(evaluate_answer_handler))
        .route("/api/worksheets/{lesson_id}", get(get_worksheet_handler))
        .route("/api/lessons", get(list_lessons_handler))
        .route("/api/lessons/conversations", get(list_conversations_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
