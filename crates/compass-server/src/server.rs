use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use compass_core::analysis::AnalysisProvider;
use compass_engine::cache::{MemoryCache, ProfileCache};
use compass_engine::gamification::ProfilePayload;
use compass_engine::{GamificationService, RitualService, WantsService};
use compass_store::Database;

use crate::error::ApiError;
use crate::identity::Owner;
use crate::{rituals, wants};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub generation_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            generation_timeout_secs: 90,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub wants: Arc<WantsService>,
    pub rituals: Arc<RitualService>,
    pub gamification: Arc<GamificationService>,
}

impl AppState {
    pub fn new(
        db: Database,
        provider: Arc<dyn AnalysisProvider>,
        generation_timeout: Duration,
    ) -> Self {
        let cache: Arc<dyn ProfileCache> = Arc::new(MemoryCache::new());
        Self {
            wants: Arc::new(WantsService::new(db.clone())),
            rituals: Arc::new(RitualService::new(db.clone(), provider, generation_timeout)),
            gamification: Arc::new(GamificationService::new(db, cache)),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/profile", get(profile_handler))
        .route("/wants/draft", get(wants::get_draft))
        .route("/wants/stream/start", post(wants::stream_start))
        .route("/wants/stream/append", post(wants::stream_append))
        .route("/wants/stream/finish", post(wants::stream_finish))
        .route("/wants/future-self", put(wants::future_self_set))
        .route("/wants/future-self/append", post(wants::future_self_append))
        .route("/wants/future-self/finish", post(wants::future_self_finish))
        .route("/wants/reverse", patch(wants::reverse_update))
        .route("/wants/progress", get(wants::progress))
        .route("/wants/complete", post(wants::complete))
        .route("/wants/history", get(wants::history))
        .route("/wants/{id}", get(wants::by_id))
        .route("/rituals/today", get(rituals::today_status))
        .route("/rituals/entry", post(rituals::entry))
        .route("/rituals/weekly/analyze", post(rituals::weekly_analyze))
        .route("/rituals/weekly/plan-suggestion", get(rituals::plan_suggestion))
        .route("/rituals/weekly/commit", post(rituals::weekly_commit))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(
    config: ServerConfig,
    db: Database,
    provider: Arc<dyn AnalysisProvider>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(
        db,
        provider,
        Duration::from_secs(config.generation_timeout_secs),
    );
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Compass server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the accept loop alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn profile_handler(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<ProfilePayload>, ApiError> {
    Ok(Json(state.gamification.profile_payload(&user)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::analysis::WeeklyAnalysis;
    use compass_llm::mock::{MockProvider, MockResponse};

    fn analysis() -> WeeklyAnalysis {
        WeeklyAnalysis {
            summary: "a decent week".into(),
            score: 7,
            feedback: serde_json::json!({}),
            questions_for_reflection: vec!["what next?".into()],
        }
    }

    async fn spawn(responses: Vec<MockResponse>) -> ServerHandle {
        let db = Database::in_memory().unwrap();
        let provider = Arc::new(MockProvider::new(responses));
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        start(config, db, provider).await.unwrap()
    }

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let handle = spawn(vec![]).await;
        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let handle = spawn(vec![]).await;
        let url = format!("http://127.0.0.1:{}/wants/draft", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 401);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn wants_draft_and_stream_flow() {
        let handle = spawn(vec![]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);
        let client = client();

        let draft: serde_json::Value = client
            .get(format!("{base}/wants/draft"))
            .header("x-user-id", "user_1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(draft["status"], "draft");
        assert_eq!(draft["stream_timer_seconds"], 600);

        let resp: serde_json::Value = client
            .post(format!("{base}/wants/stream/append"))
            .header("x-user-id", "user_1")
            .json(&serde_json::json!({"text": "travel more"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["stream_completed"], false);
        assert_eq!(resp["record"]["stream_text"], "travel more");

        let resp: serde_json::Value = client
            .post(format!("{base}/wants/stream/append"))
            .header("x-user-id", "user_1")
            .json(&serde_json::json!({"text": "stop"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["stream_completed"], true);
        assert_eq!(resp["record"]["stream_text"], "travel more");
    }

    #[tokio::test]
    async fn incomplete_wants_cannot_complete() {
        let handle = spawn(vec![]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);

        let resp = client()
            .post(format!("{base}/wants/complete"))
            .header("x-user-id", "user_1")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "WANTS_NOT_READY");
        let missing = body["fields"]["missing"].as_array().unwrap();
        assert_eq!(missing.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_ritual_entry_conflicts() {
        let handle = spawn(vec![]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);
        let client = client();
        let entry = serde_json::json!({
            "slot": "morning",
            "answers": {"gratitude": "coffee"},
            "mood_score": 8,
        });

        let resp = client
            .post(format!("{base}/rituals/entry"))
            .header("x-user-id", "user_1")
            .json(&entry)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["gamification_event"]["xp_gained"], 15);

        let resp = client
            .post(format!("{base}/rituals/entry"))
            .header("x-user-id", "user_1")
            .json(&entry)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "RITUALS_ALREADY_COMPLETED");
    }

    #[tokio::test]
    async fn invalid_mood_score_rejected() {
        let handle = spawn(vec![]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);

        let resp = client()
            .post(format!("{base}/rituals/entry"))
            .header("x-user-id", "user_1")
            .json(&serde_json::json!({
                "slot": "evening",
                "answers": {},
                "mood_score": 11,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn today_status_reports_slots() {
        let handle = spawn(vec![]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);
        let client = client();

        client
            .post(format!("{base}/rituals/entry"))
            .header("x-user-id", "user_1")
            .json(&serde_json::json!({"slot": "morning", "answers": {}}))
            .send()
            .await
            .unwrap();

        let body: serde_json::Value = client
            .get(format!("{base}/rituals/today"))
            .header("x-user-id", "user_1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["morning_done"], true);
        assert_eq!(body["evening_done"], false);
        assert!(body["interception"].is_null());
    }

    #[tokio::test]
    async fn weekly_analyze_returns_review_and_award() {
        let handle = spawn(vec![MockResponse::Analysis(analysis())]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);

        let resp = client()
            .post(format!("{base}/rituals/weekly/analyze"))
            .header("x-user-id", "user_1")
            .json(&serde_json::json!({"reflection": "good rhythm this week"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "in_progress");
        assert_eq!(body["ai_analysis"]["summary"], "a decent week");
        assert_eq!(body["gamification_event"]["xp_gained"], 50);
    }

    #[tokio::test]
    async fn weekly_analyze_provider_failure_maps_to_bad_gateway() {
        let handle = spawn(vec![MockResponse::Error(
            compass_core::GenerationError::InvalidResponse("garbage".into()),
        )])
        .await;
        let base = format!("http://127.0.0.1:{}", handle.port);

        let resp = client()
            .post(format!("{base}/rituals/weekly/analyze"))
            .header("x-user-id", "user_1")
            .json(&serde_json::json!({"reflection": "hm"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "GENERATION_FAILED");
    }

    #[tokio::test]
    async fn commit_with_unknown_steps_is_not_found() {
        let handle = spawn(vec![]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);

        let resp = client()
            .post(format!("{base}/rituals/weekly/commit"))
            .header("x-user-id", "user_1")
            .json(&serde_json::json!({"step_ids": ["step_missing"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn profile_payload_served() {
        let handle = spawn(vec![]).await;
        let base = format!("http://127.0.0.1:{}", handle.port);

        let body: serde_json::Value = client()
            .get(format!("{base}/profile"))
            .header("x-user-id", "user_1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["level"], 1);
        assert_eq!(body["xp"], 0);
        assert_eq!(body["level_title"], "Novice");
    }
}
