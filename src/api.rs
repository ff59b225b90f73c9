//! REST API server for the orchestrator

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::Goal;
use crate::orchestrator::Orchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunRequest {
    pub problem: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DelegateRequest {
    pub goal: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassifyRequest {
    pub task: String,
}

fn default_domain() -> String {
    "general".to_string()
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

fn blank(field: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(format!("'{}' must not be empty", field))),
    )
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Orchestration Endpoints
/// =============================

async fn run_handler(
    State(state): State<ApiState>,
    Json(req): Json<RunRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.problem.trim().is_empty() {
        return blank("problem");
    }
    let goal = Goal::new(req.problem, req.domain);
    info!(goal_id = %goal.goal_id, domain = %goal.domain, "Received run request");

    let summary = state.orchestrator.run(&goal).await;
    (StatusCode::OK, Json(ApiResponse::success(summary)))
}

async fn delegate_handler(
    State(state): State<ApiState>,
    Json(req): Json<DelegateRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.goal.trim().is_empty() {
        return blank("goal");
    }
    info!("Received delegate request");

    let summary = state.orchestrator.delegate_goal(&req.goal).await;
    (StatusCode::OK, Json(ApiResponse::success(summary)))
}

async fn classify_handler(
    State(state): State<ApiState>,
    Json(req): Json<ClassifyRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.task.trim().is_empty() {
        return blank("task");
    }

    let kind = state.orchestrator.classify(&req.task).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "task": req.task,
            "task_type": kind,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/v1/run", post(run_handler))
        .route("/api/v1/delegate", post(delegate_handler))
        .route("/api/v1/classify", post(classify_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::execution::ProcessSandbox;
    use crate::gateway::{ModelGateway, ScriptedBackend};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router(backend: ScriptedBackend) -> Router {
        let mut config = OrchestratorConfig::default();
        config.team.managers = 1;
        config.team.individuals = 1;
        config.team.refine_subtask_results = false;
        config.execution.enabled = false;

        let gateway = Arc::new(ModelGateway::new(Arc::new(backend), Duration::from_secs(5)));
        let runner = Arc::new(ProcessSandbox::from_config(&config.execution));
        create_router(Arc::new(Orchestrator::bootstrap(config, gateway, runner)))
    }

    async fn post_json(router: Router, uri: &str, body: serde_json::Value) -> (StatusCode, ApiResponse) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(ScriptedBackend::new(""))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_classify_endpoint() {
        let backend = ScriptedBackend::new(r#"{"task_type": "programmatic"}"#);
        let (status, body) = post_json(
            router(backend),
            "/api/v1/classify",
            serde_json::json!({"task": "List files"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.data.unwrap()["task_type"], "programmatic");
    }

    #[tokio::test]
    async fn test_delegate_endpoint_with_gateway_down() {
        let (status, body) = post_json(
            router(ScriptedBackend::new("").failing()),
            "/api/v1/delegate",
            serde_json::json!({"goal": "Write a plan"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert_eq!(data["overall_status"], "partially completed");
        assert_eq!(data["total_subtasks"], 3);
    }

    #[tokio::test]
    async fn test_run_endpoint_builds_goal() {
        let (status, body) = post_json(
            router(ScriptedBackend::new("").failing()),
            "/api/v1/run",
            serde_json::json!({"problem": "Rebalance the portfolio", "domain": "finance"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let run = &body.data.unwrap()["run"];
        assert_eq!(run["domain"], "finance");
        assert!(uuid::Uuid::parse_str(run["goal_id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_blank_problem_is_rejected() {
        let (status, body) = post_json(
            router(ScriptedBackend::new("")),
            "/api/v1/run",
            serde_json::json!({"problem": "  "}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
        assert!(body.error.unwrap().contains("problem"));
    }
}
