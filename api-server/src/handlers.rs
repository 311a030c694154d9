use std::time::Instant;

use actix_web::{
    http::StatusCode,
    web::{Data, Json, Path, Query},
    HttpRequest, HttpResponse, Responder,
};
use chrono::Utc;

use crate::auth::{caller_from_request, Caller};
use crate::config::AppState;
use crate::response::{json_error_with_code, ApiError};
use crate::session;
use crate::types::{
    EndSessionRequest, HealthResponse, LeaderboardQuery, StartSessionRequest,
    UpdateProgressRequest,
};

/// Resolves the caller and charges the request against their rate limits.
fn admit(state: &AppState, req: &HttpRequest) -> Result<Caller, ApiError> {
    let caller = caller_from_request(req, state.api_key())?;
    state.limits.check(&caller, Instant::now())?;
    Ok(caller)
}

pub(crate) async fn health(state: Data<AppState>) -> impl Responder {
    let active_sessions = match state.store.count_active_sessions() {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("health check failed: {e}");
            return json_error_with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                "game store error",
                Some("internal"),
            );
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        service: "catch-api",
        active_sessions,
        catalog_items: state.catalog.len(),
        user_rate_limit: state.policy.user_rate_limit,
        ip_rate_limit: state.policy.ip_rate_limit,
        rate_limit_window_secs: state.policy.rate_limit_window_secs,
        session_idle_timeout_secs: state.policy.session_idle_timeout_secs,
        max_leaderboard_page: state.policy.max_leaderboard_page,
        http_workers: state.http_workers,
        auth_required: state.api_key.is_some(),
    })
}

pub(crate) async fn start_session(
    state: Data<AppState>,
    req: HttpRequest,
    body: Json<StartSessionRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = admit(&state, &req)?;
    let response = session::start_session(&state, &caller, body.into_inner(), Utc::now())?;
    Ok(HttpResponse::Created().json(response))
}

pub(crate) async fn update_progress(
    state: Data<AppState>,
    req: HttpRequest,
    path: Path<String>,
    body: Json<UpdateProgressRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = admit(&state, &req)?;
    let session_id = path.into_inner();
    let response = session::update_progress(
        &state,
        &caller,
        &session_id,
        body.into_inner(),
        Utc::now().timestamp_millis(),
    )?;
    Ok(HttpResponse::Ok().json(response))
}

pub(crate) async fn end_session(
    state: Data<AppState>,
    req: HttpRequest,
    path: Path<String>,
    body: Json<EndSessionRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = admit(&state, &req)?;
    let session_id = path.into_inner();
    let response =
        session::end_session(&state, &caller, &session_id, body.into_inner(), Utc::now())?;
    Ok(HttpResponse::Ok().json(response))
}

pub(crate) async fn get_leaderboard(
    state: Data<AppState>,
    req: HttpRequest,
    path: Path<String>,
    query: Query<LeaderboardQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = admit(&state, &req)?;
    let scope = path.into_inner();
    let response = session::get_leaderboard(&state, &caller, &scope, &query, Utc::now())?;
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::USER_ID_HEADER;
    use crate::config::ServerPolicy;
    use crate::store::GameStore;
    use actix_web::{test as awtest, web, App};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn test_state(policy: ServerPolicy, api_key: Option<&str>) -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = GameStore::open(dir.path()).unwrap();
        (
            AppState::new(store, policy, api_key.map(str::to_string)),
            dir,
        )
    }

    macro_rules! app {
        ($state:expr) => {
            awtest::init_service(
                App::new()
                    .app_data(Data::new($state.clone()))
                    .route("/health", web::get().to(health))
                    .route("/api/sessions", web::post().to(start_session))
                    .route(
                        "/api/sessions/{session_id}/progress",
                        web::post().to(update_progress),
                    )
                    .route(
                        "/api/sessions/{session_id}/end",
                        web::post().to(end_session),
                    )
                    .route(
                        "/api/leaderboards/{scope}",
                        web::get().to(get_leaderboard),
                    ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn health_reports_limits() {
        let (state, _dir) = test_state(ServerPolicy::default(), Some("secret"));
        let app = app!(state);

        let req = awtest::TestRequest::get().uri("/health").to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["active_sessions"], 0);
        assert_eq!(body["max_leaderboard_page"], 100);
        assert_eq!(body["auth_required"], true);
        assert!(body.get("http_workers").is_none());
    }

    #[actix_web::test]
    async fn requests_without_identity_are_unauthenticated() {
        let (state, _dir) = test_state(ServerPolicy::default(), None);
        let app = app!(state);

        let req = awtest::TestRequest::post()
            .uri("/api/sessions")
            .set_json(json!({ "platform": "ios" }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["success"], Value::Bool(false));
        assert_eq!(body["error_code"], "unauthenticated");
    }

    #[actix_web::test]
    async fn wrong_api_key_is_rejected() {
        let (state, _dir) = test_state(ServerPolicy::default(), Some("secret"));
        let app = app!(state);

        let req = awtest::TestRequest::post()
            .uri("/api/sessions")
            .insert_header((USER_ID_HEADER, "alice"))
            .insert_header(("x-api-key", "guess"))
            .set_json(json!({ "platform": "ios" }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn session_round_trip_over_http() {
        let (state, _dir) = test_state(ServerPolicy::default(), None);
        let app = app!(state);

        let req = awtest::TestRequest::post()
            .uri("/api/sessions")
            .insert_header((USER_ID_HEADER, "alice"))
            .set_json(json!({ "platform": "web", "country": "fr" }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert!(body["config"]["spawn_rates"].as_array().is_some_and(|rates| !rates.is_empty()));
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let req = awtest::TestRequest::post()
            .uri(&format!("/api/sessions/{session_id}/progress"))
            .insert_header((USER_ID_HEADER, "bob"))
            .set_json(json!({
                "checkpoint": {
                    "timestamp_ms": Utc::now().timestamp_millis(),
                    "score": 0, "coins": 0, "gems": 0, "level": 1
                }
            }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = awtest::TestRequest::post()
            .uri(&format!("/api/sessions/{session_id}/end"))
            .insert_header((USER_ID_HEADER, "alice"))
            .set_json(json!({ "final_score": 0 }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["rewards"]["coins"], 0);

        let req = awtest::TestRequest::post()
            .uri(&format!("/api/sessions/{session_id}/end"))
            .insert_header((USER_ID_HEADER, "alice"))
            .set_json(json!({ "final_score": 0 }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["error_code"], "failed-precondition");
    }

    #[actix_web::test]
    async fn unknown_session_is_not_found() {
        let (state, _dir) = test_state(ServerPolicy::default(), None);
        let app = app!(state);

        let req = awtest::TestRequest::post()
            .uri("/api/sessions/nope/end")
            .insert_header((USER_ID_HEADER, "alice"))
            .set_json(json!({ "final_score": 10 }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn leaderboard_page_is_clamped() {
        let (state, _dir) = test_state(ServerPolicy::default(), None);
        let app = app!(state);

        let req = awtest::TestRequest::get()
            .uri("/api/leaderboards/weekly?limit=5000")
            .insert_header((USER_ID_HEADER, "alice"))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["scope"], "weekly");
        assert_eq!(body["total_players"], 0);
        assert_eq!(body["user_rank"], Value::Null);

        let req = awtest::TestRequest::get()
            .uri("/api/leaderboards/galactic")
            .insert_header((USER_ID_HEADER, "alice"))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn rate_limit_returns_429() {
        let policy = ServerPolicy {
            user_rate_limit: 2,
            ..ServerPolicy::default()
        };
        let (state, _dir) = test_state(policy, None);
        let app = app!(state);

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let req = awtest::TestRequest::get()
                .uri("/api/leaderboards/daily")
                .insert_header((USER_ID_HEADER, "alice"))
                .to_request();
            statuses.push(awtest::call_service(&app, req).await.status());
        }
        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }
}
