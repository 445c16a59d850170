// HTTP request handlers
use crate::application::history_service::HistoryState;
use crate::domain::integrity::validate;
use crate::domain::layout::{DashboardEvent, Panel};
use crate::domain::physics::SensorSample;
use crate::domain::preferences::{ChartTimeRange, PreferencesPatch};
use crate::infrastructure::event_stream::stream_from_broadcast;
use crate::infrastructure::http_response::{accepts_brotli, respond};
use crate::presentation::app_state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unprocessable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
        };
        tracing::debug!("Rejecting request ({}): {}", status, message);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult = Result<Response<Body>, ApiError>;

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_panel(raw: &str) -> Result<Panel, ApiError> {
    serde_json::from_value(Value::from(raw))
        .map_err(|_| ApiError::BadRequest(format!("unknown panel {raw}")))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub range: Option<String>,
}

#[derive(Serialize)]
struct HistoryResponse {
    range: ChartTimeRange,
    #[serde(flatten)]
    state: HistoryState,
}

#[derive(Deserialize, Default)]
struct PanelFailure {
    message: Option<String>,
}

#[derive(Deserialize)]
struct ValidateRequest {
    sample: Value,
    #[serde(default)]
    previous: Option<Value>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_dashboard(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    respond(StatusCode::OK, &state.dashboard.view(), accepts_brotli(&headers)).await
}

/// Dispatch a wire-form layout event; unknown types leave the state unchanged
pub async fn dispatch_event(headers: HeaderMap, State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let event: DashboardEvent = parse_body(&body)?;
    let machine = state.dashboard.dispatch(event);
    Ok(respond(StatusCode::OK, &machine, accepts_brotli(&headers)).await)
}

pub async fn fullscreen_panel(
    Path(panel): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let layout = state.dashboard.layout();
    let machine = match parse_panel(&panel)? {
        Panel::Live => layout.fullscreen_live(),
        Panel::Charts => layout.fullscreen_charts(),
        Panel::Preferences => layout.fullscreen_preferences(),
    };
    Ok(respond(StatusCode::OK, &machine, accepts_brotli(&headers)).await)
}

pub async fn reset_grid(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let machine = state.dashboard.layout().reset_grid();
    respond(StatusCode::OK, &machine, accepts_brotli(&headers)).await
}

pub async fn clear_error(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let machine = state.dashboard.layout().clear_error();
    respond(StatusCode::OK, &machine, accepts_brotli(&headers)).await
}

pub async fn report_panel_failure(
    Path(panel): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult {
    let panel = parse_panel(&panel)?;
    let failure: PanelFailure = if body.is_empty() {
        PanelFailure::default()
    } else {
        parse_body(&body)?
    };
    let message = failure
        .message
        .unwrap_or_else(|| "panel failed to render".to_string());

    state.dashboard.report_panel_failure(panel, message);
    Ok(respond(StatusCode::OK, &state.dashboard.view().panels, accepts_brotli(&headers)).await)
}

pub async fn retry_panel(
    Path(panel): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let health = state.dashboard.retry_panel(parse_panel(&panel)?);
    Ok(respond(StatusCode::OK, &health, accepts_brotli(&headers)).await)
}

pub async fn get_feed(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    respond(StatusCode::OK, &state.dashboard.feed_snapshot(), accepts_brotli(&headers)).await
}

pub async fn clear_feed(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.dashboard.feed().clear();
    respond(StatusCode::OK, &state.dashboard.feed_snapshot(), accepts_brotli(&headers)).await
}

/// Accepted live events as they arrive (progressive, length-prefixed chunks)
pub async fn stream_feed(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.dashboard.feed().subscribe();
    stream_from_broadcast(rx, accepts_brotli(&headers)).await
}

/// Current history, or a fresh load when `range` names a different window
pub async fn get_history(
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let history = state.dashboard.history();
    let requested = match query.range.as_deref() {
        Some(raw) => Some(
            raw.parse::<ChartTimeRange>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let current = match requested {
        Some(range) if range != history.range() => history.load(range).await,
        _ => history.state(),
    };

    let response = HistoryResponse {
        range: history.range(),
        state: current,
    };
    Ok(respond(StatusCode::OK, &response, accepts_brotli(&headers)).await)
}

pub async fn refetch_history(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let history = state.dashboard.history();
    let response = HistoryResponse {
        state: history.refetch().await,
        range: history.range(),
    };
    respond(StatusCode::OK, &response, accepts_brotli(&headers)).await
}

pub async fn get_preferences(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    respond(StatusCode::OK, &state.dashboard.preferences(), accepts_brotli(&headers)).await
}

pub async fn patch_preferences(headers: HeaderMap, State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult {
    let patch: PreferencesPatch = parse_body(&body)?;
    let prefs = state
        .dashboard
        .update_preferences(&patch)
        .await
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;
    Ok(respond(StatusCode::OK, &prefs, accepts_brotli(&headers)).await)
}

/// Run the integrity checks on a sample, optionally against a previous one
pub async fn validate_sample(headers: HeaderMap, body: Bytes) -> ApiResult {
    let request: ValidateRequest = parse_body(&body)?;
    let sample = SensorSample::parse(&request.sample).map_err(|e| ApiError::Unprocessable(e.to_string()))?;
    let previous = request
        .previous
        .as_ref()
        .map(SensorSample::parse)
        .transpose()
        .map_err(|e| ApiError::Unprocessable(format!("previous: {e}")))?;

    let outcome = validate(&sample, previous.as_ref());
    Ok(respond(StatusCode::OK, &outcome, accepts_brotli(&headers)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_service::DashboardService;
    use crate::application::feed_connection::{FeedConnector, FeedSettings};
    use crate::application::history_service::HistoryService;
    use crate::application::layout_machine::LayoutMachine;
    use crate::application::live_feed::{IntegrityPolicy, LiveFeedSession};
    use crate::application::preferences_service::PreferencesService;
    use crate::infrastructure::history_repository::SimulatedHistoryRepository;
    use crate::infrastructure::preference_store::MemoryPreferenceStore;
    use crate::infrastructure::upstream_transport::HttpUpstreamTransport;
    use std::time::Duration;

    fn app_state() -> Arc<AppState> {
        let preferences = PreferencesService::new(Arc::new(MemoryPreferenceStore::new()));
        let prefs = preferences.current();
        let connector = FeedConnector::new(FeedSettings::default(), Arc::new(HttpUpstreamTransport::new()));
        let feed = Arc::new(LiveFeedSession::new(connector, prefs.max_feed_items, IntegrityPolicy::Drop));
        let history = HistoryService::new(
            Arc::new(SimulatedHistoryRepository::new(Duration::ZERO)),
            prefs.chart_time_range,
        );
        Arc::new(AppState {
            dashboard: DashboardService::new(LayoutMachine::default(), feed, history, preferences),
        })
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_wire_event() {
        let state = app_state();
        let body = Bytes::from_static(b"{\"type\":\"FULLSCREEN_LIVE\"}");
        let response = dispatch_event(HeaderMap::new(), State(state.clone()), body).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "transitioning");
        assert_eq!(json["layout"], "fullscreen-live");

        let unknown = Bytes::from_static(b"{\"type\":\"DO_A_BARREL_ROLL\"}");
        let response = dispatch_event(HeaderMap::new(), State(state), unknown).await.unwrap();
        assert_eq!(body_json(response).await["layout"], "fullscreen-live");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_event_is_bad_request() {
        let body = Bytes::from_static(b"not json");
        let err = dispatch_event(HeaderMap::new(), State(app_state()), body).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_panel_is_bad_request() {
        let err = retry_panel(Path("sidebar".to_string()), HeaderMap::new(), State(app_state()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_preferences_are_unprocessable() {
        let body = Bytes::from_static(b"{\"maxFeedItems\": 5000}");
        let err = patch_preferences(HeaderMap::new(), State(app_state()), body)
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_range_switch() {
        let state = app_state();
        let query = HistoryQuery {
            range: Some("1h".to_string()),
        };
        let response = get_history(Query(query), HeaderMap::new(), State(state)).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["range"], "1h");
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_validate_sample_with_extreme_previous_timestamp() {
        let body = Bytes::from(
            json!({
                "sample": { "motorSpeed": 50.0, "powerConsumptionWatts": 288.0, "temperatureC": 30.0, "timestamp": 1_700_000_000_000i64 },
                "previous": { "motorSpeed": 50.0, "powerConsumptionWatts": 288.0, "temperatureC": 30.0, "timestamp": i64::MIN }
            })
            .to_string(),
        );
        let response = validate_sample(HeaderMap::new(), body).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "invalid");
        assert!(json["reason"].as_str().unwrap().contains("power/time"));
    }

    #[tokio::test]
    async fn test_validate_sample_reports_zero_power() {
        let body = Bytes::from(
            json!({
                "sample": { "motorSpeed": 50.0, "powerConsumptionWatts": 0.0, "temperatureC": 40.0, "timestamp": 0 }
            })
            .to_string(),
        );
        let response = validate_sample(HeaderMap::new(), body).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "invalid");
        assert!(json["reason"].as_str().unwrap().contains("physical impossibility"));
    }
}
