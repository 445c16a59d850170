// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use telemetry_dashboard::application::dashboard_service::DashboardService;
use telemetry_dashboard::application::feed_connection::FeedConnector;
use telemetry_dashboard::application::history_repository::HistoryRepository;
use telemetry_dashboard::application::history_service::HistoryService;
use telemetry_dashboard::application::layout_machine::LayoutMachine;
use telemetry_dashboard::application::live_feed::LiveFeedSession;
use telemetry_dashboard::application::preference_store::PreferenceStore;
use telemetry_dashboard::application::preferences_service::PreferencesService;
use telemetry_dashboard::infrastructure::config::load_app_config;
use telemetry_dashboard::infrastructure::history_repository::{HttpHistoryRepository, SimulatedHistoryRepository};
use telemetry_dashboard::infrastructure::preference_store::{FilePreferenceStore, MemoryPreferenceStore};
use telemetry_dashboard::infrastructure::upstream_transport::HttpUpstreamTransport;
use telemetry_dashboard::presentation::app_state::AppState;
use telemetry_dashboard::presentation::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let app_config = load_app_config().context("Failed to load dashboard configuration")?;

    // Create adapters (infrastructure layer)
    let history_repository: Arc<dyn HistoryRepository> = match &app_config.history.base_url {
        Some(base_url) => Arc::new(HttpHistoryRepository::new(base_url.clone())),
        None => Arc::new(SimulatedHistoryRepository::new(Duration::from_millis(
            app_config.history.simulated_latency_ms,
        ))),
    };
    let preference_store: Arc<dyn PreferenceStore> = match &app_config.preferences.path {
        Some(path) if !path.as_os_str().is_empty() => Arc::new(FilePreferenceStore::new(path.clone())),
        _ => Arc::new(MemoryPreferenceStore::new()),
    };
    let transport = Arc::new(HttpUpstreamTransport::new());

    // Create services (application layer)
    let preferences = PreferencesService::new(preference_store);
    let prefs = preferences.current();
    let connector = FeedConnector::new(app_config.feed.settings(), transport);
    let feed = Arc::new(LiveFeedSession::new(
        connector,
        prefs.max_feed_items,
        app_config.feed.integrity_policy,
    ));
    let history = HistoryService::new(history_repository, prefs.chart_time_range);
    let layout = LayoutMachine::new(Duration::from_millis(app_config.layout.transition_ms));
    let dashboard = DashboardService::new(layout, feed, history, preferences);

    let initial = dashboard.start().await;
    tracing::info!("Dashboard started with {} history points", initial.data().len());

    // Create application state
    let state = Arc::new(AppState {
        dashboard: dashboard.clone(),
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", app_config.server.bind))?;
    tracing::info!("Starting telemetry-dashboard service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dashboard.shutdown();
    tracing::info!("Feed disconnected, bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
