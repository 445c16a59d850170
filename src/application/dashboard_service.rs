// Dashboard service - Wires layout, live feed, history and preferences together
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::application::history_service::{HistoryService, HistoryState};
use crate::application::layout_machine::LayoutMachine;
use crate::application::live_feed::{LiveFeedSession, LiveFeedSnapshot};
use crate::application::preferences_service::PreferencesService;
use crate::domain::layout::{is_fullscreen, visibility, DashboardEvent, DashboardMachineState, Panel};
use crate::domain::panel::{PanelBoard, PanelHealth};
use crate::domain::preferences::{Preferences, PreferencesError, PreferencesPatch};

/// Everything a rendering surface needs to lay out the page
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub machine: DashboardMachineState,
    pub fullscreen: bool,
    pub visible: HashMap<Panel, bool>,
    pub panels: HashMap<Panel, PanelHealth>,
}

#[derive(Clone)]
pub struct DashboardService {
    layout: LayoutMachine,
    feed: Arc<LiveFeedSession>,
    history: HistoryService,
    preferences: PreferencesService,
    panels: Arc<Mutex<PanelBoard>>,
}

impl DashboardService {
    pub fn new(
        layout: LayoutMachine,
        feed: Arc<LiveFeedSession>,
        history: HistoryService,
        preferences: PreferencesService,
    ) -> Self {
        Self {
            layout,
            feed,
            history,
            preferences,
            panels: Arc::new(Mutex::new(PanelBoard::new())),
        }
    }

    /// Apply stored preferences, subscribe to the feed and load history
    pub async fn start(&self) -> HistoryState {
        let prefs = self.preferences.current();
        self.feed.set_capacity(prefs.max_feed_items);
        self.feed.start();
        self.history.load(prefs.chart_time_range).await
    }

    pub fn shutdown(&self) {
        self.feed.stop();
    }

    /// All fields derive from one read of the layout state
    pub fn view(&self) -> DashboardView {
        let machine = self.layout.state();
        DashboardView {
            fullscreen: is_fullscreen(&machine),
            visible: visibility(&machine),
            panels: self.lock_panels().snapshot(),
            machine,
        }
    }

    pub fn dispatch(&self, event: DashboardEvent) -> DashboardMachineState {
        self.layout.dispatch(event)
    }

    pub fn layout(&self) -> &LayoutMachine {
        &self.layout
    }

    pub fn feed(&self) -> &LiveFeedSession {
        &self.feed
    }

    pub fn feed_snapshot(&self) -> LiveFeedSnapshot {
        self.feed.snapshot()
    }

    pub fn history(&self) -> &HistoryService {
        &self.history
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.current()
    }

    /// Persist a preference change and apply it to the running dashboard.
    /// Capacity applies on the next append; a new chart range reloads history.
    pub async fn update_preferences(&self, patch: &PreferencesPatch) -> Result<Preferences, PreferencesError> {
        let before = self.preferences.current();
        let after = self.preferences.update(patch)?;

        if after.max_feed_items != before.max_feed_items {
            self.feed.set_capacity(after.max_feed_items);
        }
        if after.chart_time_range != before.chart_time_range {
            self.history.load(after.chart_time_range).await;
        }
        Ok(after)
    }

    pub fn report_panel_failure(&self, panel: Panel, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Panel {:?} failed: {}", panel, message);
        self.lock_panels().report_failure(panel, message);
    }

    pub fn retry_panel(&self, panel: Panel) -> PanelHealth {
        let mut panels = self.lock_panels();
        if panels.retry(panel) {
            tracing::info!("Panel {:?} retried", panel);
        }
        panels.health(panel)
    }

    fn lock_panels(&self) -> std::sync::MutexGuard<'_, PanelBoard> {
        self.panels.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feed_connection::{FeedConnector, FeedSettings};
    use crate::application::live_feed::IntegrityPolicy;
    use crate::domain::layout::is_panel_visible;
    use crate::domain::preferences::ChartTimeRange;
    use crate::infrastructure::history_repository::SimulatedHistoryRepository;
    use crate::infrastructure::preference_store::MemoryPreferenceStore;
    use crate::infrastructure::upstream_transport::HttpUpstreamTransport;
    use std::time::Duration;

    fn service() -> DashboardService {
        let preferences = PreferencesService::new(Arc::new(MemoryPreferenceStore::new()));
        let prefs = preferences.current();
        let connector = FeedConnector::new(FeedSettings::default(), Arc::new(HttpUpstreamTransport::new()));
        let feed = Arc::new(LiveFeedSession::new(connector, prefs.max_feed_items, IntegrityPolicy::Drop));
        let history = HistoryService::new(
            Arc::new(SimulatedHistoryRepository::new(Duration::ZERO)),
            prefs.chart_time_range,
        );
        DashboardService::new(LayoutMachine::default(), feed, history, preferences)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_loads_history_and_feed() {
        let dashboard = service();
        let history = dashboard.start().await;
        assert_eq!(history.data().len(), 24);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(dashboard.feed_snapshot().events.len(), 1);
        dashboard.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_preference_update_applies_to_running_dashboard() {
        let dashboard = service();
        dashboard.start().await;

        let patch = PreferencesPatch {
            max_feed_items: Some(10),
            chart_time_range: Some(ChartTimeRange::SevenDays),
            ..Default::default()
        };
        let prefs = dashboard.update_preferences(&patch).await.unwrap();
        assert_eq!(prefs.max_feed_items, 10);
        assert_eq!(dashboard.feed_snapshot().capacity, 10);
        assert_eq!(dashboard.history().state().data().len(), 7);
        dashboard.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_is_consistent_through_transitions() {
        let dashboard = service();
        let steps = [
            DashboardEvent::FullscreenLive,
            DashboardEvent::FullscreenPreferences,
            DashboardEvent::TransitionDone,
            DashboardEvent::ReportError("boom".to_string()),
            DashboardEvent::ResetGrid,
            DashboardEvent::ClearError,
        ];
        for event in steps {
            dashboard.dispatch(event);
            let view = dashboard.view();
            for panel in Panel::ALL {
                assert_eq!(view.visible[&panel], is_panel_visible(&view.machine, panel));
            }
            assert_eq!(view.fullscreen, is_fullscreen(&view.machine));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_reflects_layout_and_panels() {
        let dashboard = service();
        dashboard.dispatch(DashboardEvent::FullscreenCharts);
        dashboard.report_panel_failure(Panel::Charts, "renderer crashed");

        let view = dashboard.view();
        assert!(view.fullscreen);
        assert_eq!(view.visible[&Panel::Charts], true);
        assert_eq!(view.visible[&Panel::Live], false);
        assert!(matches!(view.panels[&Panel::Charts], PanelHealth::Failed { .. }));
        assert_eq!(view.panels[&Panel::Live], PanelHealth::Healthy);

        assert_eq!(dashboard.retry_panel(Panel::Charts), PanelHealth::Healthy);
    }
}
