// Dashboard layout state machine
//
// Pure transition function. Timers live with the driver in
// application::layout_machine; nothing here blocks or schedules.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    Grid,
    FullscreenLive,
    FullscreenCharts,
    FullscreenPreferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Live,
    Charts,
    Preferences,
}

impl Panel {
    pub const ALL: [Panel; 3] = [Panel::Live, Panel::Charts, Panel::Preferences];

    pub fn fullscreen_layout(self) -> LayoutMode {
        match self {
            Panel::Live => LayoutMode::FullscreenLive,
            Panel::Charts => LayoutMode::FullscreenCharts,
            Panel::Preferences => LayoutMode::FullscreenPreferences,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DashboardMachineState {
    Idle { layout: LayoutMode },
    Transitioning { layout: LayoutMode, previous: LayoutMode },
    Error { layout: LayoutMode, message: String },
}

impl Default for DashboardMachineState {
    fn default() -> Self {
        DashboardMachineState::Idle {
            layout: LayoutMode::Grid,
        }
    }
}

impl DashboardMachineState {
    pub fn layout(&self) -> LayoutMode {
        match self {
            DashboardMachineState::Idle { layout }
            | DashboardMachineState::Transitioning { layout, .. }
            | DashboardMachineState::Error { layout, .. } => *layout,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, DashboardMachineState::Transitioning { .. })
    }
}

/// Events accepted by [`reduce`]. Unrecognized wire types deserialize to `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardEvent {
    SetLayout(LayoutMode),
    FullscreenLive,
    FullscreenCharts,
    FullscreenPreferences,
    ResetGrid,
    TransitionDone,
    ReportError(String),
    ClearError,
    #[serde(other)]
    Unknown,
}

impl DashboardEvent {
    fn target_layout(&self) -> Option<LayoutMode> {
        match self {
            DashboardEvent::SetLayout(layout) => Some(*layout),
            DashboardEvent::FullscreenLive => Some(LayoutMode::FullscreenLive),
            DashboardEvent::FullscreenCharts => Some(LayoutMode::FullscreenCharts),
            DashboardEvent::FullscreenPreferences => Some(LayoutMode::FullscreenPreferences),
            DashboardEvent::ResetGrid => Some(LayoutMode::Grid),
            _ => None,
        }
    }
}

pub fn reduce(state: &DashboardMachineState, event: &DashboardEvent) -> DashboardMachineState {
    match event {
        DashboardEvent::ClearError => match state {
            DashboardMachineState::Error { layout, .. } => DashboardMachineState::Idle { layout: *layout },
            _ => state.clone(),
        },
        DashboardEvent::ReportError(message) => DashboardMachineState::Error {
            layout: state.layout(),
            message: message.clone(),
        },
        DashboardEvent::TransitionDone => match state {
            DashboardMachineState::Transitioning { layout, .. } => {
                DashboardMachineState::Idle { layout: *layout }
            }
            _ => state.clone(),
        },
        other => match other.target_layout() {
            Some(target) if target != state.layout() => DashboardMachineState::Transitioning {
                layout: target,
                previous: state.layout(),
            },
            _ => state.clone(),
        },
    }
}

pub fn is_panel_visible(state: &DashboardMachineState, panel: Panel) -> bool {
    let layout = state.layout();
    layout == LayoutMode::Grid || layout == panel.fullscreen_layout()
}

/// Visibility of every panel for one state
pub fn visibility(state: &DashboardMachineState) -> HashMap<Panel, bool> {
    Panel::ALL
        .iter()
        .map(|p| (*p, is_panel_visible(state, *p)))
        .collect()
}

pub fn is_fullscreen(state: &DashboardMachineState) -> bool {
    state.layout() != LayoutMode::Grid
}
