// Per-panel rendering health
//
// A failing panel is tracked on its own so the other panels keep rendering.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::layout::Panel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PanelHealth {
    Healthy,
    Failed { message: String },
}

#[derive(Debug, Clone, Default)]
pub struct PanelBoard {
    failures: HashMap<Panel, String>,
}

impl PanelBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_failure(&mut self, panel: Panel, message: impl Into<String>) {
        self.failures.insert(panel, message.into());
    }

    /// Manual retry: clears the failure for this panel only
    pub fn retry(&mut self, panel: Panel) -> bool {
        self.failures.remove(&panel).is_some()
    }

    pub fn health(&self, panel: Panel) -> PanelHealth {
        match self.failures.get(&panel) {
            Some(message) => PanelHealth::Failed {
                message: message.clone(),
            },
            None => PanelHealth::Healthy,
        }
    }

    pub fn snapshot(&self) -> HashMap<Panel, PanelHealth> {
        Panel::ALL.iter().map(|p| (*p, self.health(*p))).collect()
    }
}
