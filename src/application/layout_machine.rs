// Layout machine driver - Holds the dashboard state and times transitions
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::layout::{
    is_fullscreen, is_panel_visible, reduce, visibility, DashboardEvent, DashboardMachineState, LayoutMode,
    Panel,
};

pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_millis(320);

#[derive(Debug, Default)]
struct Holder {
    state: DashboardMachineState,
    /// Bumped on every entry into `transitioning`
    epoch: u64,
}

#[derive(Clone)]
pub struct LayoutMachine {
    holder: Arc<Mutex<Holder>>,
    transition_delay: Duration,
}

impl Default for LayoutMachine {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSITION_DELAY)
    }
}

impl LayoutMachine {
    pub fn new(transition_delay: Duration) -> Self {
        Self {
            holder: Arc::new(Mutex::new(Holder::default())),
            transition_delay,
        }
    }

    pub fn state(&self) -> DashboardMachineState {
        lock(&self.holder).state.clone()
    }

    /// Apply an event. Each entry into `transitioning` schedules one
    /// `TRANSITION_DONE`; a timer outlived by a newer transition is a no-op.
    pub fn dispatch(&self, event: DashboardEvent) -> DashboardMachineState {
        let (next, entered) = {
            let mut holder = lock(&self.holder);
            let next = reduce(&holder.state, &event);
            let entered = next.is_transitioning() && next != holder.state;
            if entered {
                holder.epoch += 1;
            }
            holder.state = next.clone();
            (next, entered.then_some(holder.epoch))
        };
        tracing::debug!("Layout {:?} -> {:?}", event, next);

        if let Some(epoch) = entered {
            self.schedule_transition_done(epoch);
        }
        next
    }

    fn schedule_transition_done(&self, epoch: u64) {
        let holder = self.holder.clone();
        let delay = self.transition_delay;

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    complete_transition(&holder, epoch);
                });
            }
            Err(_) => {
                tracing::warn!("No runtime for transition timer, completing immediately");
                complete_transition(&holder, epoch);
            }
        }
    }

    pub fn set_layout(&self, layout: LayoutMode) -> DashboardMachineState {
        self.dispatch(DashboardEvent::SetLayout(layout))
    }

    pub fn fullscreen_live(&self) -> DashboardMachineState {
        self.dispatch(DashboardEvent::FullscreenLive)
    }

    pub fn fullscreen_charts(&self) -> DashboardMachineState {
        self.dispatch(DashboardEvent::FullscreenCharts)
    }

    pub fn fullscreen_preferences(&self) -> DashboardMachineState {
        self.dispatch(DashboardEvent::FullscreenPreferences)
    }

    pub fn reset_grid(&self) -> DashboardMachineState {
        self.dispatch(DashboardEvent::ResetGrid)
    }

    pub fn report_error(&self, message: impl Into<String>) -> DashboardMachineState {
        self.dispatch(DashboardEvent::ReportError(message.into()))
    }

    pub fn clear_error(&self) -> DashboardMachineState {
        self.dispatch(DashboardEvent::ClearError)
    }

    pub fn is_panel_visible(&self, panel: Panel) -> bool {
        is_panel_visible(&self.state(), panel)
    }

    pub fn visibility(&self) -> HashMap<Panel, bool> {
        visibility(&self.state())
    }

    pub fn is_fullscreen(&self) -> bool {
        is_fullscreen(&self.state())
    }
}

fn complete_transition(holder: &Mutex<Holder>, epoch: u64) {
    let mut holder = lock(holder);
    if holder.epoch == epoch {
        holder.state = reduce(&holder.state, &DashboardEvent::TransitionDone);
    }
}

fn lock(holder: &Mutex<Holder>) -> std::sync::MutexGuard<'_, Holder> {
    holder.lock().unwrap_or_else(|p| p.into_inner())
}
