// History service - Loads chart aggregates for the selected range
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::application::history_repository::HistoryRepository;
use crate::domain::preferences::ChartTimeRange;
use crate::domain::telemetry::{downsample_points, HistoricalPoint};

pub const MAX_POINTS_PER_SERIES: usize = 150;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HistoryState {
    Loading { data: Vec<HistoricalPoint> },
    Success { data: Vec<HistoricalPoint> },
    Error { data: Vec<HistoricalPoint>, message: String },
}

impl HistoryState {
    pub fn data(&self) -> &[HistoricalPoint] {
        match self {
            HistoryState::Loading { data }
            | HistoryState::Success { data }
            | HistoryState::Error { data, .. } => data,
        }
    }
}

#[derive(Clone)]
pub struct HistoryService {
    repository: Arc<dyn HistoryRepository>,
    state: Arc<Mutex<(ChartTimeRange, HistoryState)>>,
    generation: Arc<AtomicU64>,
}

impl HistoryService {
    pub fn new(repository: Arc<dyn HistoryRepository>, range: ChartTimeRange) -> Self {
        Self {
            repository,
            state: Arc::new(Mutex::new((range, HistoryState::Loading { data: Vec::new() }))),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> HistoryState {
        self.lock().1.clone()
    }

    pub fn range(&self) -> ChartTimeRange {
        self.lock().0
    }

    /// Fetch `range`. A response that arrives after a newer load started is discarded.
    pub async fn load(&self, range: ChartTimeRange) -> HistoryState {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut guard = self.lock();
            let data = guard.1.data().to_vec();
            *guard = (range, HistoryState::Loading { data });
        }

        let next = match self.repository.fetch_history(range).await {
            Ok(points) => {
                tracing::debug!("Fetched {} history points for {}", points.len(), range.as_str());
                HistoryState::Success {
                    data: downsample_points(points, MAX_POINTS_PER_SERIES),
                }
            }
            Err(e) => {
                tracing::error!("History fetch for {} failed: {:#}", range.as_str(), e);
                HistoryState::Error {
                    data: Vec::new(),
                    message: e.to_string(),
                }
            }
        };

        let mut guard = self.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            guard.1 = next;
        }
        guard.1.clone()
    }

    /// Retry with the current range
    pub async fn refetch(&self) -> HistoryState {
        self.load(self.range()).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, (ChartTimeRange, HistoryState)> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
