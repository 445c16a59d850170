// History repository port
use crate::domain::preferences::ChartTimeRange;
use crate::domain::telemetry::HistoricalPoint;
use async_trait::async_trait;

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Ordered aggregate points for the range
    async fn fetch_history(&self, range: ChartTimeRange) -> anyhow::Result<Vec<HistoricalPoint>>;
}
