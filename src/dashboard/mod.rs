//! Statistics Dashboard Module
//!
//! Timer-driven, single-flight recomputation of roster statistics with
//! lock-free reads of the latest published snapshot.

mod service;
mod snapshot;
mod state;

pub use service::{
    DashboardMetrics, DashboardSettings, RefreshOutcome, StatisticsDashboard, AVERAGES_CACHE,
};
pub use snapshot::{GradeDistribution, PerformerGroup, StatisticsSnapshot};
pub use state::ThreadStatus;
