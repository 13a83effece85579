//! Background Tasks Module
//!
//! Recurring tasks dispatched at a fixed rate to the scheduled-jobs pool.

mod scheduler;
mod task;

pub use scheduler::{SchedulerSettings, TaskScheduler};
pub use task::{ExecutionHistory, ScheduledTask, TaskAction, TaskExecution, TaskInfo};
