//! Request and Response models for the admin API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    AuditLogRequest, CachePutRequest, JobKind, RecentQuery, ScheduleTaskRequest, StudentRequest,
};
pub use responses::{
    AuditAcceptedResponse, AuditRecentResponse, CacheGetResponse, CachePutResponse,
    CacheStatsResponse, DashboardActionResponse, DashboardResponse, HealthResponse,
    PoolsResponse, StudentResponse, TaskCancelledResponse, TaskHistoryResponse, TaskListResponse,
    TaskScheduledResponse,
};
