//! The mutable execution model assembled from one application's stream.
//!
//! Pure data: keyed maps and append-only vectors plus insertion/lookup
//! helpers. Validation is the handlers' job; every mutation is immediately
//! visible to the next event in the stream.

use std::collections::{HashMap, HashSet};

use crate::event::{
    ExecutorResourceRequest, InputMetrics, OutputMetrics, ShuffleReadMetrics,
    ShuffleWriteMetrics, TaskResourceRequest,
};
use crate::metric::StageAccumMetric;

/// Identity and lifetime of the application under analysis.
///
/// Identity fields are filled by the application-start event; `end_time`
/// stays unset until the end event arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationRecord {
    pub name: String,
    pub id: String,
    pub user: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    /// True once any job or environment snapshot shows the GPU plugin active.
    pub gpu_mode: bool,
    /// Plugin presence as derived from the environment snapshot.
    pub plugin_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: u32,
    pub stage_ids: Vec<u32>,
    /// Unset when the job was not issued from a SQL/DataFrame context.
    pub sql_execution_id: Option<u64>,
    pub properties: HashMap<String, String>,
    pub submission_time: i64,
    pub completion_time: Option<i64>,
    pub job_result: Option<String>,
    pub failure_reason: Option<String>,
    pub gpu_mode: bool,
}

/// Stage identity is (id, attempt): retried stages keep their id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageRecord {
    pub stage_id: u32,
    pub attempt_id: u32,
    pub name: String,
    pub num_tasks: u32,
    pub submission_time: Option<i64>,
    pub completion_time: Option<i64>,
    pub failure_reason: Option<String>,
    /// Accumulator ids discovered when the stage completed.
    pub accumulator_ids: HashSet<i64>,
}

/// One completed task. Built once, atomically, at task-end; running tasks
/// are never represented.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub stage_id: u32,
    pub stage_attempt_id: u32,
    pub task_id: u64,
    pub attempt: u32,
    pub launch_time: i64,
    pub finish_time: i64,
    pub duration: i64,
    pub successful: bool,
    pub end_reason: String,
    pub executor_id: String,
    pub host: String,
    pub locality: String,
    pub speculative: bool,
    pub getting_result_time: i64,
    /// Unset when the executor died before reporting metrics.
    pub metrics: Option<TaskMetricsRecord>,
}

/// Task metrics with times normalized to milliseconds.
///
/// The source event reports the two CPU-time fields in nanoseconds; they are
/// converted at ingestion. Everything else is copied unmodified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMetricsRecord {
    pub executor_deserialize_time: u64,
    pub executor_deserialize_cpu_time: u64,
    pub executor_run_time: u64,
    pub executor_cpu_time: u64,
    pub result_size: u64,
    pub jvm_gc_time: u64,
    pub result_serialization_time: u64,
    pub memory_bytes_spilled: u64,
    pub disk_bytes_spilled: u64,
    pub peak_execution_memory: Option<u64>,
    pub input: InputMetrics,
    pub output: OutputMetrics,
    pub shuffle_read: ShuffleReadMetrics,
    pub shuffle_write: ShuffleWriteMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceProfileRecord {
    pub profile_id: u32,
    pub executor_resources: HashMap<String, ExecutorResourceRequest>,
    pub task_resources: HashMap<String, TaskResourceRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockManagerRemovedRecord {
    pub executor_id: String,
    pub host: String,
    pub port: i32,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlPlanMetricRecord {
    pub sql_id: u64,
    pub name: String,
    pub accumulator_id: i64,
    pub metric_type: String,
}

/// The application model. Exclusively owned by one ingestion pipeline;
/// exposed read-only to downstream reporting once the stream is exhausted.
#[derive(Debug, Default)]
pub struct AppModel {
    pub application: ApplicationRecord,
    pub jobs: HashMap<u32, JobRecord>,
    pub stages: HashMap<(u32, u32), StageRecord>,
    pub tasks: Vec<TaskRecord>,
    pub resource_profiles: HashMap<u32, ResourceProfileRecord>,
    pub block_managers_removed: Vec<BlockManagerRemovedRecord>,
    /// SQL execution id -> physical plan text. Last write wins: an adaptive
    /// re-plan supersedes the initial plan.
    pub sql_plans: HashMap<u64, String>,
    pub sql_plan_metrics: Vec<SqlPlanMetricRecord>,
    /// Accumulator id -> normalized metrics, in discovery order.
    pub accum_metrics: HashMap<i64, Vec<StageAccumMetric>>,
    /// Accumulator id -> owning stage id.
    pub accum_stage: HashMap<i64, u32>,
}

impl AppModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-if-absent, then hand back the record for mutation.
    pub fn upsert_stage(&mut self, stage_id: u32, attempt_id: u32) -> &mut StageRecord {
        self.stages
            .entry((stage_id, attempt_id))
            .or_insert_with(|| StageRecord {
                stage_id,
                attempt_id,
                ..StageRecord::default()
            })
    }

    /// Store a physical plan description, overwriting any prior text for the
    /// same execution id.
    pub fn set_sql_plan(&mut self, execution_id: u64, plan: String) {
        self.sql_plans.insert(execution_id, plan);
    }

    /// Append a normalized accumulator metric and index its owning stage.
    pub fn push_accum_metric(&mut self, stage_id: u32, metric: StageAccumMetric) {
        self.accum_stage.insert(metric.accumulator_id, stage_id);
        self.accum_metrics
            .entry(metric.accumulator_id)
            .or_default()
            .push(metric);
    }
}
