//! Decoded Spark listener-bus event records.
//!
//! These structs mirror the shapes the upstream event-log reader produces.
//! Field renames match Spark's JSON event-log protocol so the reader can
//! deserialize log lines straight into them. Fields that only exist in newer
//! engine versions are `Option` or `#[serde(default)]` so older logs still
//! decode.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One decoded listener-bus event.
///
/// A closed set of kinds this model consumes, plus [`SparkEvent::Other`] for
/// everything else on the bus. New kinds are added by extending this enum,
/// never by string comparison at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub enum SparkEvent {
    ApplicationStart(ApplicationStart),
    ApplicationEnd(ApplicationEnd),
    JobStart(JobStart),
    JobEnd(JobEnd),
    StageSubmitted(StageSubmitted),
    StageCompleted(StageCompleted),
    TaskStart(TaskStart),
    TaskGettingResult(TaskGettingResult),
    TaskEnd(TaskEnd),
    EnvironmentUpdate(EnvironmentUpdate),
    BlockManagerRemoved(BlockManagerRemoved),
    /// Resource profiles only exist from Spark 3.1 on; the reader resolves
    /// availability once per event and records the outcome.
    ResourceProfileAdded(Versioned<ResourceProfileAdded>),
    SqlExecutionStart(SqlExecutionStart),
    SqlAdaptiveExecutionUpdate(SqlAdaptiveExecutionUpdate),
    SqlAdaptiveSqlMetricUpdates(SqlAdaptiveSqlMetricUpdates),
    /// Any listener event this model does not consume.
    Other { kind: String },
}

impl SparkEvent {
    /// Canonical event-class label, used for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::ApplicationStart(_) => "SparkListenerApplicationStart",
            Self::ApplicationEnd(_) => "SparkListenerApplicationEnd",
            Self::JobStart(_) => "SparkListenerJobStart",
            Self::JobEnd(_) => "SparkListenerJobEnd",
            Self::StageSubmitted(_) => "SparkListenerStageSubmitted",
            Self::StageCompleted(_) => "SparkListenerStageCompleted",
            Self::TaskStart(_) => "SparkListenerTaskStart",
            Self::TaskGettingResult(_) => "SparkListenerTaskGettingResult",
            Self::TaskEnd(_) => "SparkListenerTaskEnd",
            Self::EnvironmentUpdate(_) => "SparkListenerEnvironmentUpdate",
            Self::BlockManagerRemoved(_) => "SparkListenerBlockManagerRemoved",
            Self::ResourceProfileAdded(_) => "SparkListenerResourceProfileAdded",
            Self::SqlExecutionStart(_) => "SparkListenerSQLExecutionStart",
            Self::SqlAdaptiveExecutionUpdate(_) => "SparkListenerSQLAdaptiveExecutionUpdate",
            Self::SqlAdaptiveSqlMetricUpdates(_) => "SparkListenerSQLAdaptiveSQLMetricUpdates",
            Self::Other { kind } => kind,
        }
    }
}

impl fmt::Display for SparkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Decode outcome for an event class that only exists in newer engines.
///
/// The reader probes once whether the class is known to the engine version
/// that wrote the log; dispatch then matches the two outcomes statically
/// instead of reflecting at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Versioned<T> {
    Supported(T),
    /// The producing engine predates this event class.
    Unsupported { class: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStart {
    #[serde(rename = "App Name")]
    pub app_name: String,
    /// Absent in logs from engines that never assigned an id.
    #[serde(rename = "App ID", default)]
    pub app_id: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
    #[serde(rename = "User")]
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEnd {
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStart {
    #[serde(rename = "Job ID")]
    pub job_id: u32,
    #[serde(rename = "Submission Time")]
    pub submission_time: i64,
    #[serde(rename = "Stage IDs")]
    pub stage_ids: Vec<u32>,
    #[serde(rename = "Properties", default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnd {
    #[serde(rename = "Job ID")]
    pub job_id: u32,
    #[serde(rename = "Completion Time")]
    pub completion_time: i64,
    #[serde(rename = "Job Result")]
    pub job_result: JobResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Result")]
pub enum JobResult {
    JobSucceeded,
    JobFailed {
        #[serde(rename = "Exception", default)]
        exception: Option<ExceptionInfo>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSubmitted {
    #[serde(rename = "Stage Info")]
    pub stage_info: StageInfo,
    #[serde(rename = "Properties", default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCompleted {
    #[serde(rename = "Stage Info")]
    pub stage_info: StageInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    #[serde(rename = "Stage ID")]
    pub stage_id: u32,
    #[serde(rename = "Stage Attempt ID")]
    pub attempt_id: u32,
    #[serde(rename = "Stage Name")]
    pub name: String,
    #[serde(rename = "Number of Tasks")]
    pub num_tasks: u32,
    #[serde(rename = "Submission Time", default)]
    pub submission_time: Option<i64>,
    #[serde(rename = "Completion Time", default)]
    pub completion_time: Option<i64>,
    #[serde(rename = "Failure Reason", default)]
    pub failure_reason: Option<String>,
    #[serde(rename = "Accumulables", default)]
    pub accumulables: Vec<AccumulableInfo>,
}

/// A raw accumulator update as carried on stage and task events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulableInfo {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Update", default)]
    pub update: Option<AccumValue>,
    #[serde(rename = "Value", default)]
    pub value: Option<AccumValue>,
    #[serde(rename = "Internal", default)]
    pub internal: bool,
}

/// An accumulable value as logged: a JSON number or a stringified one,
/// depending on the accumulator class that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccumValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for AccumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStart {
    #[serde(rename = "Stage ID")]
    pub stage_id: u32,
    #[serde(rename = "Stage Attempt ID")]
    pub stage_attempt_id: u32,
    #[serde(rename = "Task Info")]
    pub task_info: TaskInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGettingResult {
    #[serde(rename = "Task Info")]
    pub task_info: TaskInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnd {
    #[serde(rename = "Stage ID")]
    pub stage_id: u32,
    #[serde(rename = "Stage Attempt ID")]
    pub stage_attempt_id: u32,
    #[serde(rename = "Task Type", default)]
    pub task_type: String,
    #[serde(rename = "Task End Reason")]
    pub reason: TaskEndReason,
    #[serde(rename = "Task Info")]
    pub task_info: TaskInfo,
    /// Absent when the executor died before reporting metrics.
    #[serde(rename = "Task Metrics", default)]
    pub task_metrics: Option<TaskMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    #[serde(rename = "Task ID")]
    pub task_id: u64,
    #[serde(rename = "Index")]
    pub index: u32,
    #[serde(rename = "Attempt")]
    pub attempt: u32,
    #[serde(rename = "Launch Time")]
    pub launch_time: i64,
    #[serde(rename = "Finish Time")]
    pub finish_time: i64,
    #[serde(rename = "Executor ID")]
    pub executor_id: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Locality")]
    pub locality: String,
    #[serde(rename = "Speculative")]
    pub speculative: bool,
    #[serde(rename = "Getting Result Time", default)]
    pub getting_result_time: i64,
    #[serde(rename = "Failed", default)]
    pub failed: bool,
    #[serde(rename = "Killed", default)]
    pub killed: bool,
    #[serde(rename = "Accumulables", default)]
    pub accumulables: Vec<AccumulableInfo>,
}

/// Why a task finished, as classified by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Reason")]
pub enum TaskEndReason {
    Success,
    ExceptionFailure {
        #[serde(rename = "Class Name", default)]
        class_name: String,
        #[serde(rename = "Description", default)]
        description: String,
    },
    TaskKilled {
        #[serde(rename = "Kill Reason", default)]
        kill_reason: Option<String>,
    },
    FetchFailed {
        #[serde(rename = "Message", default)]
        message: Option<String>,
    },
    ExecutorLostFailure {
        #[serde(rename = "Executor ID", default)]
        executor_id: Option<String>,
        #[serde(rename = "Loss Reason", default)]
        loss_reason: Option<String>,
    },
    TaskResultLost,
    Resubmitted,
    /// Reason classes this model does not know about.
    #[serde(other)]
    Unknown,
}

impl TaskEndReason {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Human-readable form stored on the task record: the descriptive string
    /// for classified failures, otherwise the reason's generic name.
    pub fn describe(&self) -> String {
        match self {
            Self::Success => "Success".to_owned(),
            Self::ExceptionFailure {
                class_name,
                description,
            } => {
                if description.is_empty() {
                    class_name.clone()
                } else {
                    description.clone()
                }
            }
            Self::TaskKilled { kill_reason } => {
                kill_reason.clone().unwrap_or_else(|| "TaskKilled".to_owned())
            }
            Self::FetchFailed { message } => {
                message.clone().unwrap_or_else(|| "FetchFailed".to_owned())
            }
            Self::ExecutorLostFailure { loss_reason, .. } => loss_reason
                .clone()
                .unwrap_or_else(|| "ExecutorLostFailure".to_owned()),
            Self::TaskResultLost => "TaskResultLost".to_owned(),
            Self::Resubmitted => "Resubmitted".to_owned(),
            Self::Unknown => "UnknownReason".to_owned(),
        }
    }
}

/// Executor-side metrics reported on task completion.
///
/// The two CPU-time fields are nanoseconds; every other time field is
/// already milliseconds as logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    #[serde(rename = "Executor Deserialize Time")]
    pub executor_deserialize_time: u64,
    #[serde(rename = "Executor Deserialize CPU Time", default)]
    pub executor_deserialize_cpu_time: u64,
    #[serde(rename = "Executor Run Time")]
    pub executor_run_time: u64,
    #[serde(rename = "Executor CPU Time", default)]
    pub executor_cpu_time: u64,
    #[serde(rename = "Result Size")]
    pub result_size: u64,
    #[serde(rename = "JVM GC Time")]
    pub jvm_gc_time: u64,
    #[serde(rename = "Result Serialization Time")]
    pub result_serialization_time: u64,
    #[serde(rename = "Memory Bytes Spilled")]
    pub memory_bytes_spilled: u64,
    #[serde(rename = "Disk Bytes Spilled")]
    pub disk_bytes_spilled: u64,
    /// Added in Spark 2.0; unset means the engine never reported it.
    #[serde(rename = "Peak Execution Memory", default)]
    pub peak_execution_memory: Option<u64>,
    #[serde(rename = "Input Metrics", default)]
    pub input: InputMetrics,
    #[serde(rename = "Output Metrics", default)]
    pub output: OutputMetrics,
    #[serde(rename = "Shuffle Read Metrics", default)]
    pub shuffle_read: ShuffleReadMetrics,
    #[serde(rename = "Shuffle Write Metrics", default)]
    pub shuffle_write: ShuffleWriteMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMetrics {
    #[serde(rename = "Bytes Read")]
    pub bytes_read: u64,
    #[serde(rename = "Records Read")]
    pub records_read: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputMetrics {
    #[serde(rename = "Bytes Written")]
    pub bytes_written: u64,
    #[serde(rename = "Records Written")]
    pub records_written: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShuffleReadMetrics {
    #[serde(rename = "Remote Blocks Fetched")]
    pub remote_blocks_fetched: u64,
    #[serde(rename = "Local Blocks Fetched")]
    pub local_blocks_fetched: u64,
    #[serde(rename = "Fetch Wait Time")]
    pub fetch_wait_time: u64,
    #[serde(rename = "Remote Bytes Read")]
    pub remote_bytes_read: u64,
    /// Added in Spark 2.4; unset means the engine never reported it.
    #[serde(rename = "Remote Bytes Read To Disk", default)]
    pub remote_bytes_read_to_disk: Option<u64>,
    #[serde(rename = "Local Bytes Read")]
    pub local_bytes_read: u64,
    #[serde(rename = "Total Records Read")]
    pub total_records_read: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShuffleWriteMetrics {
    #[serde(rename = "Shuffle Bytes Written")]
    pub bytes_written: u64,
    /// Nanoseconds, stored as logged.
    #[serde(rename = "Shuffle Write Time")]
    pub write_time: u64,
    #[serde(rename = "Shuffle Records Written")]
    pub records_written: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentUpdate {
    #[serde(rename = "JVM Information", default)]
    pub jvm_information: HashMap<String, String>,
    #[serde(rename = "Spark Properties", default)]
    pub spark_properties: HashMap<String, String>,
    #[serde(rename = "System Properties", default)]
    pub system_properties: HashMap<String, String>,
    #[serde(rename = "Classpath Entries", default)]
    pub classpath_entries: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockManagerRemoved {
    #[serde(rename = "Block Manager ID")]
    pub block_manager_id: BlockManagerId,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockManagerId {
    #[serde(rename = "Executor ID")]
    pub executor_id: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProfileAdded {
    #[serde(rename = "Resource Profile Id")]
    pub profile_id: u32,
    #[serde(rename = "Executor Resource Requests", default)]
    pub executor_resources: HashMap<String, ExecutorResourceRequest>,
    #[serde(rename = "Task Resource Requests", default)]
    pub task_resources: HashMap<String, TaskResourceRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResourceRequest {
    #[serde(rename = "Resource Name")]
    pub resource_name: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "Discovery Script", default)]
    pub discovery_script: String,
    #[serde(rename = "Vendor", default)]
    pub vendor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResourceRequest {
    #[serde(rename = "Resource Name")]
    pub resource_name: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlExecutionStart {
    pub execution_id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    pub physical_plan_description: String,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlAdaptiveExecutionUpdate {
    pub execution_id: u64,
    pub physical_plan_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlAdaptiveSqlMetricUpdates {
    pub execution_id: u64,
    #[serde(default)]
    pub sql_plan_metrics: Vec<SqlPlanMetricInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlPlanMetricInfo {
    pub name: String,
    pub accumulator_id: i64,
    pub metric_type: String,
}
