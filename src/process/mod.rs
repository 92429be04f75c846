//! Event dispatch and per-kind handlers.
//!
//! [`EventProcessor::process`] routes one decoded event at a time, in stream
//! order, to exactly one handler. Handlers read the event, build the
//! corresponding record(s) and mutate the model. Every handler runs inside a
//! fault-isolation wrapper: a failure is logged with the event kind and
//! absorbed so the stream keeps flowing.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, warn};

use crate::event::{
    ApplicationEnd, ApplicationStart, BlockManagerRemoved, EnvironmentUpdate, JobEnd, JobResult,
    JobStart, ResourceProfileAdded, SparkEvent, SqlAdaptiveExecutionUpdate,
    SqlAdaptiveSqlMetricUpdates, SqlExecutionStart, StageCompleted, StageSubmitted, TaskEnd,
    TaskMetrics, Versioned,
};
use crate::metric;
use crate::model::{
    AppModel, BlockManagerRemovedRecord, JobRecord, ResourceProfileRecord, SqlPlanMetricRecord,
    TaskMetricsRecord, TaskRecord,
};

/// Property carrying the SQL execution id on jobs issued from a SQL context.
const SQL_EXECUTION_ID_PROP: &str = "spark.sql.execution.id";

/// Plugin class whose presence marks a GPU-accelerated run.
const GPU_PLUGIN_CLASS: &str = "com.nvidia.spark.SQLPlugin";

const NANOS_PER_MILLI: u64 = 1_000_000;

/// What the dispatcher did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A known kind was routed to its handler.
    Handled,
    /// The event class does not exist in the engine version that produced
    /// the stream; dropped with a version-compatibility warning.
    Unsupported,
    /// No handler consumes this kind; dropped at debug level.
    Unrecognized,
}

/// Single-owner ingestion pipeline for one application's stream.
pub struct EventProcessor {
    model: AppModel,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self {
            model: AppModel::new(),
        }
    }

    /// Read-only view of the model assembled so far.
    pub fn model(&self) -> &AppModel {
        &self.model
    }

    /// Consume the processor, handing the model to downstream analysis.
    pub fn into_model(self) -> AppModel {
        self.model
    }

    /// Process one decoded event. Never fails: handler faults are logged and
    /// absorbed, unknown kinds are dropped.
    pub fn process(&mut self, event: &SparkEvent) -> Outcome {
        match event {
            SparkEvent::ApplicationStart(e) => {
                self.guard(event.kind(), |p| p.on_application_start(e))
            }
            SparkEvent::ApplicationEnd(e) => self.guard(event.kind(), |p| p.on_application_end(e)),
            SparkEvent::JobStart(e) => self.guard(event.kind(), |p| p.on_job_start(e)),
            SparkEvent::JobEnd(e) => self.guard(event.kind(), |p| p.on_job_end(e)),
            SparkEvent::StageSubmitted(e) => self.guard(event.kind(), |p| p.on_stage_submitted(e)),
            SparkEvent::StageCompleted(e) => self.guard(event.kind(), |p| p.on_stage_completed(e)),
            SparkEvent::TaskStart(_) => {
                // Intentional no-op: only completed tasks are modeled.
                Outcome::Handled
            }
            SparkEvent::TaskGettingResult(e) => {
                debug!(task_id = e.task_info.task_id, "task getting result");
                Outcome::Handled
            }
            SparkEvent::TaskEnd(e) => self.guard(event.kind(), |p| p.on_task_end(e)),
            SparkEvent::EnvironmentUpdate(e) => {
                self.guard(event.kind(), |p| p.on_environment_update(e))
            }
            SparkEvent::BlockManagerRemoved(e) => {
                self.guard(event.kind(), |p| p.on_block_manager_removed(e))
            }
            SparkEvent::ResourceProfileAdded(Versioned::Supported(e)) => {
                self.guard(event.kind(), |p| p.on_resource_profile_added(e))
            }
            SparkEvent::ResourceProfileAdded(Versioned::Unsupported { class }) => {
                warn!(
                    class = %class,
                    "event class unavailable in this engine version, skipping"
                );
                Outcome::Unsupported
            }
            SparkEvent::SqlExecutionStart(e) => {
                self.guard(event.kind(), |p| p.on_sql_execution_start(e))
            }
            SparkEvent::SqlAdaptiveExecutionUpdate(e) => {
                self.guard(event.kind(), |p| p.on_sql_adaptive_execution_update(e))
            }
            SparkEvent::SqlAdaptiveSqlMetricUpdates(e) => {
                self.guard(event.kind(), |p| p.on_sql_adaptive_metric_updates(e))
            }
            SparkEvent::Other { kind } => {
                debug!(kind = %kind, "no handler for event, dropped");
                Outcome::Unrecognized
            }
        }
    }

    /// Fault isolation: one handler's failure never reaches the caller.
    fn guard(&mut self, kind: &str, handler: impl FnOnce(&mut Self) -> Result<()>) -> Outcome {
        if let Err(err) = handler(self) {
            warn!(
                event = kind,
                error = %format!("{err:#}"),
                "event handler failed, continuing with next event"
            );
        }
        Outcome::Handled
    }

    fn on_application_start(&mut self, e: &ApplicationStart) -> Result<()> {
        let app = &mut self.model.application;
        app.name = e.app_name.clone();
        // Very old engines log no id at all.
        app.id = e.app_id.clone().unwrap_or_default();
        app.user = e.user.clone();
        app.start_time = e.timestamp;
        Ok(())
    }

    fn on_application_end(&mut self, e: &ApplicationEnd) -> Result<()> {
        self.model.application.end_time = Some(e.timestamp);
        Ok(())
    }

    fn on_job_start(&mut self, e: &JobStart) -> Result<()> {
        // Absent or non-numeric property means no SQL association, never zero.
        let sql_execution_id = e
            .properties
            .get(SQL_EXECUTION_ID_PROP)
            .and_then(|v| v.trim().parse::<u64>().ok());

        if plugin_enabled(&e.properties) {
            self.model.application.gpu_mode = true;
        }

        self.model.jobs.insert(
            e.job_id,
            JobRecord {
                job_id: e.job_id,
                stage_ids: e.stage_ids.clone(),
                sql_execution_id,
                properties: e.properties.clone(),
                submission_time: e.submission_time,
                completion_time: None,
                job_result: None,
                failure_reason: None,
                gpu_mode: self.model.application.gpu_mode,
            },
        );
        Ok(())
    }

    fn on_job_end(&mut self, e: &JobEnd) -> Result<()> {
        let Some(job) = self.model.jobs.get_mut(&e.job_id) else {
            warn!(job_id = e.job_id, "job end for unknown job, skipping");
            return Ok(());
        };
        job.completion_time = Some(e.completion_time);
        match &e.job_result {
            JobResult::JobSucceeded => job.job_result = Some("JobSucceeded".to_owned()),
            JobResult::JobFailed { exception } => {
                job.job_result = Some("JobFailed".to_owned());
                job.failure_reason = exception.as_ref().map(|x| x.message.clone());
            }
        }
        Ok(())
    }

    fn on_stage_submitted(&mut self, e: &StageSubmitted) -> Result<()> {
        let info = &e.stage_info;
        let stage = self.model.upsert_stage(info.stage_id, info.attempt_id);
        stage.name = info.name.clone();
        stage.num_tasks = info.num_tasks;
        stage.submission_time = info.submission_time;
        Ok(())
    }

    fn on_stage_completed(&mut self, e: &StageCompleted) -> Result<()> {
        let info = &e.stage_info;
        let stage = self.model.upsert_stage(info.stage_id, info.attempt_id);
        stage.name = info.name.clone();
        stage.num_tasks = info.num_tasks;
        if stage.submission_time.is_none() {
            stage.submission_time = info.submission_time;
        }
        stage.completion_time = info.completion_time;
        stage.failure_reason = info.failure_reason.clone();

        // Isolation is per accumulable: one bad entry must not cost us the
        // rest of the set.
        for acc in &info.accumulables {
            match metric::normalize(acc) {
                Ok(Some(m)) => {
                    self.model
                        .upsert_stage(info.stage_id, info.attempt_id)
                        .accumulator_ids
                        .insert(m.accumulator_id);
                    self.model.push_accum_metric(info.stage_id, m);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        stage_id = info.stage_id,
                        error = %err,
                        "skipping accumulable"
                    );
                }
            }
        }
        Ok(())
    }

    fn on_task_end(&mut self, e: &TaskEnd) -> Result<()> {
        let info = &e.task_info;
        self.model.tasks.push(TaskRecord {
            stage_id: e.stage_id,
            stage_attempt_id: e.stage_attempt_id,
            task_id: info.task_id,
            attempt: info.attempt,
            launch_time: info.launch_time,
            finish_time: info.finish_time,
            duration: info.finish_time - info.launch_time,
            successful: e.reason.is_success(),
            end_reason: e.reason.describe(),
            executor_id: info.executor_id.clone(),
            host: info.host.clone(),
            locality: info.locality.clone(),
            speculative: info.speculative,
            getting_result_time: info.getting_result_time,
            metrics: e.task_metrics.as_ref().map(task_metrics_record),
        });
        Ok(())
    }

    fn on_environment_update(&mut self, e: &EnvironmentUpdate) -> Result<()> {
        let enabled = plugin_enabled(&e.spark_properties);
        let app = &mut self.model.application;
        app.plugin_enabled = enabled;
        if enabled {
            app.gpu_mode = true;
        }
        debug!(gpu_mode = app.gpu_mode, "environment updated");
        Ok(())
    }

    fn on_block_manager_removed(&mut self, e: &BlockManagerRemoved) -> Result<()> {
        self.model
            .block_managers_removed
            .push(BlockManagerRemovedRecord {
                executor_id: e.block_manager_id.executor_id.clone(),
                host: e.block_manager_id.host.clone(),
                port: e.block_manager_id.port,
                timestamp: e.timestamp,
            });
        Ok(())
    }

    fn on_resource_profile_added(&mut self, e: &ResourceProfileAdded) -> Result<()> {
        self.model.resource_profiles.insert(
            e.profile_id,
            ResourceProfileRecord {
                profile_id: e.profile_id,
                executor_resources: e.executor_resources.clone(),
                task_resources: e.task_resources.clone(),
            },
        );
        Ok(())
    }

    fn on_sql_execution_start(&mut self, e: &SqlExecutionStart) -> Result<()> {
        self.model
            .set_sql_plan(e.execution_id, e.physical_plan_description.clone());
        Ok(())
    }

    fn on_sql_adaptive_execution_update(&mut self, e: &SqlAdaptiveExecutionUpdate) -> Result<()> {
        // The adaptive plan supersedes the initial one: overwrite, not merge.
        self.model
            .set_sql_plan(e.execution_id, e.physical_plan_description.clone());
        Ok(())
    }

    fn on_sql_adaptive_metric_updates(&mut self, e: &SqlAdaptiveSqlMetricUpdates) -> Result<()> {
        for m in &e.sql_plan_metrics {
            self.model.sql_plan_metrics.push(SqlPlanMetricRecord {
                sql_id: e.execution_id,
                name: m.name.clone(),
                accumulator_id: m.accumulator_id,
                metric_type: m.metric_type.clone(),
            });
        }
        Ok(())
    }
}

impl Default for EventProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the GPU SQL plugin is listed and not explicitly disabled.
/// Shared by the job-start and environment-update paths.
pub fn plugin_enabled(props: &HashMap<String, String>) -> bool {
    let listed = props
        .get("spark.plugins")
        .is_some_and(|v| v.split(',').any(|p| p.trim() == GPU_PLUGIN_CLASS));
    let enabled = props
        .get("spark.rapids.sql.enabled")
        .map_or(true, |v| v.trim().eq_ignore_ascii_case("true"));
    listed && enabled
}

/// Copy the metrics block, converting the two nanosecond CPU-time fields to
/// integer milliseconds. Everything else passes through unmodified.
fn task_metrics_record(m: &TaskMetrics) -> TaskMetricsRecord {
    TaskMetricsRecord {
        executor_deserialize_time: m.executor_deserialize_time,
        executor_deserialize_cpu_time: m.executor_deserialize_cpu_time / NANOS_PER_MILLI,
        executor_run_time: m.executor_run_time,
        executor_cpu_time: m.executor_cpu_time / NANOS_PER_MILLI,
        result_size: m.result_size,
        jvm_gc_time: m.jvm_gc_time,
        result_serialization_time: m.result_serialization_time,
        memory_bytes_spilled: m.memory_bytes_spilled,
        disk_bytes_spilled: m.disk_bytes_spilled,
        peak_execution_memory: m.peak_execution_memory,
        input: m.input.clone(),
        output: m.output.clone(),
        shuffle_read: m.shuffle_read.clone(),
        shuffle_write: m.shuffle_write.clone(),
    }
}
