//! Black-box test: drive a realistic event stream through the processor and
//! check the assembled model end to end. Event payloads are built from wire
//! JSON where it matters, so the serde field mapping is exercised too.

use std::collections::HashMap;

use serde_json::json;

use sparkscope::event::{
    ApplicationEnd, ApplicationStart, BlockManagerRemoved, EnvironmentUpdate, JobEnd, JobStart,
    ResourceProfileAdded, SparkEvent, SqlAdaptiveExecutionUpdate, SqlAdaptiveSqlMetricUpdates,
    SqlExecutionStart, StageCompleted, TaskEnd, Versioned,
};
use sparkscope::process::{EventProcessor, Outcome};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn app_start() -> SparkEvent {
    SparkEvent::ApplicationStart(ApplicationStart {
        app_name: "nightly-etl".to_owned(),
        app_id: Some("app-20260825121500-0001".to_owned()),
        timestamp: 1_756_000_000_000,
        user: "svc-etl".to_owned(),
    })
}

fn environment_update(gpu: bool) -> SparkEvent {
    let mut spark_properties = HashMap::new();
    if gpu {
        spark_properties.insert(
            "spark.plugins".to_owned(),
            "com.nvidia.spark.SQLPlugin".to_owned(),
        );
    }
    SparkEvent::EnvironmentUpdate(EnvironmentUpdate {
        jvm_information: HashMap::new(),
        spark_properties,
        system_properties: HashMap::new(),
        classpath_entries: HashMap::new(),
    })
}

fn job_start_wire(job_id: u32, sql_id: &str) -> SparkEvent {
    let e: JobStart = serde_json::from_value(json!({
        "Job ID": job_id,
        "Submission Time": 1_756_000_001_000i64,
        "Stage IDs": [1, 2],
        "Properties": { "spark.sql.execution.id": sql_id }
    }))
    .unwrap();
    SparkEvent::JobStart(e)
}

fn stage_completed_wire(stage_id: u32, accumulables: serde_json::Value) -> SparkEvent {
    let e: StageCompleted = serde_json::from_value(json!({
        "Stage Info": {
            "Stage ID": stage_id,
            "Stage Attempt ID": 0,
            "Stage Name": "map at etl.scala:40",
            "Number of Tasks": 4,
            "Submission Time": 1_756_000_001_500i64,
            "Completion Time": 1_756_000_002_500i64,
            "Accumulables": accumulables
        }
    }))
    .unwrap();
    SparkEvent::StageCompleted(e)
}

fn task_end_wire(task_id: u64) -> SparkEvent {
    let e: TaskEnd = serde_json::from_value(json!({
        "Stage ID": 1,
        "Stage Attempt ID": 0,
        "Task Type": "ResultTask",
        "Task End Reason": { "Reason": "Success" },
        "Task Info": {
            "Task ID": task_id,
            "Index": 0,
            "Attempt": 0,
            "Launch Time": 1_756_000_001_600i64,
            "Finish Time": 1_756_000_002_100i64,
            "Executor ID": "1",
            "Host": "worker-0",
            "Locality": "PROCESS_LOCAL",
            "Speculative": false,
            "Getting Result Time": 0
        },
        "Task Metrics": {
            "Executor Deserialize Time": 5,
            "Executor Deserialize CPU Time": 4_900_000i64,
            "Executor Run Time": 480,
            "Executor CPU Time": 451_000_000i64,
            "Result Size": 2048,
            "JVM GC Time": 20,
            "Result Serialization Time": 2,
            "Memory Bytes Spilled": 0,
            "Disk Bytes Spilled": 0,
            "Peak Execution Memory": 67_108_864i64,
            "Input Metrics": { "Bytes Read": 1_048_576i64, "Records Read": 5000 },
            "Output Metrics": { "Bytes Written": 0, "Records Written": 0 },
            "Shuffle Read Metrics": {
                "Remote Blocks Fetched": 2,
                "Local Blocks Fetched": 2,
                "Fetch Wait Time": 1,
                "Remote Bytes Read": 4096,
                "Remote Bytes Read To Disk": 0,
                "Local Bytes Read": 4096,
                "Total Records Read": 200
            },
            "Shuffle Write Metrics": {
                "Shuffle Bytes Written": 8192,
                "Shuffle Write Time": 3_000_000i64,
                "Shuffle Records Written": 200
            }
        }
    }))
    .unwrap();
    SparkEvent::TaskEnd(e)
}

#[test]
fn assembles_model_from_full_stream() {
    init_tracing();
    let mut p = EventProcessor::new();

    p.process(&app_start());
    p.process(&environment_update(true));
    p.process(&SparkEvent::ResourceProfileAdded(Versioned::Supported(
        serde_json::from_value::<ResourceProfileAdded>(json!({
            "Resource Profile Id": 0,
            "Executor Resource Requests": {
                "gpu": {
                    "Resource Name": "gpu",
                    "Amount": 1,
                    "Discovery Script": "./getGpus.sh",
                    "Vendor": "nvidia.com"
                }
            },
            "Task Resource Requests": {
                "gpu": { "Resource Name": "gpu", "Amount": 0.25 }
            }
        }))
        .unwrap(),
    )));
    p.process(&job_start_wire(0, "7"));
    p.process(&SparkEvent::SqlExecutionStart(SqlExecutionStart {
        execution_id: 7,
        description: "insert into warehouse".to_owned(),
        details: String::new(),
        physical_plan_description: "planA".to_owned(),
        time: 1_756_000_000_500,
    }));
    p.process(&task_end_wire(0));
    p.process(&task_end_wire(1));
    p.process(&stage_completed_wire(
        1,
        json!([
            { "ID": 40, "Name": "internal.metrics.executorRunTime", "Update": 960, "Internal": true },
            { "ID": 41, "Name": "number of output rows", "Update": "10000", "Internal": false }
        ]),
    ));
    p.process(&SparkEvent::SqlAdaptiveExecutionUpdate(
        SqlAdaptiveExecutionUpdate {
            execution_id: 7,
            physical_plan_description: "planB".to_owned(),
        },
    ));
    p.process(&SparkEvent::SqlAdaptiveSqlMetricUpdates(
        serde_json::from_value::<SqlAdaptiveSqlMetricUpdates>(json!({
            "executionId": 7,
            "sqlPlanMetrics": [
                { "name": "number of output rows", "accumulatorId": 41, "metricType": "sum" }
            ]
        }))
        .unwrap(),
    ));
    p.process(&SparkEvent::BlockManagerRemoved(
        serde_json::from_value::<BlockManagerRemoved>(json!({
            "Block Manager ID": { "Executor ID": "1", "Host": "worker-0", "Port": 7337 },
            "Timestamp": 1_756_000_003_000i64
        }))
        .unwrap(),
    ));
    p.process(&SparkEvent::JobEnd(JobEnd {
        job_id: 0,
        completion_time: 1_756_000_003_500,
        job_result: serde_json::from_value(json!({ "Result": "JobSucceeded" })).unwrap(),
    }));
    p.process(&SparkEvent::ApplicationEnd(ApplicationEnd {
        timestamp: 1_756_000_004_000,
    }));

    let model = p.into_model();

    // Application identity and lifetime.
    assert_eq!(model.application.name, "nightly-etl");
    assert_eq!(model.application.id, "app-20260825121500-0001");
    assert_eq!(model.application.end_time, Some(1_756_000_004_000));
    assert!(model.application.gpu_mode);
    assert!(model.application.plugin_enabled);

    // Job with SQL association and final result.
    let job = &model.jobs[&0];
    assert_eq!(job.sql_execution_id, Some(7));
    assert_eq!(job.stage_ids, vec![1, 2]);
    assert_eq!(job.job_result.as_deref(), Some("JobSucceeded"));
    assert_eq!(job.completion_time, Some(1_756_000_003_500));

    // Tasks: two appended records with converted CPU times.
    assert_eq!(model.tasks.len(), 2);
    let m = model.tasks[0].metrics.as_ref().unwrap();
    assert_eq!(m.executor_deserialize_cpu_time, 4); // 4_900_000 ns
    assert_eq!(m.executor_cpu_time, 451); // 451_000_000 ns
    assert_eq!(m.executor_run_time, 480);
    assert_eq!(m.shuffle_write.write_time, 3_000_000);
    assert_eq!(model.tasks[0].duration, 500);

    // Stage and its accumulators (one internal, one SQL metric).
    let stage = &model.stages[&(1, 0)];
    assert_eq!(stage.num_tasks, 4);
    assert!(stage.accumulator_ids.contains(&40));
    assert!(stage.accumulator_ids.contains(&41));
    assert_eq!(model.accum_metrics[&40][0].update, Some(960));
    assert_eq!(model.accum_metrics[&41][0].update, Some(10_000));
    assert_eq!(model.accum_stage[&40], 1);

    // Adaptive plan replaced the original.
    assert_eq!(model.sql_plans[&7], "planB");
    assert_eq!(model.sql_plan_metrics.len(), 1);
    assert_eq!(model.sql_plan_metrics[0].accumulator_id, 41);

    // Resource profile and block manager log.
    assert_eq!(model.resource_profiles[&0].executor_resources["gpu"].amount, 1);
    assert_eq!(model.block_managers_removed.len(), 1);
    assert_eq!(model.block_managers_removed[0].port, 7337);
}

#[test]
fn stream_survives_version_skew_and_unknown_events() {
    init_tracing();
    let mut p = EventProcessor::new();

    p.process(&app_start());

    // Engine predating resource profiles: probe fails, stream continues.
    let outcome = p.process(&SparkEvent::ResourceProfileAdded(Versioned::Unsupported {
        class: "org.apache.spark.scheduler.SparkListenerResourceProfileAdded".to_owned(),
    }));
    assert_eq!(outcome, Outcome::Unsupported);

    // Kinds this model does not consume are dropped quietly.
    let outcome = p.process(&SparkEvent::Other {
        kind: "SparkListenerExecutorMetricsUpdate".to_owned(),
    });
    assert_eq!(outcome, Outcome::Unrecognized);

    // A stage with one rotten accumulable keeps the other two.
    p.process(&stage_completed_wire(
        1,
        json!([
            { "ID": 50, "Name": "internal.metrics.executorRunTime", "Update": 10, "Internal": true },
            { "ID": 51, "Name": "internal.metrics.jvmGCTime", "Update": "garbage", "Internal": true },
            { "ID": 52, "Name": "internal.metrics.resultSize", "Update": 30, "Internal": true }
        ]),
    ));

    // Subsequent ordinary events still land.
    p.process(&job_start_wire(1, "not-a-number"));

    let model = p.model();
    assert!(model.resource_profiles.is_empty());
    assert_eq!(model.accum_metrics.len(), 2);
    assert!(model.accum_metrics.contains_key(&50));
    assert!(!model.accum_metrics.contains_key(&51));
    assert!(model.accum_metrics.contains_key(&52));
    assert_eq!(model.jobs[&1].sql_execution_id, None);
}
