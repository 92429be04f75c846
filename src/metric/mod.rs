//! Normalization of raw accumulator updates into typed metric records.
//!
//! Only a closed set of name conventions is treated as a task/stage
//! performance metric; everything else (driver-side counters, user
//! accumulators) is filtered out, which is not an error. A failure is
//! returned only when a recognized accumulable carries a value that does not
//! parse, and it carries enough context for the caller to log and move on.

use thiserror::Error;

use crate::event::{AccumValue, AccumulableInfo};

/// Engine-internal task metric accumulators all share this prefix.
const TASK_METRIC_PREFIX: &str = "internal.metrics.";

/// SQL operator metric names this model recognizes.
const SQL_METRIC_NAMES: &[&str] = &[
    "duration",
    "number of output rows",
    "number of files read",
    "size of files read",
    "data size",
    "peak memory",
    "spill size",
    "sort time",
    "scan time",
    "metadata time",
    "shuffle bytes written",
    "shuffle records written",
    "records read",
    "local bytes read",
    "remote bytes read",
    "fetch wait time",
    "time in aggregation build",
];

/// Which convention a recognized accumulable matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// `internal.metrics.*` task-level metric.
    TaskInternal,
    /// Named SQL operator metric.
    Sql,
}

impl MetricKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskInternal => "task_internal",
            Self::Sql => "sql",
        }
    }
}

/// A normalized stage/task accumulator metric.
///
/// `value` is the running total, `update` the delta carried on the event.
/// Either may be unset when the engine omitted it; unset is never coerced
/// to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAccumMetric {
    pub accumulator_id: i64,
    pub name: String,
    pub kind: MetricKind,
    pub value: Option<i64>,
    pub update: Option<i64>,
}

#[derive(Error, Debug)]
pub enum MetricError {
    #[error("accumulable {id} ({name}): unparsable value={value} update={update}")]
    UnparsableValue {
        id: i64,
        name: String,
        value: String,
        update: String,
    },
}

/// Normalize one raw accumulable.
///
/// `Ok(None)` means the accumulable is not a recognized performance metric
/// (a filter, not a failure).
pub fn normalize(acc: &AccumulableInfo) -> Result<Option<StageAccumMetric>, MetricError> {
    let Some(name) = acc.name.as_deref() else {
        return Ok(None);
    };
    let Some(kind) = classify(name) else {
        return Ok(None);
    };

    let value = match acc.value.as_ref() {
        None => None,
        Some(raw) => Some(parse_value(raw).ok_or_else(|| unparsable(acc, name))?),
    };
    let update = match acc.update.as_ref() {
        None => None,
        Some(raw) => Some(parse_value(raw).ok_or_else(|| unparsable(acc, name))?),
    };

    Ok(Some(StageAccumMetric {
        accumulator_id: acc.id,
        name: name.to_owned(),
        kind,
        value,
        update,
    }))
}

/// Match an accumulable name against the recognized conventions.
fn classify(name: &str) -> Option<MetricKind> {
    if name.starts_with(TASK_METRIC_PREFIX) {
        return Some(MetricKind::TaskInternal);
    }
    if SQL_METRIC_NAMES.contains(&name) {
        return Some(MetricKind::Sql);
    }
    None
}

/// Parse a present field value; `None` means it does not parse.
fn parse_value(raw: &AccumValue) -> Option<i64> {
    match raw {
        AccumValue::Int(v) => Some(*v),
        AccumValue::Text(s) => s.trim().parse::<i64>().ok(),
    }
}

fn unparsable(acc: &AccumulableInfo, name: &str) -> MetricError {
    MetricError::UnparsableValue {
        id: acc.id,
        name: name.to_owned(),
        value: render(acc.value.as_ref()),
        update: render(acc.update.as_ref()),
    }
}

fn render(raw: Option<&AccumValue>) -> String {
    match raw {
        None => "<unset>".to_owned(),
        Some(v) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accum(id: i64, name: &str, update: Option<AccumValue>, value: Option<AccumValue>) -> AccumulableInfo {
        AccumulableInfo {
            id,
            name: Some(name.to_owned()),
            update,
            value,
            internal: name.starts_with(TASK_METRIC_PREFIX),
        }
    }

    #[test]
    fn test_internal_metric_normalizes() {
        let acc = accum(
            7,
            "internal.metrics.executorRunTime",
            Some(AccumValue::Int(120)),
            Some(AccumValue::Text("4500".to_owned())),
        );
        let m = normalize(&acc).unwrap().unwrap();
        assert_eq!(m.accumulator_id, 7);
        assert_eq!(m.kind, MetricKind::TaskInternal);
        assert_eq!(m.update, Some(120));
        assert_eq!(m.value, Some(4500));
    }

    #[test]
    fn test_sql_metric_normalizes() {
        let acc = accum(
            88,
            "number of output rows",
            Some(AccumValue::Int(10)),
            Some(AccumValue::Int(1000)),
        );
        let m = normalize(&acc).unwrap().unwrap();
        assert_eq!(m.kind, MetricKind::Sql);
        assert_eq!(m.kind.as_str(), "sql");
    }

    #[test]
    fn test_unrelated_accumulable_is_filtered_not_failed() {
        let acc = accum(3, "my user counter", Some(AccumValue::Int(1)), None);
        assert_eq!(normalize(&acc).unwrap(), None);
    }

    #[test]
    fn test_nameless_accumulable_is_filtered() {
        let acc = AccumulableInfo {
            id: 4,
            name: None,
            update: Some(AccumValue::Int(1)),
            value: None,
            internal: false,
        };
        assert_eq!(normalize(&acc).unwrap(), None);
    }

    #[test]
    fn test_absent_fields_stay_unset() {
        let acc = accum(5, "internal.metrics.jvmGCTime", None, None);
        let m = normalize(&acc).unwrap().unwrap();
        assert_eq!(m.value, None);
        assert_eq!(m.update, None);
    }

    #[test]
    fn test_unparsable_value_carries_context() {
        let acc = accum(
            6,
            "internal.metrics.resultSize",
            Some(AccumValue::Text("12 ms".to_owned())),
            Some(AccumValue::Int(9)),
        );
        let err = normalize(&acc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("accumulable 6"));
        assert!(msg.contains("internal.metrics.resultSize"));
        assert!(msg.contains("12 ms"));
        assert!(msg.contains("value=9"));
    }

    #[test]
    fn test_stringified_number_with_whitespace_parses() {
        let acc = accum(
            8,
            "duration",
            Some(AccumValue::Text(" 42 ".to_owned())),
            None,
        );
        let m = normalize(&acc).unwrap().unwrap();
        assert_eq!(m.update, Some(42));
    }
}
