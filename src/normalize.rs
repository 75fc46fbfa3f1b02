use serde_json::Value;
use tracing::warn;

use crate::config::CoefficientTable;
use crate::models::{CustomFieldRef, RawCustomField, RawTask, RawTimeEntry, Task, TimeEntry};

pub const INVOICED_HOURS_FIELD: &str = "InvoicedHours";
pub const BILLABLE_HOURS_FIELD: &str = "BillableHours";

const MS_PER_HOUR: f64 = 3_600_000.0;

/// First custom field whose name matches exactly.
pub fn custom_field_value<'a>(fields: &'a [RawCustomField], name: &str) -> Option<&'a Value> {
    fields
        .iter()
        .find(|field| field.name == name)
        .and_then(|field| field.value.as_ref())
}

pub fn custom_field_id<'a>(fields: &'a [CustomFieldRef], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|field| field.name == name)
        .map(|field| field.id.as_str())
}

/// Numbers pass through; numeric strings are parsed. Anything else is None.
pub fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub fn coerce_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub fn normalize_tasks(raw_tasks: Vec<RawTask>, client_name: &str) -> Vec<Task> {
    raw_tasks
        .into_iter()
        .map(|raw| {
            let invoiced_hours =
                coerce_f64(custom_field_value(&raw.custom_fields, INVOICED_HOURS_FIELD))
                    .unwrap_or(0.0);
            let billable_hours =
                coerce_f64(custom_field_value(&raw.custom_fields, BILLABLE_HOURS_FIELD));
            Task {
                id: raw.id,
                custom_id: raw.custom_id,
                name: raw.name,
                parent: raw.parent,
                invoiced_hours,
                billable_hours,
                custom_fields: raw
                    .custom_fields
                    .into_iter()
                    .map(|field| CustomFieldRef {
                        id: field.id,
                        name: field.name,
                    })
                    .collect(),
                assignee_ids: raw.assignees.iter().map(|assignee| assignee.id).collect(),
                client: client_name.to_string(),
            }
        })
        .collect()
}

/// Assignee ids across a client's tasks, deduplicated in encounter order.
pub fn assignee_ids(tasks: &[Task]) -> Vec<u64> {
    let mut seen = std::collections::HashSet::new();
    let mut ids = Vec::new();
    for task in tasks {
        for id in &task.assignee_ids {
            if seen.insert(*id) {
                ids.push(*id);
            }
        }
    }
    ids
}

/// Flattens raw time entries, derives raw and coefficient-adjusted hours.
/// Entries missing a task reference are dropped; a non-numeric duration
/// degrades to zero rather than poisoning the sums.
pub fn normalize_time_entries(
    raw_entries: Vec<RawTimeEntry>,
    coefficients: &CoefficientTable,
    client_name: &str,
) -> Vec<TimeEntry> {
    let mut entries = Vec::with_capacity(raw_entries.len());
    for raw in raw_entries {
        let id = coerce_string(raw.id.as_ref()).unwrap_or_default();
        let Some(task) = raw.task else {
            warn!(client = client_name, entry = %id, "time entry has no task, skipping");
            continue;
        };
        let username = raw.user.map(|user| user.username).unwrap_or_default();
        let duration_ms = match coerce_i64(raw.duration.as_ref()) {
            Some(duration) => duration,
            None => {
                warn!(
                    client = client_name,
                    entry = %id,
                    "time entry has non-numeric duration, counting as zero"
                );
                0
            }
        };
        let start_ms = coerce_i64(raw.start.as_ref()).unwrap_or(0);
        let end_ms = coerce_i64(raw.end.as_ref()).unwrap_or(start_ms + duration_ms);
        let total_duration = duration_ms as f64 / MS_PER_HOUR;
        let adjusted_duration = total_duration / coefficients.get(&username);
        entries.push(TimeEntry {
            id,
            task_id: task.id,
            task_name: task.name,
            username,
            duration_ms,
            start_ms,
            end_ms,
            total_duration,
            adjusted_duration,
            client: client_name.to_string(),
        });
    }
    entries
}
