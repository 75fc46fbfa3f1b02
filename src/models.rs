use serde::{Deserialize, Serialize};
use serde_json::Value;

// Wire types mirroring the ClickUp v2 JSON payloads. Fields that ClickUp
// serves as strings even when numeric (durations, epoch timestamps, custom
// field values) are kept as `Value` and coerced during normalization.

#[derive(Debug, Clone, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<RawTask>,
    pub last_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub id: String,
    #[serde(default)]
    pub custom_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub assignees: Vec<RawAssignee>,
    #[serde(default)]
    pub custom_fields: Vec<RawCustomField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAssignee {
    pub id: u64,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCustomField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeEntriesResponse {
    pub data: Vec<RawTimeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTimeEntry {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub task: Option<RawTaskRef>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub start: Option<Value>,
    #[serde(default)]
    pub end: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTaskRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub username: String,
}

/// Single-task detail response, used by the Toggl sync path to read the
/// "Toggl Task Name" custom field.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDetails {
    pub id: String,
    #[serde(default)]
    pub custom_fields: Vec<RawCustomField>,
}

// Toggl wire types.

#[derive(Debug, Clone, Deserialize)]
pub struct TogglTasksResponse {
    pub data: Vec<TogglTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TogglTask {
    pub id: u64,
    pub name: String,
    pub project_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTogglEntry {
    pub description: String,
    pub workspace_id: u64,
    pub project_id: u64,
    pub task_id: u64,
    pub duration: i64,
    pub start: String,
    pub created_with: String,
    pub billable: bool,
}

// Normalized entities. Immutable once built; every record carries the owning
// client's name so multi-client unions stay joinable.

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub custom_id: Option<String>,
    pub name: String,
    /// Absent means the task is its own top-level parent.
    pub parent: Option<String>,
    pub invoiced_hours: f64,
    pub billable_hours: Option<f64>,
    /// Custom field id/name pairs, kept only so the billable-field writer can
    /// resolve the external field identifier by name.
    pub custom_fields: Vec<CustomFieldRef>,
    pub assignee_ids: Vec<u64>,
    pub client: String,
}

#[derive(Debug, Clone)]
pub struct CustomFieldRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TimeEntry {
    pub id: String,
    pub task_id: String,
    pub task_name: String,
    pub username: String,
    pub duration_ms: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Raw logged hours.
    pub total_duration: f64,
    /// Logged hours divided by the developer's coefficient.
    pub adjusted_duration: f64,
    pub client: String,
}

/// Time entry as seen by the Toggl sync path: no coefficients applied, but
/// the task's "Toggl Task Name" custom field resolved alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEntry {
    pub task_id: String,
    pub task_name: String,
    pub duration_ms: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub toggl_task_name: Option<String>,
}
