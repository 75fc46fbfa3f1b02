use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client as HttpClient;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::clickup::{ClickUpClient, ClickUpError};
use crate::config::Client;
use crate::models::{NewTogglEntry, SyncEntry, TogglTask, TogglTasksResponse};
use crate::normalize::{coerce_i64, custom_field_value};
use crate::overlap::shift_overlaps;

const BASE_URL: &str = "https://api.track.toggl.com/api/v9";
pub const TOGGL_TASK_NAME_FIELD: &str = "Toggl Task Name";

#[derive(Debug, Error)]
pub enum TogglError {
    #[error("Toggl API error: {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub struct TogglClient {
    http: HttpClient,
    token: String,
}

impl TogglClient {
    pub fn new(token: String) -> Result<Self, TogglError> {
        let http = HttpClient::builder()
            .user_agent("clickup2invoice")
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http, token })
    }

    /// Active tasks of a workspace, sorted by name. One page of up to 1000 is
    /// plenty for the workspaces this tool syncs into.
    pub fn fetch_tasks(&self, workspace_id: &str) -> Result<Vec<TogglTask>, TogglError> {
        let url = format!("{BASE_URL}/workspaces/{workspace_id}/tasks");
        let response = self
            .http
            .get(url)
            .header("Content-Type", "application/json")
            .header("Authorization", self.basic_auth())
            .query(&[
                ("page", "1"),
                ("per_page", "1000"),
                ("sort_order", "ASC"),
                ("sort_field", "name"),
                ("active", "true"),
            ])
            .send()?;
        let response = check_status(response)?;
        Ok(response.json::<TogglTasksResponse>()?.data)
    }

    pub fn create_time_entry(
        &self,
        workspace_id: &str,
        entry: &NewTogglEntry,
    ) -> Result<(), TogglError> {
        let url = format!("{BASE_URL}/workspaces/{workspace_id}/time_entries");
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", self.basic_auth())
            .json(entry)
            .send()?;
        check_status(response)?;
        Ok(())
    }

    fn basic_auth(&self) -> String {
        let credentials = STANDARD.encode(format!("{}:api_token", self.token));
        format!("Basic {credentials}")
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, TogglError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(TogglError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    ClickUp(#[from] ClickUpError),
    #[error(transparent)]
    Toggl(#[from] TogglError),
    #[error("run cancelled")]
    Cancelled,
}

/// Per-entry sync result, surfaced to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncRecord {
    Synced {
        client: String,
        task_name: String,
        task_link: String,
        toggl_task_name: String,
    },
    Error {
        client: String,
        task_name: String,
        task_link: String,
        toggl_task_name: Option<String>,
        reason: String,
    },
}

#[derive(Debug)]
pub enum SyncReport {
    /// Nothing to report: every entry of every sync-enabled client went
    /// through.
    AllSynced,
    Records(Vec<SyncRecord>),
}

/// Pushes ClickUp time entries in `[start_ms, end_ms]` into Toggl for every
/// sync-enabled client: resolves each task's "Toggl Task Name" custom field,
/// de-overlaps entries per task, then creates one Toggl entry per ClickUp
/// entry.
pub fn sync_clickup_to_toggl(
    clickup: &ClickUpClient,
    toggl: &TogglClient,
    clients: &[Client],
    start_ms: i64,
    end_ms: i64,
    cancel: &CancelToken,
) -> Result<SyncReport, SyncError> {
    let mut records = Vec::new();

    for client in clients.iter().filter(|client| client.toggl_sync_enabled) {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let Some(workspace_id) = client.toggl_workspace_id.as_deref() else {
            continue;
        };
        info!(client = %client.name, "syncing time entries to Toggl");

        let raw_entries = clickup.fetch_time_entries(client, start_ms, end_ms, &[])?;
        let mut entries = Vec::with_capacity(raw_entries.len());
        for raw in raw_entries {
            let Some(task) = raw.task else {
                warn!(client = %client.name, "time entry has no task, skipping sync");
                continue;
            };
            let duration_ms = coerce_i64(raw.duration.as_ref()).unwrap_or(0);
            let start = coerce_i64(raw.start.as_ref()).unwrap_or(0);
            let end = coerce_i64(raw.end.as_ref()).unwrap_or(start + duration_ms);
            entries.push(SyncEntry {
                task_id: task.id,
                task_name: task.name,
                duration_ms,
                start_ms: start,
                end_ms: end,
                toggl_task_name: None,
            });
        }

        let names = resolve_toggl_task_names(clickup, &entries, cancel)?;
        for entry in &mut entries {
            entry.toggl_task_name = names.get(&entry.task_id).cloned().flatten();
        }

        let shifted = deoverlap_per_task(entries);
        let toggl_tasks = toggl.fetch_tasks(workspace_id)?;
        records.extend(sync_entries(
            shifted,
            &toggl_tasks,
            &client.name,
            workspace_id,
            |payload| toggl.create_time_entry(workspace_id, payload),
        ));
    }

    if records.is_empty() {
        Ok(SyncReport::AllSynced)
    } else {
        Ok(SyncReport::Records(records))
    }
}

/// "Toggl Task Name" custom field per distinct task, fetched once per task.
fn resolve_toggl_task_names(
    clickup: &ClickUpClient,
    entries: &[SyncEntry],
    cancel: &CancelToken,
) -> Result<HashMap<String, Option<String>>, SyncError> {
    let mut names: HashMap<String, Option<String>> = HashMap::new();
    for entry in entries {
        if names.contains_key(&entry.task_id) {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let details = clickup.fetch_task_details(&entry.task_id)?;
        let name = custom_field_value(&details.custom_fields, TOGGL_TASK_NAME_FIELD)
            .and_then(|value| value.as_str())
            .map(str::to_string);
        names.insert(entry.task_id.clone(), name);
    }
    Ok(names)
}

/// Groups entries per task in encounter order and de-overlaps each group
/// independently. Entries of different tasks may still overlap.
fn deoverlap_per_task(entries: Vec<SyncEntry>) -> Vec<SyncEntry> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<SyncEntry>> = Vec::new();
    for entry in entries {
        let position = *index.entry(entry.task_id.clone()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[position].push(entry);
    }
    groups.into_iter().flat_map(shift_overlaps).collect()
}

fn find_toggl_task<'a>(tasks: &'a [TogglTask], name: &str) -> Option<&'a TogglTask> {
    tasks.iter().find(|task| task.name == name)
}

fn sync_entries(
    entries: Vec<SyncEntry>,
    toggl_tasks: &[TogglTask],
    client_name: &str,
    workspace_id: &str,
    mut push: impl FnMut(&NewTogglEntry) -> Result<(), TogglError>,
) -> Vec<SyncRecord> {
    let workspace_num: u64 = workspace_id.parse().unwrap_or(0);
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let task_link = format!("https://app.clickup.com/t/{}", entry.task_id);

        let toggl_task_name = match entry.toggl_task_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => {
                records.push(SyncRecord::Error {
                    client: client_name.to_string(),
                    task_name: entry.task_name.clone(),
                    task_link,
                    toggl_task_name: None,
                    reason: "Toggl Task Name is not filled".to_string(),
                });
                continue;
            }
        };

        let Some(toggl_task) = find_toggl_task(toggl_tasks, toggl_task_name) else {
            records.push(SyncRecord::Error {
                client: client_name.to_string(),
                task_name: entry.task_name.clone(),
                task_link,
                toggl_task_name: Some(toggl_task_name.to_string()),
                reason: "No matching Toggl task found".to_string(),
            });
            continue;
        };

        let start = chrono::DateTime::from_timestamp_millis(entry.start_ms)
            .map(|datetime| datetime.to_rfc3339())
            .unwrap_or_default();
        let payload = NewTogglEntry {
            description: format!("{} - {}", entry.task_name, task_link),
            workspace_id: workspace_num,
            project_id: toggl_task.project_id,
            task_id: toggl_task.id,
            duration: entry.duration_ms / 1000,
            start,
            created_with: "ClickUp Sync".to_string(),
            billable: false,
        };

        match push(&payload) {
            Ok(()) => records.push(SyncRecord::Synced {
                client: client_name.to_string(),
                task_name: entry.task_name.clone(),
                task_link,
                toggl_task_name: toggl_task_name.to_string(),
            }),
            Err(err) => records.push(SyncRecord::Error {
                client: client_name.to_string(),
                task_name: entry.task_name.clone(),
                task_link,
                toggl_task_name: Some(toggl_task_name.to_string()),
                reason: format!("Failed to sync: {err}"),
            }),
        }
    }
    records
}
