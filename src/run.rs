use thiserror::Error;
use tracing::info;

use crate::billable::{WriteOutcome, update_billable_fields};
use crate::cancel::CancelToken;
use crate::clickup::{ClickUpClient, ClickUpError};
use crate::config::Config;
use crate::dates::ReportWindow;
use crate::models::{RawTimeEntry, Task, TimeEntry};
use crate::normalize::{assignee_ids, normalize_tasks, normalize_time_entries};
use crate::report::{self, AggregationResult};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    ClickUp(#[from] ClickUpError),
    #[error("invalid month: {0}")]
    InvalidMonth(u32),
    #[error("run cancelled")]
    Cancelled,
}

pub struct ReportRun {
    pub window_label: String,
    pub result: AggregationResult,
    pub write_outcomes: Vec<WriteOutcome>,
}

/// One full report run: per configured client, fetch and normalize tasks and
/// the previous month's time entries, then aggregate over the union of all
/// clients' data. Clients are processed sequentially in configuration order,
/// so concatenation is deterministic.
pub fn run_report(
    api: &ClickUpClient,
    config: &Config,
    selected_month: u32,
    refresh_billable: bool,
    cancel: &CancelToken,
) -> Result<ReportRun, RunError> {
    let window =
        ReportWindow::previous_month(selected_month).ok_or(RunError::InvalidMonth(selected_month))?;
    info!(window = window.label(), "building time-tracking report");

    let mut all_tasks: Vec<Task> = Vec::new();
    let mut all_entries: Vec<TimeEntry> = Vec::new();

    for client in &config.clients {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        let raw_tasks = api.fetch_tasks(client, cancel)?;
        let tasks = normalize_tasks(raw_tasks, &client.name);
        let assignees = assignee_ids(&tasks);
        let raw_entries = entries_for_assignees(&assignees, || {
            api.fetch_time_entries(client, window.start_ms(), window.end_ms(), &assignees)
        })?;
        let entries =
            normalize_time_entries(raw_entries, &config.developer_coefficients, &client.name);

        all_tasks.extend(tasks);
        all_entries.extend(entries);
    }

    let result = aggregate(&all_tasks, &all_entries);

    let write_outcomes = if refresh_billable {
        update_billable_fields(api, &result.final_report, &config.clients, &all_tasks)
    } else {
        Vec::new()
    };

    Ok(ReportRun {
        window_label: window.label().to_string(),
        result,
        write_outcomes,
    })
}

/// An empty assignee set means no entry can join to this client's tasks, so
/// the fetch is skipped instead of pulling the whole team's entries.
fn entries_for_assignees(
    assignees: &[u64],
    fetch: impl FnOnce() -> Result<Vec<RawTimeEntry>, ClickUpError>,
) -> Result<Vec<RawTimeEntry>, ClickUpError> {
    if assignees.is_empty() {
        info!("no assignees on tasks, skipping time entry fetch");
        return Ok(Vec::new());
    }
    fetch()
}

/// The three report views over one run's combined data.
pub fn aggregate(tasks: &[Task], entries: &[TimeEntry]) -> AggregationResult {
    let personal = report::personal_timereport(entries);
    let final_report = report::final_report(tasks, entries);
    let totals = report::totals(&final_report);
    AggregationResult {
        final_report,
        personal,
        totals,
    }
}
