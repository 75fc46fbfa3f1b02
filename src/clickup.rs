use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::config::Client;
use crate::models::{RawTask, RawTimeEntry, TaskDetails, TaskPage, TimeEntriesResponse};

const BASE_URL: &str = "https://api.clickup.com/api/v2";
const MAX_GET_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ClickUpError {
    #[error("ClickUp API error: {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("run cancelled")]
    Cancelled,
}

pub struct ClickUpClient {
    http: HttpClient,
    token: String,
}

impl ClickUpClient {
    pub fn new(token: String) -> Result<Self, ClickUpError> {
        let http = HttpClient::builder()
            .user_agent("clickup2invoice")
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http, token })
    }

    /// All tasks of the client's list, across every page. Archived tasks are
    /// excluded, subtasks and closed tasks included.
    pub fn fetch_tasks(
        &self,
        client: &Client,
        cancel: &CancelToken,
    ) -> Result<Vec<RawTask>, ClickUpError> {
        let url = format!("{BASE_URL}/list/{}/task", client.list_id);
        collect_task_pages(cancel, |page| {
            info!(client = %client.name, page, "fetching tasks");
            self.get_with_retry(
                &url,
                &[
                    ("archived", "false".to_string()),
                    ("page", page.to_string()),
                    ("subtasks", "true".to_string()),
                    ("include_closed", "true".to_string()),
                ],
            )
        })
    }

    /// Time entries for the client's team in `[start_ms, end_ms]`, optionally
    /// restricted to a set of assignee ids.
    pub fn fetch_time_entries(
        &self,
        client: &Client,
        start_ms: i64,
        end_ms: i64,
        assignee_ids: &[u64],
    ) -> Result<Vec<RawTimeEntry>, ClickUpError> {
        info!(client = %client.name, start_ms, end_ms, "fetching time entries");
        let url = format!("{BASE_URL}/team/{}/time_entries", client.team_id);
        let mut params = vec![
            ("start_date", start_ms.to_string()),
            ("end_date", end_ms.to_string()),
            ("include_task_tags", "true".to_string()),
            ("list_id", client.list_id.clone()),
        ];
        if !assignee_ids.is_empty() {
            let assignee = assignee_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("assignee", assignee));
        }
        let response: TimeEntriesResponse = self.get_with_retry(&url, &params)?;
        Ok(response.data)
    }

    pub fn fetch_task_details(&self, task_id: &str) -> Result<TaskDetails, ClickUpError> {
        let url = format!("{BASE_URL}/task/{task_id}");
        self.get_with_retry(&url, &[])
    }

    /// Sets one custom field's value on a task. Never retried: the write is
    /// not safely repeatable once it may have landed.
    pub fn set_custom_field(
        &self,
        task_id: &str,
        field_id: &str,
        value: &str,
    ) -> Result<(), ClickUpError> {
        let url = format!("{BASE_URL}/task/{task_id}/field/{field_id}");
        let response = self
            .http
            .post(url)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "value": value }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClickUpError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn get_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClickUpError> {
        retrying(|| self.get(url, params))
    }

    fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClickUpError> {
        let response = self
            .http
            .get(url)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json")
            .query(params)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClickUpError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>()?)
    }
}

/// Accumulates task pages in order until the server signals the last page.
/// Pagination is inherently sequential: each request depends on knowing
/// whether the previous page was the last.
fn collect_task_pages(
    cancel: &CancelToken,
    mut fetch_page: impl FnMut(u32) -> Result<TaskPage, ClickUpError>,
) -> Result<Vec<RawTask>, ClickUpError> {
    let mut tasks = Vec::new();
    let mut page = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ClickUpError::Cancelled);
        }
        let task_page = fetch_page(page)?;
        tasks.extend(task_page.tasks);
        if task_page.last_page {
            return Ok(tasks);
        }
        page += 1;
    }
}

/// Runs a fetch up to `MAX_GET_ATTEMPTS` times with linear backoff between
/// transient failures. Once attempts are exhausted the last error is
/// returned. Only GETs go through here; writes are never retried.
fn retrying<T>(mut fetch: impl FnMut() -> Result<T, ClickUpError>) -> Result<T, ClickUpError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_GET_ATTEMPTS && is_transient(&err) => {
                warn!(attempt, "transient ClickUp error, retrying: {err}");
                thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)));
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_transient(err: &ClickUpError) -> bool {
    match err {
        ClickUpError::Http { status, .. } => *status >= 500 || *status == 429,
        ClickUpError::Network(_) => true,
        ClickUpError::Cancelled => false,
    }
}
