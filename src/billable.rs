use tracing::{info, warn};

use crate::clickup::{ClickUpClient, ClickUpError};
use crate::config::Client;
use crate::models::Task;
use crate::normalize::{BILLABLE_HOURS_FIELD, custom_field_id};
use crate::report::FinalReportRow;

/// Per-row result of the billable write-back. One row's failure never stops
/// the others.
#[derive(Debug)]
pub enum WriteOutcome {
    Updated { task_id: String, value: String },
    SkippedNoClient { task_id: String },
    SkippedNoField { task_id: String },
    Failed { task_id: String, error: ClickUpError },
}

/// Writes `InvoicedHours + AdjustedDuration` into each reported task's
/// BillableHours custom field.
pub fn update_billable_fields(
    api: &ClickUpClient,
    final_report: &[FinalReportRow],
    clients: &[Client],
    tasks: &[Task],
) -> Vec<WriteOutcome> {
    update_with(final_report, clients, tasks, |task_id, field_id, value| {
        api.set_custom_field(task_id, field_id, value)
    })
}

fn update_with(
    final_report: &[FinalReportRow],
    clients: &[Client],
    tasks: &[Task],
    mut push: impl FnMut(&str, &str, &str) -> Result<(), ClickUpError>,
) -> Vec<WriteOutcome> {
    let mut outcomes = Vec::with_capacity(final_report.len());
    for row in final_report {
        let Some(client) = clients.iter().find(|client| client.name == row.client) else {
            warn!(task = %row.task_id, client = %row.client, "client not found, skipping update");
            outcomes.push(WriteOutcome::SkippedNoClient {
                task_id: row.task_id.clone(),
            });
            continue;
        };

        let field_id = tasks
            .iter()
            .find(|task| task.id == row.task_id && task.client == row.client)
            .and_then(|task| custom_field_id(&task.custom_fields, BILLABLE_HOURS_FIELD));
        let Some(field_id) = field_id else {
            warn!(
                task = %row.task_id,
                "BillableHours field not found, skipping update"
            );
            outcomes.push(WriteOutcome::SkippedNoField {
                task_id: row.task_id.clone(),
            });
            continue;
        };

        let value = (row.invoiced_hours + row.adjusted_duration).to_string();
        info!(
            task = row.custom_id.as_deref().unwrap_or(&row.task_id),
            value = %value,
            client = %client.name,
            "updating billable hours"
        );
        match push(&row.task_id, field_id, &value) {
            Ok(()) => outcomes.push(WriteOutcome::Updated {
                task_id: row.task_id.clone(),
                value,
            }),
            Err(error) => {
                warn!(task = %row.task_id, "billable update failed: {error}");
                outcomes.push(WriteOutcome::Failed {
                    task_id: row.task_id.clone(),
                    error,
                });
            }
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomFieldRef;

    fn client(name: &str) -> Client {
        Client {
            name: name.to_string(),
            team_id: "team".to_string(),
            list_id: "list".to_string(),
            contract_included: 0.0,
            toggl_sync_enabled: false,
            toggl_workspace_id: None,
        }
    }

    fn task(id: &str, client: &str, billable_field: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            custom_id: None,
            name: id.to_string(),
            parent: None,
            invoiced_hours: 0.0,
            billable_hours: None,
            custom_fields: billable_field
                .map(|field_id| {
                    vec![CustomFieldRef {
                        id: field_id.to_string(),
                        name: BILLABLE_HOURS_FIELD.to_string(),
                    }]
                })
                .unwrap_or_default(),
            assignee_ids: Vec::new(),
            client: client.to_string(),
        }
    }

    fn row(task_id: &str, client: &str, invoiced: f64, adjusted: f64) -> FinalReportRow {
        FinalReportRow {
            task_id: task_id.to_string(),
            name: task_id.to_string(),
            custom_id: None,
            adjusted_duration: adjusted,
            invoiced_hours: invoiced,
            client: client.to_string(),
        }
    }

    #[test]
    fn writes_invoiced_plus_adjusted() {
        let clients = vec![client("Insly")];
        let tasks = vec![task("a", "Insly", Some("field-1"))];
        let rows = vec![row("a", "Insly", 10.0, 2.5)];

        let mut pushed = Vec::new();
        let outcomes = update_with(&rows, &clients, &tasks, |task_id, field_id, value| {
            pushed.push((task_id.to_string(), field_id.to_string(), value.to_string()));
            Ok(())
        });

        assert_eq!(pushed, vec![("a".to_string(), "field-1".to_string(), "12.5".to_string())]);
        assert!(matches!(outcomes[0], WriteOutcome::Updated { .. }));
    }

    #[test]
    fn missing_client_skips_without_pushing() {
        let tasks = vec![task("a", "Insly", Some("field-1"))];
        let rows = vec![row("a", "Insly", 0.0, 1.0)];

        let outcomes = update_with(&rows, &[], &tasks, |_, _, _| {
            panic!("no update expected")
        });

        assert!(matches!(outcomes[0], WriteOutcome::SkippedNoClient { .. }));
    }

    #[test]
    fn missing_billable_field_skips_without_pushing() {
        let clients = vec![client("Insly")];
        let tasks = vec![task("a", "Insly", None)];
        let rows = vec![row("a", "Insly", 0.0, 1.0)];

        let outcomes = update_with(&rows, &clients, &tasks, |_, _, _| {
            panic!("no update expected")
        });

        assert!(matches!(outcomes[0], WriteOutcome::SkippedNoField { .. }));
    }

    #[test]
    fn one_failed_row_does_not_stop_the_rest() {
        let clients = vec![client("Insly")];
        let tasks = vec![
            task("a", "Insly", Some("field-1")),
            task("b", "Insly", Some("field-2")),
        ];
        let rows = vec![row("a", "Insly", 0.0, 1.0), row("b", "Insly", 0.0, 2.0)];

        let outcomes = update_with(&rows, &clients, &tasks, |task_id, _, _| {
            if task_id == "a" {
                Err(ClickUpError::Http {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        });

        assert!(matches!(outcomes[0], WriteOutcome::Failed { .. }));
        assert!(matches!(outcomes[1], WriteOutcome::Updated { .. }));
    }
}
