use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

use crate::models::{Task, TimeEntry};

/// One task row of the invoicing report. `task_id` is always a top-level
/// parent: subtask time has already been rolled up onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReportRow {
    pub task_id: String,
    pub name: String,
    pub custom_id: Option<String>,
    pub adjusted_duration: f64,
    pub invoiced_hours: f64,
    pub client: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalRow {
    pub username: String,
    pub client: String,
    pub adjusted_duration: f64,
    pub total_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientTotal {
    pub client: String,
    pub adjusted_duration: f64,
}

/// The three derived views of one report run.
#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub final_report: Vec<FinalReportRow>,
    pub personal: Vec<PersonalRow>,
    pub totals: Vec<ClientTotal>,
}

/// Nearest half hour, rounding halves away from zero.
pub fn round_half_hours(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

/// Hours per developer per client, sorted by client ascending then adjusted
/// duration descending. The sort is stable, so exact ties keep their
/// encounter order.
pub fn personal_timereport(entries: &[TimeEntry]) -> Vec<PersonalRow> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut rows: Vec<PersonalRow> = Vec::new();
    for entry in entries {
        let key = (entry.username.clone(), entry.client.clone());
        let position = *index.entry(key).or_insert_with(|| {
            rows.push(PersonalRow {
                username: entry.username.clone(),
                client: entry.client.clone(),
                adjusted_duration: 0.0,
                total_duration: 0.0,
            });
            rows.len() - 1
        });
        rows[position].adjusted_duration += entry.adjusted_duration;
        rows[position].total_duration += entry.total_duration;
    }

    rows.sort_by(|a, b| {
        a.client.cmp(&b.client).then_with(|| {
            b.adjusted_duration
                .partial_cmp(&a.adjusted_duration)
                .unwrap_or(Ordering::Equal)
        })
    });
    rows
}

/// Joins time entries to tasks on (task id, client), rolls every task's time
/// onto its top-level parent, rounds to the half hour and joins back the
/// parent's name, custom id and invoiced hours. Tasks without any rolled-up
/// time contribute no row at all.
pub fn final_report(tasks: &[Task], entries: &[TimeEntry]) -> Vec<FinalReportRow> {
    let mut entry_sums: HashMap<(&str, &str), f64> = HashMap::new();
    for entry in entries {
        *entry_sums
            .entry((entry.task_id.as_str(), entry.client.as_str()))
            .or_insert(0.0) += entry.adjusted_duration;
    }

    let task_index: HashMap<(&str, &str), &Task> = tasks
        .iter()
        .map(|task| ((task.id.as_str(), task.client.as_str()), task))
        .collect();

    // One row per task that has time, keyed by its top-level parent. Rounding
    // happens here, per child, before children merge onto the parent.
    struct ChildRow<'a> {
        parent: &'a str,
        client: &'a str,
        adjusted: f64,
    }

    let mut child_rows = Vec::new();
    for task in tasks {
        let adjusted = entry_sums
            .get(&(task.id.as_str(), task.client.as_str()))
            .copied()
            .unwrap_or(0.0);
        if adjusted == 0.0 {
            continue;
        }
        let parent = task.parent.as_deref().unwrap_or(task.id.as_str());
        if !task_index.contains_key(&(parent, task.client.as_str())) {
            warn!(
                task = %task.id,
                parent,
                client = %task.client,
                "parent does not resolve to a task of the same client, dropping row"
            );
            continue;
        }
        child_rows.push(ChildRow {
            parent,
            client: task.client.as_str(),
            adjusted: round_half_hours(adjusted),
        });
    }

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut report: Vec<FinalReportRow> = Vec::new();
    for row in child_rows {
        if let Some(position) = index.get(&(row.parent, row.client)) {
            report[*position].adjusted_duration += row.adjusted;
            continue;
        }
        let parent_task = task_index[&(row.parent, row.client)];
        index.insert((row.parent, row.client), report.len());
        report.push(FinalReportRow {
            task_id: parent_task.id.clone(),
            name: parent_task.name.clone(),
            custom_id: parent_task.custom_id.clone(),
            adjusted_duration: row.adjusted,
            invoiced_hours: parent_task.invoiced_hours,
            client: parent_task.client.clone(),
        });
    }

    // A task whose only time rounded down to zero is dropped, not reported
    // as a zero row.
    report.retain(|row| row.adjusted_duration != 0.0);

    report.sort_by(|a, b| {
        a.client.cmp(&b.client).then_with(|| {
            b.adjusted_duration
                .partial_cmp(&a.adjusted_duration)
                .unwrap_or(Ordering::Equal)
        })
    });
    report
}

/// Grand total of adjusted hours per client.
pub fn totals(final_report: &[FinalReportRow]) -> Vec<ClientTotal> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<ClientTotal> = Vec::new();
    for row in final_report {
        let position = *index.entry(row.client.clone()).or_insert_with(|| {
            rows.push(ClientTotal {
                client: row.client.clone(),
                adjusted_duration: 0.0,
            });
            rows.len() - 1
        });
        rows[position].adjusted_duration += row.adjusted_duration;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, name: &str, parent: Option<&str>, client: &str) -> Task {
        Task {
            id: id.to_string(),
            custom_id: Some(format!("{}-CID", id.to_uppercase())),
            name: name.to_string(),
            parent: parent.map(str::to_string),
            invoiced_hours: 0.0,
            billable_hours: None,
            custom_fields: Vec::new(),
            assignee_ids: Vec::new(),
            client: client.to_string(),
        }
    }

    fn entry(task_id: &str, username: &str, hours: f64, client: &str) -> TimeEntry {
        TimeEntry {
            id: format!("{task_id}-{username}"),
            task_id: task_id.to_string(),
            task_name: task_id.to_string(),
            username: username.to_string(),
            duration_ms: (hours * 3_600_000.0) as i64,
            start_ms: 0,
            end_ms: (hours * 3_600_000.0) as i64,
            total_duration: hours,
            adjusted_duration: hours,
            client: client.to_string(),
        }
    }

    #[test]
    fn round_half_hours_reference_behavior() {
        assert_eq!(round_half_hours(1.24), 1.0);
        assert_eq!(round_half_hours(1.25), 1.5);
        assert_eq!(round_half_hours(1.74), 1.5);
        assert_eq!(round_half_hours(1.75), 2.0);
        assert_eq!(round_half_hours(3.0), 3.0);
    }

    #[test]
    fn subtask_time_appears_only_under_the_parent() {
        let tasks = vec![
            task("a", "Parent", None, "Insly"),
            task("b", "Child", Some("a"), "Insly"),
        ];
        let entries = vec![entry("b", "dev", 3.0, "Insly")];

        let report = final_report(&tasks, &entries);

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].task_id, "a");
        assert_eq!(report[0].name, "Parent");
        assert_eq!(report[0].adjusted_duration, 3.0);
    }

    #[test]
    fn tasks_without_time_are_excluded_entirely() {
        let tasks = vec![
            task("a", "Parent with idle subtask", None, "Insly"),
            task("b", "Idle child", Some("a"), "Insly"),
            task("c", "Busy task", None, "Insly"),
        ];
        let entries = vec![entry("c", "dev", 1.0, "Insly")];

        let report = final_report(&tasks, &entries);

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].task_id, "c");
    }

    #[test]
    fn every_reported_duration_is_a_half_hour_multiple() {
        let tasks = vec![task("a", "A", None, "Insly"), task("b", "B", None, "Insly")];
        let entries = vec![
            entry("a", "dev", 1.2, "Insly"),
            entry("b", "dev", 2.6, "Insly"),
        ];

        for row in final_report(&tasks, &entries) {
            let doubled = row.adjusted_duration * 2.0;
            assert_eq!(doubled, doubled.round());
            assert!(row.adjusted_duration != 0.0);
        }
    }

    #[test]
    fn children_round_before_merging_onto_the_parent() {
        let tasks = vec![
            task("p", "Parent", None, "Insly"),
            task("c1", "Child 1", Some("p"), "Insly"),
            task("c2", "Child 2", Some("p"), "Insly"),
        ];
        let entries = vec![
            entry("c1", "dev", 0.25, "Insly"),
            entry("c2", "dev", 0.25, "Insly"),
        ];

        let report = final_report(&tasks, &entries);

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].task_id, "p");
        assert_eq!(report[0].adjusted_duration, 1.0);
    }

    #[test]
    fn rows_that_round_to_zero_are_dropped() {
        let tasks = vec![task("a", "Tiny", None, "Insly")];
        let entries = vec![entry("a", "dev", 0.2, "Insly")];
        assert!(final_report(&tasks, &entries).is_empty());
    }

    #[test]
    fn cross_client_parent_is_a_data_error() {
        let tasks = vec![
            task("p", "Parent", None, "Insly"),
            task("c", "Child", Some("p"), "CI"),
        ];
        let entries = vec![entry("c", "dev", 2.0, "CI")];
        assert!(final_report(&tasks, &entries).is_empty());
    }

    #[test]
    fn final_report_joins_back_custom_id_and_invoiced_hours() {
        let mut parent = task("a", "Parent", None, "Insly");
        parent.invoiced_hours = 10.0;
        let tasks = vec![parent, task("b", "Child", Some("a"), "Insly")];
        let entries = vec![entry("b", "dev", 2.0, "Insly")];

        let report = final_report(&tasks, &entries);

        assert_eq!(report[0].custom_id.as_deref(), Some("A-CID"));
        assert_eq!(report[0].invoiced_hours, 10.0);
    }

    #[test]
    fn final_report_sorted_by_client_then_duration_desc() {
        let tasks = vec![
            task("a", "A", None, "Zeta"),
            task("b", "B", None, "Alpha"),
            task("c", "C", None, "Alpha"),
        ];
        let entries = vec![
            entry("a", "dev", 1.0, "Zeta"),
            entry("b", "dev", 1.0, "Alpha"),
            entry("c", "dev", 4.0, "Alpha"),
        ];

        let report = final_report(&tasks, &entries);
        let keys: Vec<(&str, f64)> = report
            .iter()
            .map(|row| (row.client.as_str(), row.adjusted_duration))
            .collect();
        assert_eq!(keys, vec![("Alpha", 4.0), ("Alpha", 1.0), ("Zeta", 1.0)]);
    }

    #[test]
    fn personal_report_groups_and_sorts() {
        let entries = vec![
            entry("a", "slow dev", 1.0, "Zeta"),
            entry("a", "fast dev", 2.0, "Zeta"),
            entry("b", "fast dev", 1.0, "Alpha"),
            entry("a", "slow dev", 0.5, "Zeta"),
        ];

        let rows = personal_timereport(&entries);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].client, "Alpha");
        assert_eq!(rows[1].username, "fast dev");
        assert_eq!(rows[1].adjusted_duration, 2.0);
        assert_eq!(rows[2].username, "slow dev");
        assert_eq!(rows[2].adjusted_duration, 1.5);
        assert_eq!(rows[2].total_duration, 1.5);
    }

    #[test]
    fn personal_report_ties_keep_encounter_order() {
        let entries = vec![
            entry("a", "first", 1.0, "Insly"),
            entry("b", "second", 1.0, "Insly"),
            entry("c", "third", 1.0, "Insly"),
        ];

        let rows = personal_timereport(&entries);
        let names: Vec<&str> = rows.iter().map(|row| row.username.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn totals_sum_per_client() {
        let tasks = vec![
            task("a", "A", None, "Insly"),
            task("b", "B", None, "Insly"),
            task("c", "C", None, "CI"),
        ];
        let entries = vec![
            entry("a", "dev", 1.0, "Insly"),
            entry("b", "dev", 2.0, "Insly"),
            entry("c", "dev", 4.0, "CI"),
        ];

        let report = final_report(&tasks, &entries);
        let totals = totals(&report);

        assert_eq!(totals.len(), 2);
        let insly = totals.iter().find(|t| t.client == "Insly").unwrap();
        assert_eq!(insly.adjusted_duration, 3.0);
        let ci = totals.iter().find(|t| t.client == "CI").unwrap();
        assert_eq!(ci.adjusted_duration, 4.0);
    }
}
