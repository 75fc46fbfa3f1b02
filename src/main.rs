use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::error::Error;
use tracing_subscriber::EnvFilter;

mod billable;
mod cancel;
mod clickup;
mod config;
mod dates;
mod models;
mod normalize;
mod overlap;
mod report;
mod run;
mod toggl;

use cancel::CancelToken;
use config::Config;

#[derive(Parser)]
#[command(
    name = "clickup2invoice",
    version,
    about = "ClickUp time-tracking to invoice reports, with Toggl sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the invoicing report across all configured clients.
    Report {
        /// Reporting month (1-12); entries come from the month before it.
        #[arg(long)]
        month: u32,
        /// Write InvoicedHours + AdjustedDuration back to each task's
        /// BillableHours custom field.
        #[arg(long)]
        refresh_billable: bool,
    },
    /// Push ClickUp time entries into Toggl for sync-enabled clients.
    Sync {
        #[arg(long, value_parser = dates::parse_date)]
        start_date: NaiveDate,
        #[arg(long, value_parser = dates::parse_date)]
        end_date: NaiveDate,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let token = config::read_clickup_token()
        .ok_or("ClickUp token not found. Set CLICKUP_API_TOKEN or ~/.clickup2invoice-token.")?;
    let api = clickup::ClickUpClient::new(token)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    match cli.command {
        Command::Report {
            month,
            refresh_billable,
        } => {
            let run = run::run_report(&api, &config, month, refresh_billable, &cancel)?;
            print_report(&run);
        }
        Command::Sync {
            start_date,
            end_date,
        } => {
            if end_date < start_date {
                return Err("End date cannot be before start date.".into());
            }
            let toggl_token = config::read_toggl_token().ok_or(
                "Toggl token not found. Set TOGGL_API_TOKEN or ~/.clickup2invoice-toggl-token.",
            )?;
            let toggl = toggl::TogglClient::new(toggl_token)?;
            let window = dates::ReportWindow::from_bounds(start_date, end_date);
            let report = toggl::sync_clickup_to_toggl(
                &api,
                &toggl,
                &config.clients,
                window.start_ms(),
                window.end_ms(),
                &cancel,
            )?;
            print_sync(&report);
        }
    }

    Ok(())
}

fn print_report(run: &run::ReportRun) {
    println!("Final report ({})", run.window_label);
    println!(
        "{:<12} {:<12} {:<44} {:>7} {:>9}",
        "CLIENT", "CUSTOM ID", "TASK", "HOURS", "INVOICED"
    );
    for row in &run.result.final_report {
        println!(
            "{:<12} {:<12} {:<44} {:>7.1} {:>9.1}",
            row.client,
            row.custom_id.as_deref().unwrap_or("-"),
            row.name,
            row.adjusted_duration,
            row.invoiced_hours
        );
    }

    println!();
    println!("Personal report");
    println!(
        "{:<12} {:<28} {:>9} {:>7}",
        "CLIENT", "DEVELOPER", "ADJUSTED", "RAW"
    );
    for row in &run.result.personal {
        println!(
            "{:<12} {:<28} {:>9.2} {:>7.2}",
            row.client, row.username, row.adjusted_duration, row.total_duration
        );
    }

    println!();
    println!("Totals");
    for total in &run.result.totals {
        println!("{:<12} {:>7.1}", total.client, total.adjusted_duration);
    }

    if !run.write_outcomes.is_empty() {
        let updated = run
            .write_outcomes
            .iter()
            .filter(|outcome| matches!(outcome, billable::WriteOutcome::Updated { .. }))
            .count();
        println!();
        println!(
            "Billable fields updated: {updated}/{} rows",
            run.write_outcomes.len()
        );
    }
}

fn print_sync(report: &toggl::SyncReport) {
    match report {
        toggl::SyncReport::AllSynced => println!("All entries synced successfully"),
        toggl::SyncReport::Records(records) => {
            for record in records {
                match record {
                    toggl::SyncRecord::Synced {
                        client,
                        task_name,
                        toggl_task_name,
                        ..
                    } => println!("[ok]    {client}: {task_name} -> {toggl_task_name}"),
                    toggl::SyncRecord::Error {
                        client,
                        task_name,
                        task_link,
                        reason,
                        ..
                    } => println!("[error] {client}: {task_name} ({task_link}): {reason}"),
                }
            }
        }
    }
}
