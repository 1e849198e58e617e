use std::io::{self, Write};

use serde::Serialize;

use crate::oracle::Freshness;
use crate::sync::{ItemOutcome, SyncPlan, SyncReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub items: Vec<PlanEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub id: String,
    pub present: bool,
    pub decision: Freshness,
}

impl From<&SyncPlan> for PlanReport {
    fn from(plan: &SyncPlan) -> Self {
        Self {
            items: plan
                .items
                .iter()
                .map(|item| PlanEntry {
                    id: item.id.to_string(),
                    present: item.is_present(),
                    decision: plan.freshness(&item.id),
                })
                .collect(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_sync(report: &SyncReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_plan(report: &PlanReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_sync(report: &SyncReport) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        println!("{cyan}workshop-sync summary{reset}");
        for item in &report.items {
            match item.outcome {
                ItemOutcome::UpToDate => println!("{green}  = {} up to date{reset}", item.id),
                ItemOutcome::Fetched => println!("{cyan}  + {} fetched{reset}", item.id),
                ItemOutcome::Failed => println!(
                    "{red}  x {} {}{reset}",
                    item.id,
                    item.message.as_deref().unwrap_or("failed")
                ),
            }
        }
        println!("{green}Fetched: {}{reset}", report.fetched);
        println!("{green}Up to date: {}{reset}", report.up_to_date);
        let failed_color = if report.failed > 0 { red } else { green };
        println!("{failed_color}Failed: {}{reset}", report.failed);
        if let Some(warning) = &report.cleanup_warning {
            println!("{yellow}Warning: {warning}{reset}");
        }
    }

    pub fn print_plan(report: &PlanReport) {
        for entry in &report.items {
            let decision = match entry.decision {
                Freshness::Fresh => "fresh",
                Freshness::NeedsFetch => "needs fetch",
            };
            println!("{} {}", entry.id, decision);
        }
    }
}
