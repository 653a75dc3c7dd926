// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Offline verification of what a collector received and what a node
//! still holds on disk.

mod input;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_kernel::correlation;
use pulse_kernel::model::{LogEvent, RumEvent, SessionPlan, SpanEvent};
use pulse_kernel::session::{self, ValidationOptions};
use pulse_kernel::EventCategory;
use report::{LinksReport, RumCheck, SessionsReport};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild RUM sessions from a recorded body and check their consistency
    Sessions {
        /// RUM body as received by the collector (JSON array or NDJSON)
        file: PathBuf,

        /// Session plan every event must report
        #[arg(long, default_value_t = 1)]
        plan: u8,
    },

    /// Check that every linked log points at a delivered span
    Links {
        #[arg(long)]
        spans: PathBuf,

        #[arg(long)]
        logs: PathBuf,
    },

    /// List the segments of a node storage directory
    Inspect {
        /// Storage root holding one directory per category
        dir: PathBuf,

        /// Restrict to one category (logs, traces, rum)
        #[arg(long, value_parser = parse_category)]
        category: Option<EventCategory>,
    },
}

fn parse_category(value: &str) -> std::result::Result<EventCategory, String> {
    EventCategory::ALL
        .into_iter()
        .find(|c| c.as_str() == value)
        .ok_or_else(|| format!("unknown category `{}`", value))
}

#[derive(Serialize)]
struct CategoryReport {
    category: EventCategory,
    segments: Vec<input::SegmentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rum: Option<RumCheck>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Sessions { file, plan } => sessions(&file, plan),
        Command::Links { spans, logs } => links(&spans, &logs),
        Command::Inspect { dir, category } => inspect(&dir, category),
    }
}

fn sessions(file: &Path, plan: u8) -> Result<()> {
    eprintln!("Reconstructing sessions from {}", file.display());
    let events: Vec<RumEvent> = input::load_records(file)?;
    let options = ValidationOptions {
        expected_plan: SessionPlan(plan),
    };

    let sessions = session::reconstruct_with(&events, &options)
        .with_context(|| format!("{} events failed the consistency check", events.len()))?;

    eprintln!("{} events, {} sessions consistent", events.len(), sessions.len());
    print_json(&SessionsReport::new(&sessions))
}

fn links(spans_path: &Path, logs_path: &Path) -> Result<()> {
    let spans: Vec<SpanEvent> = input::load_records(spans_path)?;
    let logs: Vec<LogEvent> = input::load_records(logs_path)?;
    eprintln!("Linking {} logs against {} spans", logs.len(), spans.len());

    let links = correlation::link_logs(&spans, &logs).context("Log correlation failed")?;

    eprintln!("{} linked logs resolved", links.len());
    print_json(&LinksReport::new(spans.len(), logs.len(), &links))
}

fn inspect(dir: &Path, only: Option<EventCategory>) -> Result<()> {
    let mut reports = Vec::new();
    for category in EventCategory::ALL {
        if only.is_some_and(|c| c != category) {
            continue;
        }
        let category_dir = dir.join(category.as_str());
        if !category_dir.is_dir() {
            if only.is_some() {
                anyhow::bail!("No {} queue under {}", category, dir.display());
            }
            continue;
        }

        let segments = input::scan_category(&category_dir, category)?;
        let rum = (category == EventCategory::Rum).then(|| check_rum(&segments));
        reports.push(CategoryReport { category, segments, rum });
    }

    if reports.is_empty() {
        anyhow::bail!("No queue directories under {}", dir.display());
    }
    print_json(&reports)
}

fn check_rum(segments: &[input::SegmentSummary]) -> RumCheck {
    let mut events = Vec::new();
    for record in segments.iter().flat_map(|s| s.payloads.iter()) {
        match serde_json::from_slice::<RumEvent>(record) {
            Ok(event) => events.push(event),
            Err(e) => return RumCheck::Undecodable { detail: e.to_string() },
        }
    }

    match session::reconstruct(&events) {
        Ok(sessions) => RumCheck::Consistent {
            sessions: sessions.len(),
            visits: sessions.iter().map(|s| s.view_visits().len()).sum(),
        },
        Err(e) => RumCheck::Inconsistent {
            reason: e.reason(),
            detail: e.to_string(),
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
