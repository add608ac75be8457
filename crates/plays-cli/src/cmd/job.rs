use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use plays_core::job::{Job, JobDraft};
use plays_core::types::JobStatus;

use super::{block_on, open_engine};
use crate::output::{print_json, print_table, timestamp};

#[derive(Subcommand)]
pub enum JobSubcommand {
    /// Create a job for a playbook
    Create {
        playbook_id: u64,
        /// User id the job is assigned to
        #[arg(long, default_value_t = 0)]
        assign: u64,
        /// Planned start time (RFC 3339)
        #[arg(long, value_name = "TIME")]
        start_time: Option<String>,
        /// Run the playbook immediately
        #[arg(long)]
        run: bool,
    },
    /// List jobs
    List {
        /// Only jobs in this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a job and its last run
    Show {
        id: u64,
        /// Print the captured tool output
        #[arg(long)]
        output: bool,
    },
    /// Run a planned job's playbook now
    Run { id: u64 },
    /// Archive a job
    Archive { id: u64 },
    /// Reassign a planned job
    Assign { id: u64, user: u64 },
    /// Set or clear a planned job's start time
    StartTime {
        id: u64,
        /// RFC 3339 timestamp; omit to clear
        time: Option<String>,
    },
    /// Delete a job
    Remove { id: u64 },
}

pub fn run(root: &Path, subcmd: JobSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        JobSubcommand::Create {
            playbook_id,
            assign,
            start_time,
            run,
        } => create(root, playbook_id, assign, start_time.as_deref(), run, json),
        JobSubcommand::List { status } => list(root, status.as_deref(), json),
        JobSubcommand::Show { id, output } => show(root, id, output, json),
        JobSubcommand::Run { id } => run_job(root, id, json),
        JobSubcommand::Archive { id } => archive(root, id, json),
        JobSubcommand::Assign { id, user } => assign(root, id, user, json),
        JobSubcommand::StartTime { id, time } => start_time(root, id, time.as_deref(), json),
        JobSubcommand::Remove { id } => remove(root, id, json),
    }
}

fn parse_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid start time '{value}' (expected RFC 3339)"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn print_summary(job: &Job, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(job)
    } else {
        println!("Job {} (playbook {}): {}", job.id, job.playbook_id, job.status);
        Ok(())
    }
}

/// Report a job that has just been run; a failed run is a command failure.
fn report_run(job: &Job, json: bool) -> anyhow::Result<()> {
    print_summary(job, json)?;
    if job.status == JobStatus::Failed {
        let reason = job
            .last_run
            .as_ref()
            .and_then(|run| run.error.as_deref())
            .unwrap_or("unknown error");
        bail!("job {} failed: {}", job.id, reason.trim());
    }
    Ok(())
}

fn create(
    root: &Path,
    playbook_id: u64,
    assigned_to: u64,
    start_time: Option<&str>,
    run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let start_time = start_time.map(parse_time).transpose()?;
    let engine = open_engine(root)?;
    let draft = JobDraft {
        playbook_id,
        assigned_to,
        status: if run {
            JobStatus::Running
        } else {
            JobStatus::Planned
        },
        start_time,
    };
    let job = block_on(&engine, engine.create_job(draft))??;
    if run {
        report_run(&job, json)
    } else {
        print_summary(&job, json)
    }
}

fn list(root: &Path, status: Option<&str>, json: bool) -> anyhow::Result<()> {
    let filter = status.map(str::parse::<JobStatus>).transpose()?;
    let engine = open_engine(root)?;
    let jobs: Vec<Job> = engine
        .list_jobs()
        .into_iter()
        .filter(|j| filter.map_or(true, |s| j.status == s))
        .collect();

    if json {
        return print_json(&jobs);
    }
    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }

    let rows = jobs
        .iter()
        .map(|j| {
            vec![
                j.id.to_string(),
                j.playbook_id.to_string(),
                j.status.to_string(),
                j.assigned_to.to_string(),
                timestamp(j.start_time),
                timestamp(j.last_run.as_ref().map(|r| r.finished_at)),
            ]
        })
        .collect();
    print_table(
        &["ID", "PLAYBOOK", "STATUS", "ASSIGNED", "START", "LAST RUN"],
        rows,
    );
    Ok(())
}

fn show(root: &Path, id: u64, output: bool, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let job = engine.get_job(id)?;

    if json {
        return print_json(&job);
    }

    println!("Job:         {}", job.id);
    println!("Playbook:    {}", job.playbook_id);
    println!("Status:      {}", job.status);
    println!("Assigned to: {}", job.assigned_to);
    println!("Start time:  {}", timestamp(job.start_time));
    println!("Created:     {}", timestamp(Some(job.created_at)));
    println!("History:");
    for entry in &job.status_history {
        println!("  {:<9} {}", entry.status.as_str(), timestamp(Some(entry.entered)));
    }
    if let Some(run) = &job.last_run {
        let exit = run
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "Last run:    {} (exit {exit}) at {}",
            if run.success { "succeeded" } else { "failed" },
            timestamp(Some(run.finished_at))
        );
        if let Some(error) = &run.error {
            println!("Error:       {}", error.trim());
        }
        if output && !run.output.is_empty() {
            println!();
            print!("{}", run.output);
        }
    }
    Ok(())
}

fn run_job(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let job = block_on(&engine, engine.update_job_status(id, JobStatus::Running))??;
    report_run(&job, json)
}

fn archive(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let job = block_on(&engine, engine.update_job_status(id, JobStatus::Archived))??;
    print_summary(&job, json)
}

fn assign(root: &Path, id: u64, user: u64, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let job = block_on(&engine, engine.assign_job(id, user))??;
    print_summary(&job, json)
}

fn start_time(root: &Path, id: u64, time: Option<&str>, json: bool) -> anyhow::Result<()> {
    let start_time = time.map(parse_time).transpose()?;
    let engine = open_engine(root)?;
    let job = block_on(&engine, engine.reschedule_job(id, start_time))??;
    print_summary(&job, json)
}

fn remove(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let job = block_on(&engine, engine.delete_job(id))??;
    if json {
        print_json(&job)
    } else {
        println!("Removed job {}", job.id);
        Ok(())
    }
}
