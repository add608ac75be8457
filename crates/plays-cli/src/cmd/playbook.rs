use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Subcommand;
use plays_core::playbook::{Playbook, PlaybookDraft};

use super::{block_on, open_engine};
use crate::output::{print_json, print_table, timestamp};

#[derive(Subcommand)]
pub enum PlaybookSubcommand {
    /// Validate and store a playbook file
    Add {
        name: String,
        /// Path to the playbook YAML
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "")]
        description: String,
        /// User id recorded as the creator
        #[arg(long, default_value_t = 0)]
        created_by: u64,
    },
    /// List stored playbooks
    List,
    /// Show a playbook
    Show {
        id: u64,
        /// Print the stored YAML as well
        #[arg(long)]
        content: bool,
    },
    /// Replace a playbook's fields; omitted fields keep their value
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Delete a playbook and its stored file
    Remove { id: u64 },
    /// Syntax-check a file without storing it
    Validate { file: PathBuf },
}

pub fn run(root: &Path, subcmd: PlaybookSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PlaybookSubcommand::Add {
            name,
            file,
            description,
            created_by,
        } => add(root, name, &file, description, created_by, json),
        PlaybookSubcommand::List => list(root, json),
        PlaybookSubcommand::Show { id, content } => show(root, id, content, json),
        PlaybookSubcommand::Update {
            id,
            name,
            description,
            file,
        } => update(root, id, name, description, file.as_deref(), json),
        PlaybookSubcommand::Remove { id } => remove(root, id, json),
        PlaybookSubcommand::Validate { file } => validate(root, &file, json),
    }
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_summary(verb: &str, playbook: &Playbook, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(playbook)
    } else {
        println!("{verb} playbook {} '{}'", playbook.id, playbook.name);
        Ok(())
    }
}

fn add(
    root: &Path,
    name: String,
    file: &Path,
    description: String,
    created_by: u64,
    json: bool,
) -> anyhow::Result<()> {
    let content = read_file(file)?;
    let engine = open_engine(root)?;
    let draft = PlaybookDraft {
        name,
        description,
        content,
        created_by,
    };
    let playbook = block_on(&engine, engine.create_playbook(draft))??;
    print_summary("Added", &playbook, json)
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let playbooks = engine.list_playbooks();

    if json {
        return print_json(&playbooks);
    }
    if playbooks.is_empty() {
        println!("No playbooks.");
        return Ok(());
    }

    let rows = playbooks
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                p.description.clone(),
                timestamp(Some(p.updated_at)),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "DESCRIPTION", "UPDATED"], rows);
    Ok(())
}

fn show(root: &Path, id: u64, content: bool, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let playbook = engine.get_playbook(id)?;

    if json {
        return print_json(&playbook);
    }

    println!("Playbook:    {}", playbook.id);
    println!("Name:        {}", playbook.name);
    if !playbook.description.is_empty() {
        println!("Description: {}", playbook.description);
    }
    println!("Created by:  {}", playbook.created_by);
    println!("Created:     {}", timestamp(Some(playbook.created_at)));
    println!("Updated:     {}", timestamp(Some(playbook.updated_at)));
    println!("File:        {}", engine.store().playbook_path(id).display());
    if content {
        println!();
        print!("{}", playbook.content);
    }
    Ok(())
}

fn update(
    root: &Path,
    id: u64,
    name: Option<String>,
    description: Option<String>,
    file: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let current = engine.get_playbook(id)?;
    let content = match file {
        Some(path) => read_file(path)?,
        None => current.content,
    };
    let draft = PlaybookDraft {
        name: name.unwrap_or(current.name),
        description: description.unwrap_or(current.description),
        content,
        created_by: current.created_by,
    };
    let playbook = block_on(&engine, engine.update_playbook(id, draft))??;
    print_summary("Updated", &playbook, json)
}

fn remove(root: &Path, id: u64, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(root)?;
    let playbook = block_on(&engine, engine.delete_playbook(id))??;
    print_summary("Removed", &playbook, json)
}

fn validate(root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let content = read_file(file)?;
    let engine = open_engine(root)?;
    let report = block_on(&engine, engine.check(&content))?;

    if json {
        print_json(&report)?;
    } else if report.passed {
        println!("{}: valid", file.display());
    }
    if !report.passed {
        bail!("{}: invalid playbook: {}", file.display(), report.reason());
    }
    Ok(())
}
