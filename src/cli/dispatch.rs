use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Read;
use std::str::FromStr;

use weft::engine::StatusReport;
use weft::gate::GatePolicy;
use weft::models::decision::{NewDecisionItem, Priority};
use weft::models::issue::ValidationIssue;
use weft::models::stage::{StageName, StageStatus};
use weft::Engine;

use super::types::{Commands, DecisionCommands};

pub fn dispatch(root: &str, command: Commands) -> Result<()> {
    let engine = Engine::new(root)?;

    match command {
        Commands::Init { workspace } => {
            engine.init(&workspace)?;
            println!("initialized workspace '{workspace}'");
            Ok(())
        }
        Commands::Reset { workspace } => {
            engine.reset(&workspace)?;
            println!("reset workspace '{workspace}'");
            Ok(())
        }
        Commands::Context {
            workspace,
            stage,
            routing,
        } => {
            let stage = StageName::from_str(&stage)?;
            let routing = routing
                .map(|raw| serde_json::from_str(&raw).context("Failed to parse routing JSON"))
                .transpose()?;
            let payload = engine.context(&workspace, stage, routing)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Commands::Start {
            workspace,
            stage,
            agent,
        } => {
            let stage = StageName::from_str(&stage)?;
            engine.start_stage(&workspace, stage, &agent)?;
            println!("started {stage}");
            Ok(())
        }
        Commands::Complete {
            workspace,
            stage,
            file,
            agent,
            policy,
        } => {
            let stage = StageName::from_str(&stage)?;
            let policy = GatePolicy::from_str(&policy)?;
            let content = read_input(file.as_deref())?;
            let ack = engine.complete_stage(&workspace, stage, &content, &agent, policy)?;
            println!(
                "{} {} ({}), next: {}",
                "completed".green(),
                ack.stage,
                &ack.doc_fingerprint[..12.min(ack.doc_fingerprint.len())],
                ack.next_stage
            );
            Ok(())
        }
        Commands::Fail {
            workspace,
            stage,
            notes,
        } => {
            let stage = StageName::from_str(&stage)?;
            engine.fail_stage(&workspace, stage, &notes)?;
            println!("{} {stage}", "failed".red());
            Ok(())
        }
        Commands::Validate {
            workspace,
            file,
            pass,
        } => {
            let issues: Vec<ValidationIssue> = if pass {
                Vec::new()
            } else {
                let raw = read_input(file.as_deref())?;
                serde_json::from_str(&raw).context("Failed to parse issues JSON")?
            };
            let decision = engine.apply_validation_result(&workspace, &issues)?;
            match decision.reopened_from {
                None => println!("{}", "validation passed".green()),
                Some(stage) => {
                    println!("{} reopened from {stage}", "validation failed:".red());
                    for issue in &decision.issues {
                        println!("  {} -> {}: {}", issue.code, issue.stage, issue.summary);
                    }
                }
            }
            Ok(())
        }
        Commands::Reopen {
            workspace,
            stage,
            cause,
        } => {
            let stage = StageName::from_str(&stage)?;
            engine.reopen_from(&workspace, stage, &cause)?;
            println!("reopened from {stage}");
            Ok(())
        }
        Commands::Status {
            workspace,
            normalize,
            json,
        } => {
            let report = engine.status(&workspace, normalize)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report);
            }
            Ok(())
        }
        Commands::Decisions { command } => dispatch_decisions(&engine, command),
        Commands::Doc { workspace, stage } => {
            let stage = StageName::from_str(&stage)?;
            match engine.read_document(&workspace, stage)? {
                Some(content) => print!("{content}"),
                None => eprintln!("no document for {stage}"),
            }
            Ok(())
        }
    }
}

fn dispatch_decisions(engine: &Engine, command: DecisionCommands) -> Result<()> {
    match command {
        DecisionCommands::List {
            workspace,
            scope,
            json,
        } => {
            let scope = scope.map(|s| StageName::from_str(&s)).transpose()?;
            let items = engine.list_open_items(&workspace, scope)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("no open decision items");
            } else {
                for item in items {
                    let owner = item
                        .stage
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "global".to_string());
                    println!(
                        "{} [{}] ({}) {}",
                        item.id.bold(),
                        owner,
                        item.priority,
                        item.question
                    );
                }
            }
            Ok(())
        }
        DecisionCommands::Add {
            workspace,
            question,
            stage,
            priority,
        } => {
            let stage = stage.map(|s| StageName::from_str(&s)).transpose()?;
            let priority = match priority.to_lowercase().as_str() {
                "high" => Priority::High,
                "medium" => Priority::Medium,
                "low" => Priority::Low,
                other => anyhow::bail!("invalid priority: {other} (allowed: high, medium, low)"),
            };
            let item = engine.add_item(
                &workspace,
                NewDecisionItem {
                    stage,
                    question,
                    priority,
                    affected_sections: Vec::new(),
                },
            )?;
            println!("added {}", item.id);
            Ok(())
        }
        DecisionCommands::Resolve {
            workspace,
            id,
            resolution,
        } => {
            let item = engine.resolve_item(&workspace, &id, &resolution)?;
            println!("resolved {} => {}", item.id, item.resolution);
            Ok(())
        }
    }
}

fn read_input(file: Option<&str>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {path}")),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn format_status(status: StageStatus) -> colored::ColoredString {
    match status {
        StageStatus::Completed => "completed".green(),
        StageStatus::Stale => "stale".yellow().bold(),
        StageStatus::Failed => "failed".red().bold(),
        StageStatus::InProgress => "in_progress".cyan(),
        StageStatus::Pending => "pending".dimmed(),
    }
}

fn print_status(report: &StatusReport) {
    println!("workspace: {}", report.workspace.bold());
    println!("next stage: {}", report.current_stage);
    for entry in &report.stages {
        let mut line = format!("  {:<11} {}", entry.stage.to_string(), format_status(entry.status));
        if !entry.agent.is_empty() {
            line.push_str(&format!("  [{}]", entry.agent));
        }
        if !entry.notes.is_empty() {
            line.push_str(&format!("  {}", entry.notes.dimmed()));
        }
        println!("{line}");
    }
    if let Some(reopen) = &report.last_reopen {
        println!(
            "last reopen: {} ({}, {})",
            reopen.stage, reopen.cause, reopen.source
        );
    }
}
