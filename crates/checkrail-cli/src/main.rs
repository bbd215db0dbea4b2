//! Operator CLI for the checklist migration set.
//!
//! Works entirely against the registry and an in-memory store; executing
//! against a live database is the job of a driver implementing
//! `MigrationStore`.

use anyhow::Context;
use checkrail_checklists::registry;
use checkrail_migrate::prelude::*;
use checkrail_migrate::sql::{render_schema_op, render_seed_op};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "checkrail", version, about = "WIR checklist migration tool")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// List registered steps and their ledger state
	Status,
	/// Verify the whole step set registers cleanly
	Validate,
	/// Render the SQL a run would execute, without touching a store
	Script {
		/// Render the revert direction instead of apply
		#[arg(long)]
		down: bool,
		/// Stop at this step id (inclusive for apply, exclusive for revert)
		#[arg(long)]
		target: Option<String>,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let cli = Cli::parse();
	match cli.command {
		Command::Status => status().await,
		Command::Validate => validate(),
		Command::Script { down, target } => script(down, target),
	}
}

async fn status() -> anyhow::Result<()> {
	let registry = registry().context("step set failed validation")?;
	let store = Arc::new(MemoryStore::new());
	let engine = MigrationEngine::new(registry, store.clone(), store);
	for line in engine.status().await? {
		match line.applied_at {
			Some(at) => println!(
				"{}  {}  {}",
				"applied".green(),
				line.id.as_str().cyan(),
				at.to_rfc3339().dimmed()
			),
			None => println!("{}  {}", "pending".yellow(), line.id.as_str().cyan()),
		}
	}
	Ok(())
}

fn validate() -> anyhow::Result<()> {
	match registry() {
		Ok(registry) => {
			for entry in registry.steps() {
				println!(
					"{}  {} ({} up, {} down)",
					"ok".green(),
					entry.step.id.as_str().cyan(),
					entry.step.up.len(),
					entry.step.down.len()
				);
			}
			println!("{} steps verified", registry.len());
			Ok(())
		}
		Err(error) => {
			eprintln!("{} {} ({})", "error:".red().bold(), error, error.kind());
			std::process::exit(1);
		}
	}
}

fn script(down: bool, target: Option<String>) -> anyhow::Result<()> {
	let registry = registry().context("step set failed validation")?;
	let target = target.map(StepId::new);
	if let Some(id) = &target
		&& !registry.contains(id)
	{
		anyhow::bail!("unknown step {}", id);
	}

	if down {
		for entry in registry.steps().iter().rev() {
			if matches!(&target, Some(t) if t == &entry.step.id) {
				break;
			}
			print_step(&entry.step.id, &entry.step.down, &entry.down_order);
		}
	} else {
		for entry in registry.steps() {
			print_step(&entry.step.id, &entry.step.up, &entry.up_order);
			if matches!(&target, Some(t) if t == &entry.step.id) {
				break;
			}
		}
	}
	Ok(())
}

fn print_step(id: &StepId, ops: &[StepOp], order: &[usize]) {
	println!("{}", format!("-- {}", id).cyan());
	for &index in order {
		match &ops[index] {
			StepOp::Schema(op) => println!("{};", render_schema_op(op)),
			StepOp::Seed(op) => {
				let statement = render_seed_op(op);
				let params = statement
					.params
					.iter()
					.map(|value| value.to_string())
					.collect::<Vec<_>>()
					.join(", ");
				println!("{}; {}", statement.sql, format!("-- [{}]", params).dimmed());
			}
		}
	}
}
