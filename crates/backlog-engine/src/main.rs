//! `backlog` command-line interface
//!
//! Each invocation loads the state file (or starts empty), runs one command
//! and writes the state back when the command changed it.

use anyhow::{Context, Result};
use backlog_engine::prelude::*;
use backlog_engine::simulator::{run_simulator, SimulatorConfig};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("backlog")
        .version(backlog_engine::VERSION)
        .about("Backlog capacity planning and work-item workflow")
        .subcommand_required(true)
        .arg(
            Arg::new("state")
                .long("state")
                .global(true)
                .default_value("backlog.json")
                .value_parser(value_parser!(PathBuf))
                .help("Snapshot file holding the backlog state"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand(
            Command::new("add")
                .about("Create a work item in the backlog")
                .arg(Arg::new("title").long("title").required(true).help("Short title"))
                .arg(
                    Arg::new("effort")
                        .long("effort")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("Effort estimate (1, 2, 3, 5, 8, 13, 21, 40, 100)"),
                )
                .arg(
                    Arg::new("priority")
                        .long("priority")
                        .default_value("MEDIUM")
                        .value_parser(parse_priority)
                        .help("LOW, MEDIUM, HIGH, CRITICAL or EXISTENTIAL"),
                )
                .arg(Arg::new("as").long("as").help("Requester role"))
                .arg(Arg::new("want").long("want").help("Desired capability"))
                .arg(Arg::new("so-that").long("so-that").help("Business justification"))
                .arg(Arg::new("criteria").long("criteria").help("Acceptance criteria"))
                .arg(Arg::new("assignee").long("assignee").help("Owner")),
        )
        .subcommand(
            Command::new("list")
                .about("List work items")
                .arg(
                    Arg::new("iteration")
                        .long("iteration")
                        .value_parser(value_parser!(u32))
                        .help("Only items of this iteration"),
                )
                .arg(
                    Arg::new("status")
                        .long("status")
                        .value_parser(parse_status)
                        .help("Only items in this status"),
                ),
        )
        .subcommand(
            Command::new("move")
                .about("Move a work item to another status")
                .arg(id_arg())
                .arg(
                    Arg::new("status")
                        .long("status")
                        .required(true)
                        .value_parser(parse_status)
                        .help("Target status"),
                ),
        )
        .subcommand(
            Command::new("block")
                .about("Block a work item")
                .arg(id_arg())
                .arg(Arg::new("reason").long("reason").required(true).help("Why it is blocked")),
        )
        .subcommand(
            Command::new("unblock")
                .about("Return a blocked item to the state it left")
                .arg(id_arg()),
        )
        .subcommand(Command::new("groom").about("Mark a work item as refined").arg(id_arg()))
        .subcommand(
            Command::new("assign")
                .about("Set or clear the owner of a work item")
                .arg(id_arg())
                .arg(Arg::new("to").long("to").help("New owner; omit to clear")),
        )
        .subcommand(
            Command::new("estimate")
                .about("Re-estimate a work item, snapping to the scale")
                .arg(id_arg())
                .arg(
                    Arg::new("effort")
                        .long("effort")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("New raw estimate"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Commit backlog items to the current iteration")
                .arg(
                    Arg::new("capacity")
                        .long("capacity")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64))
                        .help("Target effort; defaults to the recommended commitment"),
                ),
        )
        .subcommand(
            Command::new("close")
                .about("Close the current iteration and record its velocity")
                .arg(
                    Arg::new("delivered")
                        .long("delivered")
                        .value_parser(value_parser!(u32))
                        .help("Report a delivered total instead of summing DONE items"),
                ),
        )
        .subcommand(
            Command::new("velocity")
                .about("Show velocity statistics")
                .arg(
                    Arg::new("window")
                        .long("window")
                        .value_parser(value_parser!(usize))
                        .help("Iterations to average"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Summarize an iteration")
                .arg(
                    Arg::new("iteration")
                        .long("iteration")
                        .value_parser(value_parser!(u32))
                        .help("Iteration to summarize; defaults to the current one"),
                ),
        )
        .subcommand(
            Command::new("journal")
                .about("Show the audit journal")
                .arg(
                    Arg::new("verify")
                        .long("verify")
                        .action(ArgAction::SetTrue)
                        .help("Only verify the hash chain"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the seeded backlog simulator")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .default_value("12")
                        .value_parser(value_parser!(u32))
                        .help("Iterations to simulate"),
                )
                .arg(
                    Arg::new("items")
                        .long("items")
                        .default_value("8")
                        .value_parser(value_parser!(u32))
                        .help("Items created per iteration"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
}

fn id_arg() -> Arg {
    Arg::new("id")
        .long("id")
        .required(true)
        .value_parser(parse_id)
        .help("Work item id, e.g. 7 or #7")
}

fn parse_id(s: &str) -> Result<WorkItemId, String> {
    s.parse().map_err(|e: backlog_model::ModelError| e.to_string())
}

fn parse_status(s: &str) -> Result<WorkItemStatus, String> {
    s.parse().map_err(|e: backlog_model::ModelError| e.to_string())
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    s.parse().map_err(|e: backlog_model::ModelError| e.to_string())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli().get_matches()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Execute one command; `Ok(false)` signals a failed simulation
fn run(matches: &ArgMatches) -> Result<bool> {
    let json = matches.get_flag("json");
    let state = matches
        .get_one::<PathBuf>("state")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("backlog.json"));
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let Some((name, args)) = matches.subcommand() else {
        return Ok(true);
    };

    if name == "simulate" {
        let config = SimulatorConfig {
            seed: required(args, "seed")?,
            iterations: required(args, "iterations")?,
            items_per_iteration: required(args, "items")?,
            stop_on_first_violation: args.get_flag("stop-on-violation"),
        };
        let report = run_simulator(config)?;
        emit(json, &report, || report.generate_text())?;
        return Ok(report.passed());
    }

    let backlog = open(&state, config)?;
    let mutated = match name {
        "add" => {
            let mut fields = NewWorkItem::new(
                required::<String>(args, "title")?,
                required(args, "effort")?,
                required(args, "priority")?,
            )
            .with_story(text(args, "as"), text(args, "want"), text(args, "so-that"))
            .with_acceptance_criteria(text(args, "criteria"));
            if let Some(assignee) = args.get_one::<String>("assignee") {
                fields = fields.with_assignee(assignee.clone());
            }
            let item = backlog.create_item(fields)?;
            emit(json, &item, || format!("created {}", line(&item)))?;
            true
        }
        "list" => {
            let mut items = backlog.list_items(args.get_one::<u32>("iteration").copied());
            if let Some(status) = args.get_one::<WorkItemStatus>("status") {
                items.retain(|item| item.status == *status);
            }
            emit(json, &items, || {
                items.iter().map(line).collect::<Vec<_>>().join("\n")
            })?;
            false
        }
        "move" => {
            let item = backlog.transition(required(args, "id")?, required(args, "status")?)?;
            emit(json, &item, || line(&item))?;
            true
        }
        "block" => {
            let reason: String = required(args, "reason")?;
            let item = backlog.block(required(args, "id")?, &reason)?;
            emit(json, &item, || line(&item))?;
            true
        }
        "unblock" => {
            let item = backlog.unblock(required(args, "id")?)?;
            emit(json, &item, || line(&item))?;
            true
        }
        "groom" => {
            let item = backlog.groom(required(args, "id")?)?;
            emit(json, &item, || line(&item))?;
            true
        }
        "assign" => {
            let item = backlog.assign(required(args, "id")?, args.get_one::<String>("to").cloned())?;
            emit(json, &item, || line(&item))?;
            true
        }
        "estimate" => {
            let item = backlog.re_estimate(required(args, "id")?, required(args, "effort")?)?;
            emit(json, &item, || line(&item))?;
            true
        }
        "plan" => {
            let capacity = args
                .get_one::<i64>("capacity")
                .copied()
                .unwrap_or_else(|| backlog.default_capacity());
            let plan = backlog.plan_iteration(capacity);
            emit(json, &plan, || {
                let mut out = format!(
                    "iteration {}: committed {} of {} points",
                    plan.iteration, plan.committed_effort, plan.target_capacity
                );
                for item in &plan.items {
                    out.push_str("\n  ");
                    out.push_str(&line(item));
                }
                out
            })?;
            true
        }
        "close" => {
            let close = match args.get_one::<u32>("delivered") {
                Some(&delivered) => backlog.close_iteration_with(delivered),
                None => backlog.close_iteration(),
            };
            emit(json, &close, || {
                format!(
                    "closed iteration {}: {} points delivered, {} carried over",
                    close.iteration, close.delivered_effort, close.carried_over
                )
            })?;
            true
        }
        "velocity" => {
            let window = args
                .get_one::<usize>("window")
                .copied()
                .unwrap_or(backlog.config().velocity_window);
            let report = backlog.velocity(window);
            emit(json, &report, || {
                format!(
                    "average {:.2} over {} iterations; recommended {}, optimistic {}",
                    report.average, report.iterations_analyzed, report.recommended, report.optimistic
                )
            })?;
            false
        }
        "status" => {
            let summary = match args.get_one::<u32>("iteration") {
                Some(&n) => backlog.summarize(n),
                None => backlog.summarize_current(),
            };
            emit(json, &summary, || {
                let mut out = format!(
                    "iteration {}: {} items, {}/{} points delivered",
                    summary.iteration,
                    summary.total_items,
                    summary.delivered_effort,
                    summary.committed_effort
                );
                for (status, count) in summary.counts.iter().filter(|(_, count)| **count > 0) {
                    out.push_str(&format!("\n  {status}: {count}"));
                }
                out
            })?;
            false
        }
        "journal" => {
            backlog.journal().verify_integrity()?;
            if !args.get_flag("verify") {
                let events = backlog.journal().events();
                emit(json, &events, || {
                    events
                        .iter()
                        .map(|e| {
                            let item = e.item.map(|id| id.to_string()).unwrap_or_default();
                            format!("{} {:<16} {:>5} {}", e.timestamp.to_rfc3339(), e.action, item, e.detail)
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })?;
            } else if !json {
                println!("journal intact ({} events)", backlog.journal().len());
            }
            false
        }
        other => anyhow::bail!("unknown command {other}"),
    };

    if mutated {
        backlog
            .snapshot()
            .save(&state)
            .with_context(|| format!("saving state to {}", state.display()))?;
    }
    Ok(true)
}

/// Restore from `state` when it exists, otherwise start empty
fn open(state: &Path, config: EngineConfig) -> Result<BacklogHandle> {
    if state.exists() {
        let snapshot = BacklogSnapshot::load(state)
            .with_context(|| format!("loading state from {}", state.display()))?;
        Ok(BacklogHandle::restore(config, snapshot)?)
    } else {
        Ok(BacklogHandle::with_config(config)?)
    }
}

fn required<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

fn text(args: &ArgMatches, name: &str) -> String {
    args.get_one::<String>(name).cloned().unwrap_or_default()
}

fn line(item: &WorkItem) -> String {
    let iteration = item
        .iteration
        .map_or_else(|| "-".to_string(), |n| n.to_string());
    format!(
        "{:>5} {:<11} {:<11} {:>3} it:{:<3} {}",
        item.id.to_string(),
        item.status.as_str(),
        item.priority.as_str(),
        item.effort.points(),
        iteration,
        item.title
    )
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
