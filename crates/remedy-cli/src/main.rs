//! `remedy` command-line front end

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use remedy_core::{Normalizer, RemediationReport, RemedyConfig, Remediator, RemediatorBuilder};
use remedy_executor::ExecutorRegistry;
use remedy_model::{Action, Incident, Plan, RawEvent};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("remedy")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Normalize monitoring events and enforce remediation plans")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("normalize")
                .about("Print the incident derived from an event")
                .arg(
                    Arg::new("event")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Event payload (JSON file, '-' for stdin)"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Normalize an event, plan and enforce the remediation")
                .arg(
                    Arg::new("event")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Event payload (JSON file, '-' for stdin)"),
                )
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .value_parser(value_parser!(PathBuf))
                        .help("Plan file to enforce instead of the rule table"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("Configuration file (.toml, .yaml)"),
                ),
        )
        .subcommand(Command::new("executors").about("List registered executor types"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match dispatch(&matches).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dispatch(matches: &ArgMatches) -> Result<ExitCode> {
    match matches.subcommand() {
        Some(("normalize", args)) => {
            let event = read_event(required_path(args, "event")?)?;
            let incident = Normalizer::new().normalize(event)?;
            print_json(&incident)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("run", args)) => {
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => RemedyConfig::load(path)?,
                None => RemedyConfig::default(),
            };
            let event = read_event(required_path(args, "event")?)?;
            let plan_file = args
                .get_one::<PathBuf>("plan")
                .map(PathBuf::as_path)
                .map(read_plan_file)
                .transpose()?;

            let report = run(&config, event, plan_file).await?;
            print_json(&report)?;
            Ok(if report.is_resolved() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(("executors", _)) => {
            for name in ExecutorRegistry::with_builtins().names() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => bail!("unknown command"),
    }
}

async fn run(
    config: &RemedyConfig,
    event: RawEvent,
    plan_file: Option<PlanFile>,
) -> Result<RemediationReport> {
    let remediator = RemediatorBuilder::from_config(config).build();
    let Some(plan_file) = plan_file else {
        return Ok(remediator.handle_event(event).await?);
    };

    let mut incident = remediator.normalizer().normalize(event)?;
    let plan = plan_file.bind(&incident);
    let results = enforce(&remediator, &plan, &mut incident).await?;
    Ok(RemediationReport {
        incident,
        plan,
        results,
    })
}

async fn enforce(
    remediator: &Remediator,
    plan: &Plan,
    incident: &mut Incident,
) -> Result<Vec<remedy_model::ExecutionResult>> {
    remediator
        .enforce(plan, incident)
        .await
        .with_context(|| format!("enforcing plan {} for incident {}", plan.id(), incident.id))
}

/// Plan file: a full plan, `{"actions": [...]}`, or a bare action list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Plan(Plan),
    Actions { actions: Vec<Action> },
    List(Vec<Action>),
}

impl PlanFile {
    /// Actions re-bound to the incident being handled
    fn bind(self, incident: &Incident) -> Plan {
        match self {
            Self::Plan(plan) => plan.rebind(incident.id),
            Self::Actions { actions } | Self::List(actions) => Plan::new(incident.id, actions),
        }
    }
}

fn required_path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("missing argument <{name}>"))
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("reading stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("parsing {} as JSON", path.display()))
}

fn read_event(path: &Path) -> Result<RawEvent> {
    Ok(RawEvent::new(read_json(path)?))
}

fn read_plan_file(path: &Path) -> Result<PlanFile> {
    let value = read_json(path)?;
    serde_json::from_value(value).with_context(|| format!("{} is not a plan", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
