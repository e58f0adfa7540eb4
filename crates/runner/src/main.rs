#![forbid(unsafe_code)]

mod cli;
mod output;
#[cfg(test)]
mod tests;

use clap::Parser;
use cli::{BatchCommand, Cli, Command, EnqueueArgs, GearCommand, LogFormat, RuleCommand};
use gq_core::{BatchProposal, GearManifest, JobMutation, Origin, Rule};
use gq_queue::logs::{render_html, render_text};
use gq_queue::{Catalog, EnqueueRequest, Identity, Queue, QueueConfig, QueueError, StatsQuery};
use gq_storage::{JobLogLine, SqliteStore, StoreError};
use output::{print_json, render};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::process::ExitCode;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Queue(err) => err.code(),
            Self::Store(_) => "store",
            Self::Read { .. } | Self::Json(_) | Self::Usage(_) => "usage",
        }
    }

    fn to_json(&self) -> Value {
        let mut error = json!({ "code": self.code(), "message": self.to_string() });
        if let Self::Queue(QueueError::Validation { key: Some(key), .. }) = self {
            error["key"] = Value::String(key.clone());
        }
        json!({ "error": error })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GQ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_json(&err.to_json());
            ExitCode::from(match err {
                CliError::Usage(_) | CliError::Read { .. } | CliError::Json(_) => 2,
                _ => 1,
            })
        }
    }
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn open_queue(cli: &Cli) -> Result<Queue<Catalog>, CliError> {
    let catalog = match cli.catalog.as_deref() {
        Some(path) => Catalog::from_json_str(&read_file(path)?)?,
        None => Catalog::default(),
    };
    let store = SqliteStore::open(&cli.storage_dir)?;
    let config = QueueConfig::from_env();
    debug!(storage_dir = %cli.storage_dir.display(), ?config, "opened queue");
    Ok(Queue::new(store, catalog, config))
}

fn identity(cli: &Cli) -> Option<Identity> {
    cli.user.as_ref().map(|user_id| Identity {
        user_id: user_id.clone(),
        superuser: cli.superuser,
    })
}

fn run(cli: Cli) -> Result<Value, CliError> {
    let mut queue = open_queue(&cli)?;
    let identity = identity(&cli);
    let origin = identity.as_ref().map(|identity| Origin::user(&identity.user_id));

    match cli.command {
        Command::Enqueue(args) => {
            let request = enqueue_request(args)?;
            Ok(render(&queue.enqueue(request, origin, identity.as_ref())?)?)
        }
        Command::Next { tags } => Ok(render(&queue.start_job(&tags)?)?),
        Command::Report {
            id,
            state,
            tags,
            now,
        } => {
            if state.is_none() && tags.is_none() && now.is_none() {
                return Err(CliError::Usage(
                    "report needs at least one of --state, --tag, --now".to_string(),
                ));
            }
            let changes = JobMutation { state, tags, now };
            Ok(render(&queue.report(&id, &changes, identity.as_ref())?)?)
        }
        Command::Retry { id, force } => {
            let job = queue.load(&id)?;
            let retry_id = queue.retry(&job, force)?;
            Ok(json!({ "job_id": id, "retry_id": retry_id }))
        }
        Command::Get { id } => Ok(render(&queue.load(&id)?)?),
        Command::Config { id } => Ok(queue.config_document(&id)?),
        Command::Search {
            containers,
            states,
            tags,
        } => Ok(render(&queue.search(&containers, &states, &tags)?)?),
        Command::Stats {
            tags,
            last,
            unique,
            all,
            pending,
        } => {
            if pending {
                return Ok(json!({ "pending": queue.get_pending(&tags)? }));
            }
            let query = StatsQuery {
                tags,
                last,
                unique,
                all,
            };
            Ok(serde_json::to_value(queue.get_statistics(&query)?)?)
        }
        Command::Reap => Ok(json!({ "reaped": queue.scan_for_orphans()? })),
        Command::Logs {
            id,
            format,
            append,
            fd,
        } => {
            if let Some(msg) = append {
                let added = queue.add_logs(&id, &[JobLogLine { fd, msg }])?;
                return Ok(json!({ "job_id": id, "added": added }));
            }
            let entries = queue.logs(&id)?;
            Ok(match format {
                LogFormat::Json => render(&entries)?,
                LogFormat::Text => Value::String(render_text(&entries)),
                LogFormat::Html => Value::String(render_html(&entries)),
            })
        }
        Command::Ticket { id } => Ok(render(&queue.store_mut().job_ticket_create(&id)?)?),
        Command::Batch(command) => run_batch(&mut queue, command, origin, identity.as_ref()),
        Command::Gear(command) => run_gear(&mut queue, command),
        Command::Rule(command) => run_rule(&mut queue, command, origin),
    }
}

fn enqueue_request(args: EnqueueArgs) -> Result<EnqueueRequest, CliError> {
    let mut request = EnqueueRequest::new(args.gear);
    request.inputs = args.inputs.into_iter().collect();
    request.destination = args.destination;
    request.config = match args.config.as_deref() {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => return Err(CliError::Usage("--config must be a JSON object".to_string())),
        },
        None => Map::new(),
    };
    request.tags = args.tags;
    request.now = args.now;
    Ok(request)
}

fn run_batch(
    queue: &mut Queue<Catalog>,
    command: BatchCommand,
    origin: Option<Origin>,
    identity: Option<&Identity>,
) -> Result<Value, CliError> {
    match command {
        BatchCommand::Create { gear, proposal } => {
            let proposal: BatchProposal = serde_json::from_str(&read_file(&proposal)?)?;
            Ok(render(&queue.batch_create(gear, proposal, origin)?)?)
        }
        BatchCommand::Run { id } => Ok(render(&queue.batch_run(&id, identity)?)?),
        BatchCommand::Cancel { id } => {
            let cancelled = queue.batch_cancel(&id)?;
            Ok(json!({ "batch_id": id, "cancelled": cancelled }))
        }
        BatchCommand::Status { id } => {
            let settled = queue.batch_check_state(&id)?;
            Ok(json!({ "batch_id": id, "settled": settled }))
        }
        BatchCommand::Get { id } => Ok(render(&queue.batch_get(&id)?)?),
    }
}

fn run_gear(queue: &mut Queue<Catalog>, command: GearCommand) -> Result<Value, CliError> {
    match command {
        GearCommand::Add { manifest, invalid } => {
            let manifest: GearManifest = serde_json::from_str(&read_file(&manifest)?)?;
            Ok(render(&queue.store_mut().gear_insert(&manifest, invalid)?)?)
        }
        GearCommand::Get { id } => match queue.store().gear_get(&id)? {
            Some(gear) => Ok(render(&gear)?),
            None => Err(QueueError::NotFound(format!("gear {id}")).into()),
        },
        GearCommand::List => Ok(render(&queue.store().gears_list()?)?),
    }
}

fn run_rule(
    queue: &mut Queue<Catalog>,
    command: RuleCommand,
    origin: Option<Origin>,
) -> Result<Value, CliError> {
    match command {
        RuleCommand::Add { rule, container } => {
            let rule: Rule = serde_json::from_str(&read_file(&rule)?)?;
            Ok(render(&queue.rule_add(container.as_ref(), &rule)?)?)
        }
        RuleCommand::List => Ok(render(&queue.store().rules_list()?)?),
        RuleCommand::Run { file } => {
            let origin = origin.unwrap_or_else(Origin::system);
            Ok(render(&queue.create_jobs(&file, Some(origin))?)?)
        }
    }
}
