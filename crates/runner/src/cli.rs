#![forbid(unsafe_code)]

use clap::{Args, Parser, Subcommand, ValueEnum};
use gq_core::{BatchId, ContainerRef, ContainerType, FileRef, GearId, JobId, JobState};
use std::path::PathBuf;

/// Operate a gear job queue stored in a local SQLite database.
#[derive(Debug, Parser)]
#[command(name = "gq_runner", version, about)]
pub(crate) struct Cli {
    #[arg(long, env = "GQ_STORAGE_DIR", default_value = ".gear_queue", global = true)]
    pub(crate) storage_dir: PathBuf,
    /// JSON catalog of files and access grants. Without one every file
    /// resolves and every caller is allowed.
    #[arg(long, env = "GQ_CATALOG", global = true)]
    pub(crate) catalog: Option<PathBuf>,
    /// Act on behalf of this user (access checks apply).
    #[arg(long, global = true)]
    pub(crate) user: Option<String>,
    #[arg(long, global = true, requires = "user")]
    pub(crate) superuser: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Queue a job for a gear.
    Enqueue(EnqueueArgs),
    /// Claim the next pending job.
    Next {
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Apply a state or tag change to a job.
    Report {
        #[arg(value_parser = job_id)]
        id: JobId,
        #[arg(long)]
        state: Option<JobState>,
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
        #[arg(long)]
        now: Option<bool>,
    },
    /// Retry a failed job.
    Retry {
        #[arg(value_parser = job_id)]
        id: JobId,
        #[arg(long)]
        force: bool,
    },
    /// Show a job.
    Get {
        #[arg(value_parser = job_id)]
        id: JobId,
    },
    /// Print the job's config document.
    Config {
        #[arg(value_parser = job_id)]
        id: JobId,
    },
    /// Jobs touching any of the given containers.
    Search {
        #[arg(long = "container", value_parser = container_ref, required = true)]
        containers: Vec<ContainerRef>,
        #[arg(long = "state")]
        states: Vec<JobState>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Job counts per state.
    Stats {
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        last: Option<usize>,
        #[arg(long)]
        unique: bool,
        #[arg(long)]
        all: bool,
        /// Print only the pending count.
        #[arg(long, conflicts_with_all = ["last", "unique", "all"])]
        pending: bool,
    },
    /// Fail and retry running jobs that stopped reporting.
    Reap,
    /// Show or append job logs.
    Logs {
        #[arg(value_parser = job_id)]
        id: JobId,
        #[arg(long, value_enum, default_value_t = LogFormat::Json)]
        format: LogFormat,
        /// Append this line instead of printing.
        #[arg(long)]
        append: Option<String>,
        #[arg(long, default_value_t = 1, requires = "append")]
        fd: i32,
    },
    /// Hold a ticket on a running job so it is not reaped.
    Ticket {
        #[arg(value_parser = job_id)]
        id: JobId,
    },
    /// Batch commands.
    #[command(subcommand)]
    Batch(BatchCommand),
    /// Gear registry commands.
    #[command(subcommand)]
    Gear(GearCommand),
    /// Job rules that fire when a file is stored.
    #[command(subcommand)]
    Rule(RuleCommand),
}

#[derive(Debug, Args)]
pub(crate) struct EnqueueArgs {
    #[arg(long, value_parser = gear_id)]
    pub(crate) gear: GearId,
    /// `name=type/id/file`, repeatable.
    #[arg(long = "input", value_parser = named_file_ref)]
    pub(crate) inputs: Vec<(String, FileRef)>,
    /// `type/id`; defaults to the first input's container.
    #[arg(long, value_parser = container_ref)]
    pub(crate) destination: Option<ContainerRef>,
    /// Config overrides as a JSON object.
    #[arg(long)]
    pub(crate) config: Option<String>,
    #[arg(long = "tag")]
    pub(crate) tags: Vec<String>,
    #[arg(long)]
    pub(crate) now: bool,
}

#[derive(Debug, Subcommand)]
pub(crate) enum BatchCommand {
    /// Store a batch from a JSON proposal file.
    Create {
        #[arg(long, value_parser = gear_id)]
        gear: GearId,
        #[arg(long)]
        proposal: PathBuf,
    },
    Run {
        #[arg(value_parser = batch_id)]
        id: BatchId,
    },
    Cancel {
        #[arg(value_parser = batch_id)]
        id: BatchId,
    },
    /// The state the batch would settle into now.
    Status {
        #[arg(value_parser = batch_id)]
        id: BatchId,
    },
    Get {
        #[arg(value_parser = batch_id)]
        id: BatchId,
    },
}

#[derive(Debug, Subcommand)]
pub(crate) enum GearCommand {
    /// Register a gear from a JSON manifest file.
    Add {
        manifest: PathBuf,
        #[arg(long)]
        invalid: bool,
    },
    Get {
        #[arg(value_parser = gear_id)]
        id: GearId,
    },
    /// Latest version of every gear.
    List,
}

#[derive(Debug, Subcommand)]
pub(crate) enum RuleCommand {
    /// Register a rule from a JSON file.
    Add {
        rule: PathBuf,
        /// `type/id` the rule is scoped to; global when omitted.
        #[arg(long, value_parser = container_ref)]
        container: Option<ContainerRef>,
    },
    List,
    /// Enqueue the jobs every matching rule asks for.
    Run {
        /// `type/id/file`
        #[arg(value_parser = file_ref)]
        file: FileRef,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    Json,
    Text,
    Html,
}

pub(crate) fn job_id(raw: &str) -> Result<JobId, String> {
    JobId::try_new(raw.trim()).map_err(|err| err.to_string())
}

pub(crate) fn batch_id(raw: &str) -> Result<BatchId, String> {
    BatchId::try_new(raw.trim()).map_err(|err| err.to_string())
}

pub(crate) fn gear_id(raw: &str) -> Result<GearId, String> {
    GearId::try_new(raw.trim()).map_err(|err| err.to_string())
}

/// `type/id`
pub(crate) fn container_ref(raw: &str) -> Result<ContainerRef, String> {
    let Some((kind, id)) = raw.trim().split_once('/') else {
        return Err(format!("expected type/id, got {raw:?}"));
    };
    if id.is_empty() || id.contains('/') {
        return Err(format!("expected type/id, got {raw:?}"));
    }
    let kind: ContainerType = kind.parse().map_err(|err: gq_core::UnknownContainerType| err.to_string())?;
    Ok(ContainerRef::new(kind, id))
}

/// `type/id/file`; the file name may contain further slashes.
pub(crate) fn file_ref(raw: &str) -> Result<FileRef, String> {
    let mut parts = raw.trim().splitn(3, '/');
    let (Some(kind), Some(id), Some(file)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected type/id/file, got {raw:?}"));
    };
    if id.is_empty() || file.is_empty() {
        return Err(format!("expected type/id/file, got {raw:?}"));
    }
    let kind: ContainerType = kind.parse().map_err(|err: gq_core::UnknownContainerType| err.to_string())?;
    Ok(FileRef::new(kind, id, file))
}

/// `name=type/id/file`
pub(crate) fn named_file_ref(raw: &str) -> Result<(String, FileRef), String> {
    let Some((name, location)) = raw.trim().split_once('=') else {
        return Err(format!("expected name=type/id/file, got {raw:?}"));
    };
    if name.is_empty() {
        return Err(format!("expected name=type/id/file, got {raw:?}"));
    }
    let file = file_ref(location).map_err(|_| format!("expected name=type/id/file, got {raw:?}"))?;
    Ok((name.to_string(), file))
}
