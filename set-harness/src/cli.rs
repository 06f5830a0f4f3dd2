//! Command line interface of the `set` binary.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use set_bencher::Job;
use set_bencher::instrument::{Invocation, TraceRecorder};

use crate::config::Config;
use crate::deploy::{BuildScriptPlatform, SharedPlatform};
use crate::prompt::ask_for_confirmation;
use crate::workload::PerformanceWorkload;
use crate::{objects, observability};

/// Serverless benchmark harness.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Plan(PlanCommand),
    Deploy(DeployCommand),
    Update(UpdateCommand),
    Remove(RemoveCommand),
    Invoke(InvokeCommand),
    Version(VersionCommand),
}

/// deploy the workload, provision test objects and export the benchmark
///
/// The exported benchmark holds the phase plan and payload for the load generator. If the
/// workload reconfigures the function mid-run, the command stays alive for the whole schedule.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// the workload descriptor file
    #[argh(option, short = 'w')]
    workload: Option<PathBuf>,

    /// run without waiting for confirmation
    #[argh(switch, short = 'y')]
    yes: bool,

    /// write the exported benchmark here instead of stdout
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

/// compile the workload and print the benchmark without deploying
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "plan")]
struct PlanCommand {
    /// the workload descriptor file
    #[argh(option, short = 'w')]
    workload: Option<PathBuf>,
}

/// deploy the workload's function and print its endpoint
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "deploy")]
struct DeployCommand {
    /// the workload descriptor file
    #[argh(option, short = 'w')]
    workload: Option<PathBuf>,
}

/// apply the workload's deployment to an already deployed function
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "update")]
struct UpdateCommand {
    /// the workload descriptor file
    #[argh(option, short = 'w')]
    workload: Option<PathBuf>,
}

/// remove the workload's function
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "remove")]
struct RemoveCommand {
    /// the workload descriptor file
    #[argh(option, short = 'w')]
    workload: Option<PathBuf>,
}

/// execute a job locally and print its trace
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "invoke")]
struct InvokeCommand {
    /// JSON file holding the job
    #[argh(positional)]
    job: PathBuf,
}

/// print the harness version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(cmd) => run(&config, cmd).await,
            Command::Plan(cmd) => plan(&config, cmd.workload.as_deref()),
            Command::Deploy(cmd) => {
                let (workload, platform) = load(&config, cmd.workload.as_deref())?;
                let endpoint = platform.deploy(&workload.deployment).await?;
                println!("{endpoint}");
                Ok(())
            }
            Command::Update(cmd) => {
                let (workload, platform) = load(&config, cmd.workload.as_deref())?;
                platform.change(&workload.deployment).await?;
                Ok(())
            }
            Command::Remove(cmd) => {
                let (workload, platform) = load(&config, cmd.workload.as_deref())?;
                platform.remove(&workload.deployment).await?;
                Ok(())
            }
            Command::Invoke(cmd) => invoke(&cmd.job).await,
            Command::Version(_) => unreachable!(),
        }
    })
}

fn platform(config: &Config) -> SharedPlatform {
    Arc::new(
        BuildScriptPlatform::new(config.layout.clone()).with_program(config.build_program.clone()),
    )
}

fn load(config: &Config, path: Option<&Path>) -> Result<(PerformanceWorkload, SharedPlatform)> {
    let path = path.unwrap_or(&config.workload);
    let workload = PerformanceWorkload::load(path)
        .with_context(|| format!("failed to load workload `{}`", path.display()))?;
    Ok((workload, platform(config)))
}

fn plan(config: &Config, path: Option<&Path>) -> Result<()> {
    let (mut workload, platform) = load(config, path)?;
    let benchmark = workload.prepare(platform)?;
    write_json(io::stdout().lock(), &benchmark)
}

async fn run(config: &Config, cmd: RunCommand) -> Result<()> {
    let unattended = cmd.yes || config.unattended;
    let confirm = |question: &str| -> Result<bool> {
        if unattended {
            return Ok(true);
        }
        Ok(ask_for_confirmation(question, &mut io::stdin().lock(), &mut io::stderr())?)
    };

    let (mut workload, platform) = load(config, cmd.workload.as_deref())?;
    let mut benchmark = workload.prepare(Arc::clone(&platform))?;

    if !confirm("deploy the workload?")? {
        return Ok(());
    }
    let endpoint = platform
        .deploy(&workload.deployment)
        .await
        .context("failed to deploy the workload")?;
    tracing::info!(%endpoint, "deployed workload");
    if benchmark.target.is_empty() {
        benchmark.target = endpoint;
    }

    if workload.task == set_bencher::TaskKind::Io {
        if !confirm("generate IO objects?")? {
            return Ok(());
        }
        objects::generate_io_objects(&workload).await?;
    }

    if !confirm("run SET benchmark?")? {
        return Ok(());
    }

    match &cmd.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create `{}`", path.display()))?;
            write_json(BufWriter::new(file), &benchmark)?;
            tracing::info!(path = %path.display(), "exported benchmark");
        }
        None => write_json(io::stdout().lock(), &benchmark)?,
    }

    if !benchmark.hooks().is_empty() {
        tracing::info!(duration = ?benchmark.plan.duration(), "following phase schedule");
        benchmark.follow().await;
    }

    Ok(())
}

async fn invoke(path: &Path) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("failed to open job `{}`", path.display()))?;
    let job: Job = serde_json::from_reader(io::BufReader::new(file))
        .with_context(|| format!("failed to parse job `{}`", path.display()))?;

    let recorder = TraceRecorder::for_platform("local");
    let mut cx = Invocation::new();
    let trace = set_bencher::handle(&recorder, &mut cx, &job).await;

    write_json(io::stdout().lock(), &trace)
}

fn write_json<W: Write, T: serde::Serialize>(mut writer: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
