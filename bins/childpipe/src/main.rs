use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use childpipe_common::HandleId;
use childpipe_process::{quote_command_line, EnvironmentBlock, ProcessTable, TableConfig};

/// Exit status reported when Ctrl+C ended the child.
const INTERRUPTED_STATUS: i32 = 130;

/// childpipe - run a child process through the handle API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the arguments joined into one quoted command line
    Quote {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Launch a program and relay its standard streams
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Set an environment variable for the child (KEY=VALUE, repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Start from an empty environment instead of inheriting this one
    #[arg(long)]
    clear_env: bool,

    /// Append the child's stdout to FILE
    #[arg(long, value_name = "FILE")]
    stdout: Option<PathBuf>,

    /// Append the child's stderr to FILE
    #[arg(long, value_name = "FILE")]
    stderr: Option<PathBuf>,

    /// Program and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Quote { args } => {
            println!("{}", quote_command_line(&args));
            Ok(())
        }
        Command::Run(args) => {
            let config = match &args.config {
                Some(path) => TableConfig::load_from_file(path)?,
                None => TableConfig::default(),
            };
            initialize_logging(cli.debug, &config.log_level)?;

            let status = run(args, config).await?;
            std::process::exit(status);
        }
    }
}

fn initialize_logging(debug: bool, configured_level: &str) -> Result<()> {
    let level = if debug { "debug" } else { configured_level };

    // stderr keeps our logs out of the relayed child stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

async fn run(args: RunArgs, config: TableConfig) -> Result<i32> {
    let command_line = quote_command_line(&args.command);
    let environment = build_environment(&args)?;
    info!("Launching: {}", command_line);

    let table = Arc::new(ProcessTable::new(config));
    let handle = table.create_process(
        &command_line,
        environment.as_deref(),
        args.stdout.as_deref(),
        args.stderr.as_deref(),
    );

    if table.pid(handle) < 0 {
        let reason = table.get_last_error(handle);
        table.dispose(handle);
        bail!("Failed to launch {}: {}", command_line, reason);
    }
    info!("Child started (PID: {})", table.pid(handle));

    let mut pumps = Vec::new();
    if args.stdout.is_none() {
        pumps.push(spawn_pump(Arc::clone(&table), handle, Pump::Stdout)?);
    }
    if args.stderr.is_none() {
        pumps.push(spawn_pump(Arc::clone(&table), handle, Pump::Stderr)?);
    }
    // Not joined: it may stay blocked on our own stdin after the child exits.
    spawn_stdin_forwarder(Arc::clone(&table), handle)?;

    let waiter = {
        let table = Arc::clone(&table);
        tokio::task::spawn_blocking(move || table.wait_for(handle))
    };
    tokio::pin!(waiter);

    let status = tokio::select! {
        code = &mut waiter => code.context("Wait task failed")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, terminating child");
            table.interrupt(handle);
            if !table.terminate(handle) {
                warn!("Terminate failed: {}", table.get_last_error(handle));
            }
            waiter.await.context("Wait task failed")?;
            INTERRUPTED_STATUS
        }
    };

    for pump in pumps {
        if pump.join().is_err() {
            warn!("Output pump panicked");
        }
    }
    table.dispose(handle);

    info!("Child exited with status {}", status);
    Ok(status)
}

fn build_environment(args: &RunArgs) -> Result<Option<Vec<u8>>> {
    if !args.clear_env && args.env.is_empty() {
        return Ok(None);
    }

    let mut vars: BTreeMap<OsString, OsString> = if args.clear_env {
        BTreeMap::new()
    } else {
        std::env::vars_os().collect()
    };
    for assignment in &args.env {
        let (key, value) = assignment
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| anyhow!("Invalid --env value, expected KEY=VALUE: {}", assignment))?;
        vars.insert(key.into(), value.into());
    }

    debug!("Child environment has {} variables", vars.len());
    Ok(Some(EnvironmentBlock::from_pairs(vars).encode()))
}

#[derive(Debug, Clone, Copy)]
enum Pump {
    Stdout,
    Stderr,
}

fn spawn_pump(
    table: Arc<ProcessTable>,
    handle: HandleId,
    pump: Pump,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("childpipe-{:?}", pump).to_lowercase())
        .spawn(move || {
            let mut buf = [0u8; 8192];
            let len = buf.len() as i64;
            loop {
                let n = match pump {
                    Pump::Stdout => table.read_stdout(handle, &mut buf, 0, len),
                    Pump::Stderr => table.read_stderr(handle, &mut buf, 0, len),
                };
                if n < 0 {
                    let error = table.get_last_error(handle);
                    if !error.is_empty() {
                        warn!("{:?} pump stopped: {}", pump, error);
                    }
                    break;
                }
                let chunk = &buf[..n as usize];
                let written = match pump {
                    Pump::Stdout => {
                        let mut out = std::io::stdout().lock();
                        out.write_all(chunk).and_then(|()| out.flush())
                    }
                    Pump::Stderr => std::io::stderr().lock().write_all(chunk),
                };
                if let Err(e) = written {
                    warn!("{:?} relay failed: {}", pump, e);
                    break;
                }
            }
        })
        .context("Failed to start output pump")
}

fn spawn_stdin_forwarder(table: Arc<ProcessTable>, handle: HandleId) -> Result<()> {
    thread::Builder::new()
        .name("childpipe-stdin".to_string())
        .spawn(move || {
            let mut buf = [0u8; 8192];
            let mut input = std::io::stdin().lock();
            loop {
                let n = match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Reading stdin failed: {}", e);
                        break;
                    }
                };
                let mut sent = 0;
                while sent < n {
                    let written = table.write_stdin(handle, &buf, sent as i64, (n - sent) as i64);
                    if written < 0 {
                        debug!("Child stdin no longer accepts input");
                        return;
                    }
                    sent += written as usize;
                }
            }
            table.close_stdin(handle);
        })
        .context("Failed to start stdin forwarder")?;
    Ok(())
}
