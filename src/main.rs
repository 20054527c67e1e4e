//! smallchat-client - a minimal interactive TCP chat client.
//!
//! Connects to a chat server, forwards every line typed on stdin and prints
//! everything the server sends back, until the server hangs up or the user
//! interrupts it.

mod client;
mod config;
mod console;
mod error;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::Parser;
use config::Config;
use error::{ChatError, EXIT_OK};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: smallchat-client <host> <port>";

#[derive(Parser, Debug)]
#[command(name = "smallchat-client")]
#[command(author, version, about = "A minimal interactive TCP chat client")]
struct Cli {
    /// Server host name or address
    #[arg(value_name = "HOST", value_parser = parse_host)]
    host: String,

    /// Server TCP port
    #[arg(value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Edit lines in raw terminal mode, keeping server output above the prompt
    #[arg(short = 'e', long)]
    editor: bool,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn parse_host(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("host must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

/// Parse the command line. Help and version requests come back as errors
/// too; the caller decides how to report them.
fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Reduce a clap error to a single diagnostic line.
fn usage_error(err: &clap::Error) -> ChatError {
    if err.kind() == ErrorKind::MissingRequiredArgument {
        if let Some(ContextValue::Strings(args)) = err.get(ContextKind::InvalidArg) {
            return ChatError::Usage(format!("missing required argument: {}", args.join(" ")));
        }
    }

    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or("invalid arguments");
    let line = line.strip_prefix("error: ").unwrap_or(line);
    ChatError::Usage(line.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let err = usage_error(&e);
            eprintln!("{}", USAGE);
            eprintln!("Error: {}", err);
            std::process::exit(err.exit_code());
        }
    };

    let code = match run(cli).await {
        Ok(outcome) => {
            debug!("Exiting after {:?}", outcome);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> error::Result<client::Outcome> {
    // Installed before anything slow, so Ctrl-C during DNS or connect is
    // handled rather than killing the process.
    let mut shutdown = ShutdownSignal::install();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(ChatError::Config)?;
    if cli.editor {
        config.client.editor = true;
    }

    init_logging(cli.verbose, config.log_filter.as_deref());

    let Some(connection) = client::connect_until(&cli.host, cli.port, shutdown.recv()).await?
    else {
        println!("{}", client::Outcome::Interrupted.notice());
        return Ok(client::Outcome::Interrupted);
    };
    let console = console::create_console(&config.client);

    client::Session::new(connection, console, config.client.read_buffer)
        .run(shutdown.recv())
        .await
}

/// Initialize logging. Logs go to stderr so the chat on stdout stays clean.
fn init_logging(verbose: bool, config_filter: Option<&str>) {
    let default_filter = if verbose {
        "smallchat_client=debug"
    } else {
        config_filter.unwrap_or("smallchat_client=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Ctrl-C, or SIGTERM on Unix. Handlers are registered by `install`, not
/// on first poll.
struct ShutdownSignal {
    #[cfg(unix)]
    signals: Option<(
        tokio::signal::unix::Signal,
        tokio::signal::unix::Signal,
    )>,
    #[cfg(windows)]
    ctrl_c: Option<tokio::signal::windows::CtrlC>,
}

impl ShutdownSignal {
    #[cfg(unix)]
    fn install() -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let signals = signal(SignalKind::interrupt())
            .and_then(|interrupt| Ok((interrupt, signal(SignalKind::terminate())?)));
        if let Err(e) = &signals {
            warn!("Cannot listen for Ctrl-C/SIGTERM: {}", e);
        }
        Self {
            signals: signals.ok(),
        }
    }

    #[cfg(windows)]
    fn install() -> Self {
        let ctrl_c = tokio::signal::windows::ctrl_c();
        if let Err(e) = &ctrl_c {
            warn!("Cannot listen for Ctrl-C: {}", e);
        }
        Self {
            ctrl_c: ctrl_c.ok(),
        }
    }

    /// Resolves when a signal arrives. Never resolves if no handler could
    /// be installed.
    async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some((interrupt, terminate)) = &mut self.signals {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
            return;
        }

        #[cfg(windows)]
        if let Some(ctrl_c) = &mut self.ctrl_c {
            ctrl_c.recv().await;
            return;
        }

        std::future::pending::<()>().await
    }
}
