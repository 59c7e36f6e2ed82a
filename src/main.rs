//! dlog - interactive terminal viewer for container logs.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use dlog::{Application, Config, DockerSource};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("dlog")
        .version(dlog::VERSION)
        .about("Interactive terminal viewer for container logs")
        .long_about(
            "dlog attaches to the local container daemon, follows one container's \
             stdout/stderr, pages older history in on demand, and offers less-like \
             scrolling with composable filters and search.",
        )
        .arg(
            Arg::new("tail")
                .long("tail")
                .value_name("N")
                .help("Number of records to fetch when following starts")
                .default_value("1000"),
        )
        .arg(
            Arg::new("noload")
                .long("noload")
                .help("Disable loading older logs in the background")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("shift")
                .long("shift")
                .value_name("SECONDS")
                .help("Back-fill window size in seconds")
                .default_value("86400"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Write debug messages to dlog-debug.log in the temp directory")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config = Config {
        tail: matches
            .get_one::<String>("tail")
            .expect("has default")
            .parse()
            .context("--tail expects a line count")?,
        noload: matches.get_flag("noload"),
        time_shift: matches
            .get_one::<String>("shift")
            .expect("has default")
            .parse()
            .context("--shift expects seconds")?,
        debug: matches.get_flag("debug"),
    };

    init_logging(config.debug);

    let source = match DockerSource::connect().await {
        Ok(source) => Arc::new(source),
        Err(e) => {
            eprintln!("Can't connect to container daemon: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = Application::run(source, config).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Route log output to a file in the temp directory: stderr belongs to the
/// raw-mode terminal. `--debug` (or a non-empty `DEBUG` env var) enables
/// debug level; otherwise only an explicit `RUST_LOG` produces output.
fn init_logging(debug: bool) {
    let debug = debug
        || std::env::var("DEBUG")
            .map(|v| !v.is_empty())
            .unwrap_or(false);

    let path = std::env::temp_dir().join("dlog-debug.log");
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    if let Ok(file) = std::fs::File::create(path) {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
}
