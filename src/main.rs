use std::path::PathBuf;

use clap::Parser;

use enforcerd::config::{EnforcerConfig, DEFAULT_CONFIG_PATH};
use enforcerd::engine::Engine;
use enforcerd::logging;

/// OpenDNSSEC-style key and signing policy enforcer daemon.
#[derive(Parser, Debug)]
#[command(name = "enforcerd", version, about)]
struct Cli {
    /// Run once, then exit.
    #[arg(short = '1', long = "single-run")]
    single_run: bool,

    /// Do not daemonize (this shell never forks; kept for CLI
    /// compatibility with the original flag set).
    #[arg(short = 'd', long = "no-daemon")]
    no_daemon: bool,

    /// Print the resolved configuration and exit.
    #[arg(short = 'i', long = "info")]
    info: bool,

    /// Increase verbosity. Repeatable.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Read configuration from file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = EnforcerConfig::load(&cli.config)?;
    if cli.verbose > 0 {
        config.log_level = config.log_level.bump(cli.verbose);
    }
    logging::init(config.log_level);

    if cli.info {
        println!("{config:#?}");
        return Ok(());
    }

    let _ = cli.no_daemon;
    let engine = Engine::new(config);
    if cli.single_run {
        engine.run_single();
        Ok(())
    } else {
        engine.run_daemon()
    }
}
