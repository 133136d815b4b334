// CLASSIFICATION: COMMUNITY
// Filename: blackboxctl.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

use std::path::PathBuf;
use std::sync::Arc;

use blackbox::{get_config, read_record, Blackbox, BlackboxConfig, FileModule, HostPlatform};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blackboxctl", about = "Drive the blackbox fault recorder", version = "0.1")]
struct Cli {
    /// TOML configuration; defaults and environment overrides otherwise
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a fault and, unless --no-reset, reboot (exit the process)
    Notify {
        #[arg(long)]
        event: String,
        #[arg(long, default_value = "kernel")]
        module: String,
        #[arg(long, default_value = "")]
        desc: String,
        #[arg(long = "no-reset")]
        no_reset: bool,
    },
    /// Print the current fault record
    LastLog,
    /// Move the previous record into a per-boot directory
    SaveLast {
        #[arg(long, default_value = "kernel")]
        module: String,
    },
}

fn run(cli: Cli) -> blackbox::Result<()> {
    let config = match &cli.config {
        Some(path) => BlackboxConfig::load(path)?,
        None => get_config()?,
    };
    let record_path = config.fault_log_path();
    let bbox = Blackbox::new(config.clone(), Arc::new(HostPlatform::from_config(&config)))?;

    match cli.command {
        Commands::Notify {
            event,
            module,
            desc,
            no_reset,
        } => {
            bbox.register_module(Arc::new(FileModule::from_config(&module, &config)))?;
            let report = bbox.notify_error(&event, &module, &desc, !no_reset)?;
            println!(
                "recorded {} from {} (persisted: {}, previous saved: {})",
                report.info.event(),
                report.info.module(),
                report.persisted,
                report.previous_saved
            );
            for failure in &report.failures {
                eprintln!("  failure: {failure}");
            }
        }
        Commands::LastLog => match read_record(&record_path)? {
            Some(info) => {
                println!("event: {}", info.event());
                println!("module: {}", info.module());
                println!("errorDesc: {}", info.error_desc());
            }
            None => println!("no fault record at {}", record_path.display()),
        },
        Commands::SaveLast { module } => {
            bbox.register_module(Arc::new(FileModule::from_config(&module, &config)))?;
            let saved = bbox.save_last_logs()?;
            println!("saved {saved} last log(s)");
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {}", err);
        std::process::exit(err.status().unsigned_abs() as i32);
    }
}
