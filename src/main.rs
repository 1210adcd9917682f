//! Network Speed Tester - Main CLI Application
//!
//! Measures latency, jitter, packet loss and download/upload throughput
//! against an HTTP speed-test server.

use clap::Parser;
use network_speed_tester::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, ValidationLevel},
    error::{AppError, ErrorReporter, Result},
    executor::SpeedTestExecutor,
    output::{ConsoleReporter, OutputCoordinator, OutputFormatterFactory},
    build_info,
};
use std::{process, sync::Arc};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue at: https://github.com/MaurUppi/network-speed-tester/issues");
        process::exit(99);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    if cli.should_show_topic_help() {
        println!("{}", cli.display_help());
        return;
    }

    let use_color = cli.use_colors();
    let verbose = cli.verbose;

    if let Err(e) = run_application(cli).await {
        ErrorReporter::new(use_color, verbose).report_error(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    if cli.debug {
        eprintln!("{}", build_info::summary());
        eprintln!("Debug mode enabled");
        eprintln!();
    }

    let config = load_config(cli)?;

    for warning in validate_config(&config)? {
        if warning.level != ValidationLevel::Info || config.verbose {
            eprintln!("{}", warning.format(config.enable_color));
        }
    }

    if config.verbose {
        eprintln!("{}", display_config_summary(&config));
        eprintln!();
    }

    let executor = SpeedTestExecutor::from_config(config.clone())?;
    let reporter = Arc::new(ConsoleReporter::new(
        OutputFormatterFactory::create_formatter(config.enable_color, config.verbose),
        !config.json_output,
    ));

    if !config.json_output {
        eprintln!("Testing against {} ...", config.server_url);
    }

    let report = tokio::select! {
        report = executor.run(reporter) => report?,
        _ = tokio::signal::ctrl_c() => {
            return Err(AppError::test_execution("Interrupted before all phases completed"));
        }
    };

    let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(
        config.enable_color,
        config.verbose,
    ));

    if config.json_output {
        println!("{}", coordinator.display_json(&report)?);
    } else {
        println!();
        println!("{}", coordinator.display_report(&report)?);
    }

    if report.is_total_failure() {
        return Err(AppError::test_execution(format!(
            "No measurement succeeded against {}",
            report.server_url
        )));
    }

    Ok(())
}
