//! FlowRunner CLI Entry Point
//!
//! Provides command-line interface for workflow execution.
//!
//! # Usage
//!
//! ```bash
//! # Execute a workflow
//! flowrunner workflow.yaml
//!
//! # With a trigger payload
//! flowrunner workflow.yaml --trigger event.json
//!
//! # Validate a definition without running it
//! flowrunner workflow.yaml --validate
//!
//! # Verbose logging
//! flowrunner workflow.yaml --verbose
//! ```

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info};
use serde_json::Value;

use flowrunner::execution::{
    Engine, WorkflowEvent, STEP_COMPLETE, STEP_ERROR, STEP_SKIPPED, STEP_START,
};
use flowrunner::workflow::parser::{load_definition, load_trigger};
use flowrunner::workflow::validate_definition;
use flowrunner::{APP_NAME, VERSION};

/// Default workflow file used when none is specified.
const DEFAULT_WORKFLOW: &str = "workflow.yaml";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    workflow_path: String,
    trigger_path: Option<String>,
    validate_only: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow_path: DEFAULT_WORKFLOW.to_string(),
            trigger_path: None,
            validate_only: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Declarative Workflow Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: flowrunner [OPTIONS] <WORKFLOW_FILE>");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW_FILE>     Path to workflow YAML file");
    println!();
    println!("Options:");
    println!("  --trigger FILE      JSON file with the trigger payload");
    println!("  --validate          Validate the definition and exit");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  flowrunner onboarding.yaml");
    println!("  flowrunner onboarding.yaml --trigger new-hire.json");
    println!("  flowrunner onboarding.yaml --validate");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--validate" => {
                config.validate_only = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--trigger" => {
                i += 1;
                if i >= args.len() {
                    return Err("--trigger requires a file argument".to_string());
                }
                config.trigger_path = Some(args[i].clone());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                // Positional argument
                match positional_index {
                    0 => config.workflow_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Subscribes console progress handlers to the engine's lifecycle events.
fn subscribe_progress(engine: &Engine) {
    engine.subscribe(STEP_START, |event: &WorkflowEvent| {
        if let Some(step_id) = &event.step_id {
            println!("  {} {}", "▶".blue(), step_id);
        }
    });
    engine.subscribe(STEP_COMPLETE, |event: &WorkflowEvent| {
        if let Some(step_id) = &event.step_id {
            println!("  {} {}", "✓".green(), step_id);
        }
    });
    engine.subscribe(STEP_SKIPPED, |event: &WorkflowEvent| {
        if let Some(step_id) = &event.step_id {
            println!("  {} {} (skipped)", "-".yellow(), step_id);
        }
    });
    engine.subscribe(STEP_ERROR, |event: &WorkflowEvent| {
        if let Some(step_id) = &event.step_id {
            let message = event.error.as_deref().unwrap_or("unknown error");
            println!("  {} {}: {}", "✗".red(), step_id, message);
        }
    });
}

/// Main application entry point.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    // Print banner
    print_banner();

    // Load workflow definition
    info!("Loading workflow: {}", config.workflow_path);
    let definition = load_definition(&config.workflow_path).map_err(|e| {
        error!("Failed to load workflow: {}", e);
        format!(
            "Could not load workflow from '{}': {}",
            config.workflow_path, e
        )
    })?;

    info!(
        "Workflow loaded: '{}', {} top-level steps",
        definition.metadata.name,
        definition.steps.len()
    );

    if config.validate_only {
        // load_definition already validated; re-run for the explicit report
        validate_definition(&definition)?;
        println!("{} '{}' is valid", "✓".green(), definition.metadata.name);
        return Ok(());
    }

    // Load trigger payload
    let trigger = match &config.trigger_path {
        Some(path) => {
            info!("Loading trigger: {}", path);
            load_trigger(path)?
        }
        None => Value::Object(serde_json::Map::new()),
    };

    // Create engine and execute
    let engine = Engine::new();
    subscribe_progress(&engine);

    println!("Running '{}'", definition.metadata.name.bold());
    println!();

    match engine.execute(&definition, trigger).await {
        Ok(context) => {
            println!();
            println!(
                "{} Workflow '{}' completed: {} steps in {}ms",
                "✓".green().bold(),
                context.workflow_id,
                context.step_results.len(),
                context.elapsed_ms()
            );
            if !context.errors.is_empty() {
                println!(
                    "{} {} non-fatal error(s):",
                    "!".yellow(),
                    context.errors.len()
                );
                for recorded in &context.errors {
                    println!("    {}", recorded);
                }
            }
            Ok(())
        }
        Err(failure) => {
            println!();
            println!(
                "{} Workflow '{}' failed after {} step(s)",
                "✗".red().bold(),
                failure.context.workflow_id,
                failure.context.step_results.len()
            );
            Err(failure.to_string().into())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
