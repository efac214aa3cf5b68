// SPDX-License-Identifier: MIT OR Apache-2.0
//! `RoboLab` - learn object-oriented programming with animated robots
//!
//! A small lab featuring:
//! - Crane/claw machines with grab and drop sequences
//! - Conveyor belts carrying item tokens
//! - Autoplay of the whole factory floor
//! - Challenge questions on properties, methods, encapsulation,
//!   inheritance and polymorphism
//!
//! ## Usage
//!
//! ```text
//! robolab [run] [settings.ron]     autoplay the floor, one JSON line per snapshot
//! robolab init [settings.ron]      write default settings
//! robolab quiz                     list challenges
//! robolab quiz <id> <answer>       check an answer
//! ```

mod autoplay;
mod presenter;
mod quiz;
mod settings;

use presenter::Presenter;
use robolab_sequencer::{ConfigError, Factory};
use settings::{LabSettings, SettingsError, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log directives used when `RUST_LOG` is not set
const DEFAULT_LOG_DIRECTIVES: &str = "robolab_app=debug,robolab_sequencer=debug";

/// Application errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Settings could not be loaded or saved
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// A robot could not be built
    #[error(transparent)]
    Robot(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad command line
    #[error("{0}")]
    Usage(String),
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    // Snapshots go to stdout, logs to stderr.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting RoboLab v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = dispatch(&args) {
        tracing::error!("RoboLab failed: {e}");
        std::process::exit(1);
    }
}

fn dispatch(args: &[String]) -> Result<(), AppError> {
    match args.first().map(String::as_str) {
        Some("init") => init(args.get(1).map(PathBuf::from)),
        Some("quiz") => run_quiz(&args[1..]),
        Some("run") => run_floor(args.get(1).map(PathBuf::from)),
        Some(path) if !path.starts_with('-') => run_floor(Some(PathBuf::from(path))),
        Some(other) => Err(AppError::Usage(format!("Unknown argument: {other}"))),
        None => run_floor(None),
    }
}

fn init(path: Option<PathBuf>) -> Result<(), AppError> {
    let path = path.unwrap_or_else(|| LabSettings::settings_file_path(Path::new(".")));
    if path.exists() {
        return Err(AppError::Usage(format!("{} already exists", path.display())));
    }
    LabSettings::default().save(&path)?;
    tracing::info!("Wrote default settings to {:?}", path);
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<LabSettings, AppError> {
    match path {
        Some(path) => Ok(LabSettings::load(path)?),
        None => {
            let default_path = LabSettings::settings_file_path(Path::new("."));
            if default_path.exists() {
                Ok(LabSettings::load(&default_path)?)
            } else {
                tracing::info!("No {SETTINGS_FILE_NAME} found, using built-in lab");
                Ok(LabSettings::default())
            }
        }
    }
}

fn run_floor(path: Option<PathBuf>) -> Result<(), AppError> {
    let settings = load_settings(path.as_deref())?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let mut factory = Factory::new();
        let mut presenter = Presenter::new();

        for config in settings.scaled_cranes() {
            let id = factory.spawn_crane(config)?;
            if settings.output.cranes {
                if let Some(crane) = factory.crane(id) {
                    presenter.attach_crane(crane);
                }
            }
        }
        for config in &settings.conveyors {
            let id = factory.spawn_conveyor(config.clone(), true)?;
            if settings.output.conveyors {
                if let Some(belt) = factory.conveyor(id) {
                    presenter.attach_conveyor(belt);
                }
            }
        }
        tracing::info!(
            "Factory floor ready: {} robots, {} presented",
            factory.robot_count(),
            presenter.attached()
        );

        let report = autoplay::run(&factory, &settings.autoplay).await;
        for (serial, cycles) in &report.cycles {
            tracing::info!("Crane {serial}: {cycles} cycles");
        }
        Ok::<(), AppError>(())
    })
}

fn run_quiz(args: &[String]) -> Result<(), AppError> {
    let catalog = quiz::catalog();

    let Some(id) = args.first() else {
        for challenge in &catalog {
            println!("{:<14} {}", challenge.id, challenge.prompt);
        }
        return Ok(());
    };

    let challenge = catalog
        .iter()
        .find(|c| &c.id == id)
        .ok_or_else(|| AppError::Usage(format!("No challenge named {id}")))?;
    let input = args[1..].join(" ");
    let answer = challenge
        .parse_answer(&input)
        .ok_or_else(|| AppError::Usage(format!("Could not read answer: {input}")))?;

    let verdict = challenge.check(&answer);
    if verdict.is_accepted() {
        println!("Correct!");
    } else if let quiz::Verdict::Rejected { hint } = verdict {
        println!("Not quite. Hint: {hint}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_unknown_flag_is_usage_error() {
        assert!(matches!(dispatch(&args(&["--bogus"])), Err(AppError::Usage(_))));
    }

    #[test]
    fn test_quiz_unknown_challenge() {
        assert!(matches!(
            dispatch(&args(&["quiz", "nope", "answer"])),
            Err(AppError::Usage(_))
        ));
    }

    #[test]
    fn test_quiz_checks_answer() {
        assert!(dispatch(&args(&["quiz", "methods", "1"])).is_ok());
        assert!(matches!(
            dispatch(&args(&["quiz", "methods", "first"])),
            Err(AppError::Usage(_))
        ));
    }

    #[test]
    fn test_missing_settings_file() {
        let missing = std::env::temp_dir().join("robolab-missing/robolab.ron");
        assert!(matches!(
            dispatch(&args(&["run", missing.to_str().unwrap()])),
            Err(AppError::Settings(SettingsError::Io(_)))
        ));
    }
}
