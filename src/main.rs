use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use qualitywatch::report::{render_clean, render_run, render_trend};
use qualitywatch::config::Settings;
use qualitywatch::QualityConfig;
use qualitywatch_core::{CorruptLinePolicy, HistoryStore, DEFAULT_WINDOW};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "qualitywatch")]
#[command(about = "Evaluate quality metrics against their targets and keep their history")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, evaluate and append one run to the history
    Run {
        /// Path to the configuration file
        #[arg(short, long, default_value = "qualitywatch.toml")]
        config: PathBuf,

        /// Print the run as JSON instead of a status listing
        #[arg(long)]
        json: bool,
    },

    /// Deduplicate identical runs and compact old records
    Clean {
        /// Configuration file to take the history path and window from
        #[arg(short, long, default_value = "qualitywatch.toml")]
        config: PathBuf,

        /// Path to the history file, instead of the configured one
        #[arg(long)]
        history: Option<PathBuf>,

        /// Number of most recent records kept in full
        #[arg(short, long)]
        window: Option<usize>,

        /// Fail on unparsable lines instead of dropping them
        #[arg(long)]
        strict: bool,
    },

    /// Show recent values of a metric
    Trend {
        /// Configuration file to take the history path and window from
        #[arg(short, long, default_value = "qualitywatch.toml")]
        config: PathBuf,

        /// Path to the history file, instead of the configured one
        #[arg(long)]
        history: Option<PathBuf>,

        /// Metric id, followed by any former ids
        #[arg(long = "id", required = true)]
        ids: Vec<String>,

        /// Number of most recent lines to read
        #[arg(short, long)]
        window: Option<usize>,
    },
}

/// Resolve the history store and window for `clean` and `trend`.
///
/// The configuration file supplies the history path, window and corrupt-line
/// policy. It may only be absent when `--history` is given.
fn history_target(
    config: &Path,
    history: Option<PathBuf>,
    window: Option<usize>,
    strict: bool,
) -> Result<(HistoryStore, usize)> {
    let settings = match &history {
        Some(_) if !config.exists() => Settings::default(),
        _ => QualityConfig::load(config)?.settings,
    };
    let policy = if strict {
        CorruptLinePolicy::Abort
    } else {
        settings.corrupt_lines.into()
    };
    let window = window.unwrap_or(settings.window);
    let store = HistoryStore::new(history.unwrap_or(settings.history)).with_policy(policy);
    Ok((store, window))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut stdout = io::stdout().lock();

    match args.command {
        Command::Run { config, json } => {
            let config = QualityConfig::load(&config)?;
            let runner = config.runner()?;

            let rt = tokio::runtime::Runtime::new()?;
            let report = rt
                .block_on(runner.run(Utc::now()))
                .with_context(|| {
                    format!("Failed to record run in {}", runner.history().path().display())
                })?;

            if json {
                serde_json::to_writer_pretty(&mut stdout, &report)?;
                writeln!(stdout)?;
            } else {
                write!(stdout, "{}", render_run(&report))?;
            }
        }
        Command::Clean {
            config,
            history,
            window,
            strict,
        } => {
            let (store, window) = history_target(&config, history, window, strict)?;
            let report = store
                .clean_history(window)
                .with_context(|| format!("Failed to clean {}", store.path().display()))?;
            write!(stdout, "{}", render_clean(&report))?;
        }
        Command::Trend {
            config,
            history,
            ids,
            window,
        } => {
            let (store, window) = history_target(&config, history, window, false)?;
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let points = store
                .recent(&ids, window)
                .with_context(|| format!("Failed to read {}", store.path().display()))?;
            let id = ids.first().copied().unwrap_or_default();
            write!(stdout, "{}", render_trend(id, &points))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn trend_accepts_former_ids() {
        let args = Args::try_parse_from([
            "qualitywatch",
            "trend",
            "--history",
            "h.jsonl",
            "--id",
            "new",
            "--id",
            "old",
        ])
        .unwrap();

        match args.command {
            Command::Trend { ids, window, .. } => {
                assert_eq!(ids, vec!["new", "old"]);
                assert_eq!(window, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn trend_requires_an_id() {
        assert!(Args::try_parse_from(["qualitywatch", "trend", "--history", "h.jsonl"]).is_err());
    }

    #[test]
    fn explicit_history_skips_a_missing_config_file() {
        let (store, window) = history_target(
            Path::new("does-not-exist.toml"),
            Some("h.jsonl".into()),
            None,
            false,
        )
        .unwrap();
        assert_eq!(store.path(), Path::new("h.jsonl"));
        assert_eq!(store.policy(), CorruptLinePolicy::Skip);
        assert_eq!(window, DEFAULT_WINDOW);
    }

    #[test]
    fn missing_config_without_history_is_an_error() {
        assert!(history_target(Path::new("does-not-exist.toml"), None, None, false).is_err());
    }

    #[test]
    fn window_comes_from_the_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("qualitywatch.toml");
        std::fs::write(&path, "[settings]\nhistory = \"runs.jsonl\"\nwindow = 40\n").unwrap();

        let (store, window) = history_target(&path, None, None, false).unwrap();
        assert_eq!(store.path(), Path::new("runs.jsonl"));
        assert_eq!(window, 40);

        let (_, window) = history_target(&path, None, Some(7), false).unwrap();
        assert_eq!(window, 7);
    }

    #[test]
    fn strict_flag_aborts_on_corrupt_lines() {
        let (store, _) = history_target(
            Path::new("does-not-exist.toml"),
            Some("h.jsonl".into()),
            None,
            true,
        )
        .unwrap();
        assert_eq!(store.policy(), CorruptLinePolicy::Abort);
    }

    #[test]
    fn configured_abort_policy_protects_corrupt_lines_from_clean() {
        let dir = tempfile::TempDir::new().unwrap();
        let history = dir.path().join("history.jsonl");
        let content = concat!(
            "{\"date\":\"2024-01-01T00:00:00Z\",\"m\":1.0}\n",
            "NOT JSON\n",
            "{\"date\":\"2024-01-02T00:00:00Z\",\"m\":1.0}\n",
        );
        std::fs::write(&history, content).unwrap();

        let config = dir.path().join("qualitywatch.toml");
        std::fs::write(
            &config,
            format!(
                "[settings]\nhistory = {:?}\ncorrupt_lines = \"abort\"\n",
                history.display().to_string()
            ),
        )
        .unwrap();

        let (store, window) = history_target(&config, None, None, false).unwrap();
        assert_eq!(store.policy(), CorruptLinePolicy::Abort);
        assert!(store.clean_history(window).is_err());
        assert_eq!(std::fs::read_to_string(&history).unwrap(), content);

        // An explicit history path still honours the configured policy.
        let (store, _) = history_target(&config, Some(history.clone()), None, false).unwrap();
        assert_eq!(store.policy(), CorruptLinePolicy::Abort);
    }
}
