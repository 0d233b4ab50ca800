//! Configuration file loading.
//!
//! A TOML file describes where the history lives, which sources exist and
//! which metrics are evaluated. Any setting can be overridden from the
//! environment with the `QUALITYWATCH` prefix and `__` as the section
//! separator, e.g. `QUALITYWATCH_SETTINGS__HISTORY=/tmp/history.jsonl`.
//!
//! ```toml
//! [settings]
//! history = "history.jsonl"
//! max_concurrent = 8
//! timeout_secs = 30
//!
//! [[sources]]
//! name = "manual"
//! kind = "static"
//! values = [{ subject = "team-a", value = ":-)" }]
//!
//! [[sources]]
//! name = "sonar"
//! kind = "http"
//! endpoint = "http://sonar.local:9000/api/measures"
//! pointer = "/value"
//!
//! [[metrics]]
//! id = "violations"
//! unit = "violations"
//! source = "sonar"
//! subject = "my-project"
//! direction = "lower"
//! target = 0
//! low_target = 2
//! technical_debt = { initial_value = 50, initial_date = "2024-01-01", end_value = 0, end_date = "2024-12-31" }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use config::{Config, Environment, File, FileFormat};
use qualitywatch_adapters::http::HttpJsonSource;
use qualitywatch_adapters::{CircuitBreaker, Fetcher, MetricSource, StaticSource};
use qualitywatch_core::{
    Bucket, CorruptLinePolicy, Direction, DynamicTechnicalDebtTarget, HistoryStore, Measurement,
    MetaMetrics, MetricDefinition, OrdinalScale, Runner, TechnicalDebtTarget, Targets,
    ZeroOverZero, DEFAULT_WINDOW,
};
use serde::Deserialize;
use tracing::info;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "QUALITYWATCH";

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default)]
    pub meta: MetaConfig,
}

/// Run-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the history file.
    pub history: PathBuf,
    /// Lines read for trends and kept in full when cleaning.
    pub window: usize,
    /// Maximum number of fetches in flight.
    pub max_concurrent: usize,
    /// Per-fetch timeout.
    pub timeout_secs: u64,
    /// Retry a timed-out host after this long within a run.
    pub cool_down_secs: Option<u64>,
    pub corrupt_lines: CorruptLines,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history: PathBuf::from("history.jsonl"),
            window: DEFAULT_WINDOW,
            max_concurrent: qualitywatch_adapters::DEFAULT_MAX_CONCURRENT,
            timeout_secs: qualitywatch_adapters::DEFAULT_TIMEOUT.as_secs(),
            cool_down_secs: None,
            corrupt_lines: CorruptLines::Skip,
        }
    }
}

/// Handling of unparsable history lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptLines {
    #[default]
    Skip,
    Abort,
}

impl From<CorruptLines> for CorruptLinePolicy {
    fn from(value: CorruptLines) -> Self {
        match value {
            CorruptLines::Skip => CorruptLinePolicy::Skip,
            CorruptLines::Abort => CorruptLinePolicy::Abort,
        }
    }
}

/// A metric source.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Fixed values per subject.
    Static {
        name: String,
        #[serde(default)]
        values: Vec<StaticValue>,
    },
    /// One JSON value per subject from `{endpoint}/{subject}`.
    Http {
        name: String,
        endpoint: String,
        pointer: Option<String>,
        username: Option<String>,
        password: Option<String>,
    },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::Static { name, .. } | SourceConfig::Http { name, .. } => name,
        }
    }

    fn build(&self) -> Result<Arc<dyn MetricSource>> {
        match self {
            SourceConfig::Static { name, values } => {
                let source = values
                    .iter()
                    .fold(StaticSource::builder(name.clone()), |builder, v| {
                        let builder = builder.value(v.subject.clone(), v.value.measurement());
                        match &v.url {
                            Some(url) => builder.url(v.subject.clone(), url.clone()),
                            None => builder,
                        }
                    })
                    .build();
                Ok(Arc::new(source))
            }
            SourceConfig::Http {
                name,
                endpoint,
                pointer,
                username,
                password,
            } => {
                let mut builder = HttpJsonSource::builder(name.clone()).endpoint(endpoint.clone());
                if let Some(pointer) = pointer {
                    builder = builder.pointer(pointer.clone());
                }
                if let (Some(username), Some(password)) = (username, password) {
                    builder = builder.credentials(username.clone(), password.clone());
                }
                let source = builder
                    .build()
                    .with_context(|| format!("Invalid HTTP source {name}"))?;
                Ok(Arc::new(source))
            }
        }
    }
}

/// One entry of a static source.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticValue {
    pub subject: String,
    pub value: RawValue,
    pub url: Option<String>,
}

/// A number, or a string holding an RFC 3339 date or an ordinal label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    fn measurement(&self) -> Measurement {
        match self {
            RawValue::Number(n) => Measurement::from_raw(*n),
            RawValue::Text(text) => match DateTime::parse_from_rfc3339(text) {
                Ok(date) => Measurement::Date(date.with_timezone(&Utc)),
                Err(_) => Measurement::label(text.clone()),
            },
        }
    }
}

/// Comparison direction of a numeric metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionConfig {
    #[default]
    Lower,
    Higher,
}

/// What `0/0` means for a percentage metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroOverZeroConfig {
    #[default]
    Zero,
    Hundred,
}

/// A numeric threshold or an ordinal label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Number(f64),
    Label(String),
}

/// Accepted technical debt.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DebtConfig {
    Dynamic {
        initial_value: f64,
        initial_date: NaiveDate,
        end_value: f64,
        end_date: NaiveDate,
        #[serde(default)]
        decimals: u32,
    },
    Static {
        value: f64,
        explanation: String,
    },
}

impl DebtConfig {
    fn build(&self) -> Result<TechnicalDebtTarget> {
        Ok(match self {
            DebtConfig::Dynamic {
                initial_value,
                initial_date,
                end_value,
                end_date,
                decimals,
            } => DynamicTechnicalDebtTarget::new(
                *initial_value,
                midnight(*initial_date),
                *end_value,
                midnight(*end_date),
            )?
            .with_decimals(*decimals)
            .into(),
            DebtConfig::Static { value, explanation } => {
                TechnicalDebtTarget::fixed(*value, explanation.clone())
            }
        })
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// One metric.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub former_ids: Vec<String>,
    pub source: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub direction: DirectionConfig,
    #[serde(default)]
    pub percentage: bool,
    #[serde(default)]
    pub zero_over_zero: ZeroOverZeroConfig,
    pub target: Threshold,
    pub low_target: Threshold,
    pub perfect_value: Option<f64>,
    pub technical_debt: Option<DebtConfig>,
    /// Ordinal labels from worst to best; makes the metric ordinal.
    pub ranks: Option<Vec<String>>,
    #[serde(default)]
    pub decimals: u32,
}

impl MetricConfig {
    fn direction(&self) -> Direction {
        let zero_over_zero = match self.zero_over_zero {
            ZeroOverZeroConfig::Zero => ZeroOverZero::Zero,
            ZeroOverZeroConfig::Hundred => ZeroOverZero::Hundred,
        };
        match (self.percentage, self.direction) {
            (true, DirectionConfig::Lower) => Direction::lower_percentage(zero_over_zero),
            (true, DirectionConfig::Higher) => Direction::higher_percentage(zero_over_zero),
            (false, DirectionConfig::Lower) => Direction::LowerIsBetter,
            (false, DirectionConfig::Higher) => Direction::HigherIsBetter,
        }
    }

    fn build(&self) -> Result<MetricDefinition> {
        let mut builder = MetricDefinition::builder(self.id.clone())
            .unit(self.unit.clone())
            .decimals(self.decimals);
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        for former in &self.former_ids {
            builder = builder.former_id(former.clone());
        }
        match (&self.source, &self.subject) {
            (Some(source), Some(subject)) => builder = builder.source(source.clone(), subject.clone()),
            (Some(_), None) => bail!("Metric {} names a source but no subject", self.id),
            _ => {}
        }

        builder = match &self.ranks {
            Some(ranks) => {
                let (Threshold::Label(target), Threshold::Label(low)) =
                    (&self.target, &self.low_target)
                else {
                    bail!("Metric {}: ordinal targets must be labels", self.id);
                };
                builder.ordinal(OrdinalScale::new(&self.id, ranks.clone(), target, low)?)
            }
            None => {
                let (Threshold::Number(target), Threshold::Number(low)) =
                    (&self.target, &self.low_target)
                else {
                    bail!("Metric {}: numeric targets must be numbers", self.id);
                };
                let mut targets = Targets::new(*target, *low);
                if let Some(debt) = &self.technical_debt {
                    targets = targets.with_technical_debt(
                        debt.build()
                            .with_context(|| format!("Metric {}: invalid technical debt", self.id))?,
                    );
                }
                let builder = builder.direction(self.direction()).targets(targets);
                match self.perfect_value {
                    Some(value) => builder.perfect_value(value),
                    None => builder,
                }
            }
        };

        Ok(builder.build()?)
    }
}

/// Thresholds of one meta-metric.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MetaTargets {
    pub target: f64,
    pub low_target: f64,
}

/// Meta-metric threshold overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaConfig {
    pub green: Option<MetaTargets>,
    pub red: Option<MetaTargets>,
    pub yellow: Option<MetaTargets>,
    pub grey: Option<MetaTargets>,
    pub missing: Option<MetaTargets>,
}

impl MetaConfig {
    fn build(&self) -> Result<MetaMetrics> {
        let overrides = [
            (Bucket::Green, self.green),
            (Bucket::Red, self.red),
            (Bucket::Yellow, self.yellow),
            (Bucket::Grey, self.grey),
            (Bucket::Missing, self.missing),
        ];
        let mut meta = MetaMetrics::new()?;
        for (bucket, targets) in overrides {
            if let Some(t) = targets {
                meta = meta.with_targets(bucket, Targets::new(t.target, t.low_target))?;
            }
        }
        Ok(meta)
    }
}

impl QualityConfig {
    /// Load a configuration file with environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = config
            .try_deserialize()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!(
            path = %path.display(),
            sources = config.sources.len(),
            metrics = config.metrics.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse a TOML configuration without environment overrides.
    pub fn parse(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// The history store described by the settings.
    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(&self.settings.history).with_policy(self.settings.corrupt_lines.into())
    }

    /// The fetcher described by the settings.
    pub fn fetcher(&self) -> Fetcher {
        let breaker = match self.settings.cool_down_secs {
            Some(secs) => CircuitBreaker::with_cool_down(Duration::from_secs(secs)),
            None => CircuitBreaker::new(),
        };
        Fetcher::builder()
            .max_concurrent(self.settings.max_concurrent)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .breaker(Arc::new(breaker))
            .build()
    }

    /// Validate everything and assemble a runner.
    pub fn runner(&self) -> Result<Runner> {
        let mut builder = Runner::builder(self.history())
            .fetcher(self.fetcher())
            .meta(self.meta.build().context("Invalid meta-metric thresholds")?);

        for source in &self.sources {
            builder = builder.source(source.build()?);
        }
        for metric in &self.metrics {
            builder = builder.metric(metric.build()?);
        }

        builder.build().context("Invalid metric configuration")
    }
}
