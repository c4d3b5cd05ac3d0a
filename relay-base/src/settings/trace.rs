use eyre::Result;
use tracing::Subscriber;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Logging level. A "higher level" means more will be logged.
#[derive(Default, Debug, Clone, Copy, serde::Deserialize, PartialOrd, Ord, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    /// Off
    Off = 0,
    /// Error
    Error = 1,
    /// Warn
    Warn = 2,
    /// Debug
    Debug = 4,
    /// Trace
    Trace = 5,
    /// Info
    #[serde(other)]
    #[default]
    Info = 3,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
            Level::Info => LevelFilter::INFO,
        }
    }
}

/// Log output format
#[derive(Default, Debug, Clone, Copy, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Style {
    /// Multi-line, human oriented
    Pretty,
    /// One JSON object per line
    Json,
    /// Single line, abbreviated
    Compact,
    /// Single line
    #[default]
    #[serde(other)]
    Full,
}

fn fmt_layer<S>(style: Style) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer();
    match style {
        Style::Pretty => layer.pretty().boxed(),
        Style::Json => layer.json().boxed(),
        Style::Compact => layer.compact().boxed(),
        Style::Full => layer.boxed(),
    }
}

/// Configuration for the tracing subscribers used by relay agents
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    fmt: Style,
    #[serde(default)]
    level: Level,
}

impl TracingConfig {
    /// The level events are filtered at
    pub fn level(&self) -> Level {
        self.level
    }

    fn targets(&self) -> Targets {
        let mut target_layer = Targets::new().with_default(self.level);
        if self.level < Level::Trace {
            // only show these debug and trace logs at trace level
            for noisy in ["hyper", "reqwest", "h2", "aws_config", "aws_smithy_runtime", "rocksdb"] {
                target_layer = target_layer.with_target(noisy, LevelFilter::from(Level::Info.min(self.level)));
            }
        }
        target_layer
    }

    /// Attempt to instantiate and register a tracing subscriber setup from
    /// settings.
    pub fn start_tracing(&self) -> Result<()> {
        let err_layer = tracing_error::ErrorLayer::default();

        let subscriber = tracing_subscriber::Registry::default()
            .with(self.targets())
            .with(fmt_layer(self.fmt))
            .with(err_layer);

        subscriber.try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let cfg: TracingConfig =
            serde_json::from_str(r#"{"fmt": "fancy", "level": "loud"}"#).unwrap();
        assert_eq!(cfg.fmt, Style::Full);
        assert_eq!(cfg.level, Level::Info);

        let cfg: TracingConfig =
            serde_json::from_str(r#"{"fmt": "json", "level": "debug"}"#).unwrap();
        assert_eq!(cfg.fmt, Style::Json);
        assert_eq!(cfg.level(), Level::Debug);
    }

    #[test]
    fn levels_are_ordered_by_verbosity() {
        assert!(Level::Off < Level::Error);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
        assert_eq!(LevelFilter::from(Level::Warn), LevelFilter::WARN);
    }
}
