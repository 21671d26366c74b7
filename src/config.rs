use std::{fs, path::Path, time::Duration};

use eyre::{WrapErr, bail};
use serde::Deserialize;

use crate::query::targets::Target;

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The servers to query, like `play.example.net` or `10.0.0.5:25566`.
    pub targets: Vec<String>,

    /// Query every target with this protocol instead of picking one based on
    /// the port.
    #[serde(default)]
    pub protocol: Option<String>,

    /// How long to wait for each reply. Defaults to 5 seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// The maximum number of queries running at the same time. Defaults to 16.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// If set, debug logs are also written to a daily rotating file in this
    /// directory.
    #[serde(default)]
    pub logging_dir: Option<String>,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Default, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub pretty: bool,
}

impl Config {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("couldn't read config at {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        if config.targets.is_empty() {
            bail!("config has no targets");
        }
        if config.concurrency == Some(0) {
            bail!("concurrency must be at least 1");
        }
        Ok(config)
    }

    /// Build a config for querying a single target from the command line.
    pub fn single(target: String, protocol: Option<String>) -> Self {
        Self {
            targets: vec![target],
            protocol,
            timeout_secs: None,
            concurrency: None,
            logging_dir: None,
            output: OutputConfig::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(5))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(16)
    }

    /// Parse every target, failing on the first invalid one.
    pub fn parsed_targets(&self) -> eyre::Result<Vec<Target>> {
        self.targets
            .iter()
            .map(|target| target.parse::<Target>())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            targets = ["play.example.net", "10.0.0.5:25566"]
            protocol = "minecraft"
            timeout_secs = 2
            concurrency = 4
            logging_dir = "logs"

            [output]
            pretty = true
            "#,
        )
        .unwrap();

        assert_eq!(config.protocol.as_deref(), Some("minecraft"));
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.logging_dir.as_deref(), Some("logs"));
        assert!(config.output.pretty);
        assert_eq!(
            config.parsed_targets().unwrap(),
            vec![
                Target::new("play.example.net", None),
                Target::new("10.0.0.5", Some(25566)),
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse(r#"targets = ["localhost"]"#).unwrap();
        assert_eq!(config.protocol, None);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.concurrency(), 16);
        assert!(!config.output.pretty);
    }

    #[test]
    fn test_rejects_bad_configs() {
        assert!(Config::parse("targets = []").is_err());
        assert!(Config::parse(r#"targets = ["a"]
concurrency = 0"#).is_err());
        assert!(Config::parse(r#"targets = ["a"]
rate = 100"#).is_err());
        assert!(Config::parse("protocol = \"minecraft\"").is_err());
    }

    #[test]
    fn test_invalid_target() {
        let config = Config::single("host:notaport".to_string(), None);
        assert!(config.parsed_targets().is_err());
    }
}
