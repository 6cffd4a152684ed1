// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::engine::QueuerConfig;
use crate::errors::ConfigError;
use crate::traits::LogLevel;

/// Main configuration structure for a relay pipeline.
///
/// Describes the collaborators (broker, cache, logging) and every worker of
/// the pipeline with its links. Loaded from YAML, or TOML when the file has a
/// `.toml` extension.
///
/// # Example
/// ```yaml
/// entry: split
/// broker:
///   kind: memory
/// logging:
///   filter: info
///   routes:
///     debug: ["join"]
/// workers:
///   - id: split
///     kind: slicer
///     downstream: double
///   - id: double
///     downstream: join
///   - id: join
///     name: split
///     kind: resolver
///     collect: true
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Worker that receives input from the driver.
    pub entry: Option<String>,
    pub workers: Vec<WorkerConfig>,
}

impl Config {
    pub fn worker(&self, id: &str) -> Option<&WorkerConfig> {
        self.workers.iter().find(|w| w.id == id)
    }
}

/// Logging options.
///
/// * `filter` - `tracing-subscriber` env-filter directive, overridden by `RUST_LOG`
/// * `routes` - per-level worker id patterns for the default logger
#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    #[serde(default)]
    pub routes: HashMap<LogLevel, Vec<String>>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Default, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub kind: BackendKind,
    pub url: Option<String>,
}

/// Default cache for workers that name none. `redis` registers a shared
/// cache under that name next to the always-present `memory` one.
#[derive(Debug, Default, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub kind: BackendKind,
    pub url: Option<String>,
}

/// Node type of a configured worker.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    #[default]
    Worker,
    Slicer,
    Broadcaster,
    Resolver,
    Queuer,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Worker => "worker",
            WorkerKind::Slicer => "slicer",
            WorkerKind::Broadcaster => "broadcaster",
            WorkerKind::Resolver => "resolver",
            WorkerKind::Queuer => "queuer",
        }
    }
}

/// Configuration for a single worker.
///
/// # Fields
/// * `id` - Unique identifier
/// * `name` - Logical role, defaults to `id`; a Resolver pairs with the fan-out of the same name
/// * `kind` - Node type
/// * `downstream` / `bypass` - Forward links by worker id
/// * `branches` - Broadcaster fan-out targets
/// * `resolve` - Broadcaster opens a barrier (default true)
/// * `collect` - Resolver collects branch values instead of passing the original data
/// * `queuer` - Queuer options
/// * `outlet` - Simple-mode Queuer completion target
/// * `cache` / `codec` / `logger` - Collaborator names
///
/// # Example
/// ```yaml
/// id: resize-pusher
/// kind: queuer
/// queuer:
///   mode: pusher
///   high_water_mark: 50
/// downstream: store
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub kind: WorkerKind,
    pub downstream: Option<String>,
    pub bypass: Option<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default = "default_resolve")]
    pub resolve: bool,
    #[serde(default)]
    pub collect: bool,
    pub queuer: Option<QueuerConfig>,
    pub outlet: Option<String>,
    pub cache: Option<String>,
    pub codec: Option<String>,
    pub logger: Option<String>,
}

fn default_resolve() -> bool {
    true
}

impl WorkerConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Forward links as `(link, target)` pairs.
    pub fn links(&self) -> impl Iterator<Item = (&'static str, &String)> {
        self.downstream
            .iter()
            .map(|t| ("downstream", t))
            .chain(self.bypass.iter().map(|t| ("bypass", t)))
            .chain(self.branches.iter().map(|t| ("branches", t)))
    }
}

/// Load a config from a YAML or TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        Ok(toml::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Load and validate a config file
///
/// Validation checks worker ids, links, cycles and resolver pairing; all
/// problems found are reported together.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_pipeline(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::QueuerMode;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
entry: split
workers:
  - id: split
    kind: slicer
    downstream: join
  - id: join
    name: split
    kind: resolver
    collect: true
"#;

        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.entry.as_deref(), Some("split"));
        assert_eq!(cfg.workers.len(), 2);
        assert_eq!(cfg.workers[0].kind, WorkerKind::Slicer);
        assert_eq!(cfg.workers[1].name(), "split");
        assert!(cfg.workers[1].collect);
        assert!(cfg.workers[1].resolve);
        assert_eq!(cfg.broker.kind, BackendKind::Memory);
    }

    #[test]
    fn queuer_options_fill_defaults() {
        let yaml = r#"
workers:
  - id: q
    kind: queuer
    queuer:
      mode: handler
      concurrency: 4
      final: [a, b]
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let options = cfg.workers[0].queuer.clone().unwrap();
        assert_eq!(options.mode, QueuerMode::Handler);
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.high_water_mark, 100);
        assert_eq!(options.expire_ms, 300_000);
        assert_eq!(options.final_queues, vec!["a", "b"]);
        assert_eq!(options.content_type, "application/json");
    }

    #[test]
    fn logging_routes_key_on_levels() {
        let yaml = r#"
logging:
  filter: debug
  routes:
    pass: ["*", "!noisy"]
workers: []
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.logging.filter.as_deref(), Some("debug"));
        assert_eq!(cfg.logging.routes[&LogLevel::Pass], vec!["*", "!noisy"]);
    }

    #[test]
    fn load_picks_format_by_extension() {
        let toml_file = write_temp(
            ".toml",
            r#"
entry = "a"

[[workers]]
id = "a"
downstream = "b"

[[workers]]
id = "b"
"#,
        );
        let cfg = load_config(toml_file.path()).unwrap();
        assert_eq!(cfg.workers.len(), 2);
        assert_eq!(cfg.workers[0].downstream.as_deref(), Some("b"));

        let yaml_file = write_temp(".yaml", "workers:\n  - id: only\n");
        assert_eq!(load_config(yaml_file.path()).unwrap().workers[0].id, "only");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let error = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }

    #[test]
    fn load_and_validate_rejects_cycles() {
        let file = write_temp(
            ".yaml",
            r#"
workers:
  - id: a
    downstream: b
  - id: b
    downstream: a
"#,
        );
        let error = load_and_validate_config(file.path()).unwrap_err();
        assert!(error.to_string().contains("Cyclic link detected"));
    }
}
