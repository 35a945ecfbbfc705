//! Configuration captured once at startup
//!
//! Settings come from the terminal, the environment, and an optional
//! `.testjson.conf` file. The file uses INI format with a [DEFAULT] section:
//!
//! ```ini
//! [DEFAULT]
//! format=dots
//! max_failures=10
//! rerun_command=go test -json -count=1 -run $RUN $PACKAGE
//! ```

use crate::error::{Error, Result};
use crate::format::{FormatKind, FormatOptions};
use crate::metrics::MetricConfig;
use crate::rerun::RerunConfig;
use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".testjson.conf";

/// Environment variable holding the import path prefix to strip from package names.
pub const PACKAGE_PREFIX_ENV: &str = "TESTJSON_PACKAGE_PREFIX";

/// Command used to rerun failed tests unless configured otherwise.
pub const DEFAULT_RERUN_COMMAND: &str = "go test -json -run $RUN $PACKAGE";

/// Where the metric tags are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagSource {
    /// CircleCI when running there, otherwise the environment.
    #[default]
    Auto,
    Env,
    CircleCi,
}

impl FromStr for TagSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(TagSource::Auto),
            "env" => Ok(TagSource::Env),
            "circleci" => Ok(TagSource::CircleCi),
            other => Err(Error::Config(format!("unknown tag source: {}", other))),
        }
    }
}

impl fmt::Display for TagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TagSource::Auto => "auto",
            TagSource::Env => "env",
            TagSource::CircleCi => "circleci",
        })
    }
}

impl TagSource {
    /// Resolve the metric tags, reading variables through `lookup`.
    ///
    /// Tags whose variable is unset or empty are left out.
    pub fn resolve<F>(self, lookup: F) -> BTreeMap<String, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let keys = match self {
            TagSource::Auto if lookup("CIRCLECI").is_some() => CIRCLECI_TAGS,
            TagSource::Auto => {
                warn!("Not running in a known CI environment, reading tags from TESTJSON_METRIC_TAG_*");
                ENV_TAGS
            }
            TagSource::Env => ENV_TAGS,
            TagSource::CircleCi => CIRCLECI_TAGS,
        };

        keys.iter()
            .filter_map(|(tag, var)| {
                lookup(var)
                    .filter(|v| !v.is_empty())
                    .map(|v| (tag.to_string(), v))
            })
            .collect()
    }
}

const ENV_TAGS: &[(&str, &str)] = &[
    ("git.branch", "TESTJSON_METRIC_TAG_GITBRANCH"),
    ("git.repo", "TESTJSON_METRIC_TAG_GITREPO"),
    ("ci.job", "TESTJSON_METRIC_TAG_CIJOB"),
];

const CIRCLECI_TAGS: &[(&str, &str)] = &[
    ("git.branch", "CIRCLE_BRANCH"),
    ("git.repo", "CIRCLE_REPOSITORY_URL"),
    ("ci.job", "CIRCLE_JOB"),
];

/// Settings read from a `.testjson.conf` file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub format: Option<FormatKind>,
    pub max_failures: Option<usize>,
    pub slow_threshold: Option<Duration>,
    pub max_slow_tests: Option<usize>,
    pub rerun_max_attempts: Option<usize>,
    pub rerun_max_failures: Option<usize>,
    pub rerun_command: Option<String>,
    pub tag_source: Option<TagSource>,
    pub package_prefix: Option<String>,
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid value for {}: {:?} ({})", key, value, e)))
}

impl ConfigFile {
    /// Load configuration from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a string.
    pub fn parse(contents: &str) -> Result<Self> {
        let ini: HashMap<String, HashMap<String, String>> = serde_ini::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e)))?;

        let default = ini.get("DEFAULT").ok_or_else(|| {
            Error::Config(format!("No [DEFAULT] section in {}", CONFIG_FILE_NAME))
        })?;

        let mut file = ConfigFile::default();
        for (key, value) in default {
            match key.as_str() {
                "format" => file.format = Some(value.trim().parse()?),
                "max_failures" => file.max_failures = Some(parse_value(key, value)?),
                "slow_threshold_ms" => {
                    file.slow_threshold = Some(Duration::from_millis(parse_value(key, value)?))
                }
                "max_slow_tests" => file.max_slow_tests = Some(parse_value(key, value)?),
                "rerun_max_attempts" => file.rerun_max_attempts = Some(parse_value(key, value)?),
                "rerun_max_failures" => file.rerun_max_failures = Some(parse_value(key, value)?),
                "rerun_command" => {
                    if value.trim().is_empty() {
                        return Err(Error::Config("rerun_command cannot be empty".to_string()));
                    }
                    file.rerun_command = Some(value.clone());
                }
                "tag_source" => file.tag_source = Some(value.trim().parse()?),
                "package_prefix" => file.package_prefix = Some(value.trim().to_string()),
                other => warn!("Ignoring unknown option {} in {}", other, CONFIG_FILE_NAME),
            }
        }

        Ok(file)
    }
}

/// Everything the library needs to know about its surroundings.
#[derive(Debug, Clone)]
pub struct Config {
    pub format: FormatKind,
    /// Width of the terminal, if stdout is one.
    pub terminal_width: Option<usize>,
    pub color: bool,
    pub package_prefix: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub metrics: MetricConfig,
    pub rerun: RerunConfig,
    /// Command run through `sh -c`, with `$PACKAGE` and `$RUN` substituted.
    pub rerun_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            format: FormatKind::default(),
            terminal_width: None,
            color: false,
            package_prefix: None,
            tags: BTreeMap::new(),
            metrics: MetricConfig::default(),
            rerun: RerunConfig::default(),
            rerun_command: DEFAULT_RERUN_COMMAND.to_string(),
        }
    }
}

impl Config {
    /// Capture the configuration of the running process.
    ///
    /// `path` names a configuration file that must exist. Without it,
    /// `.testjson.conf` in the working directory is read when present.
    pub fn from_env(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => ConfigFile::load_from_file(path)?,
            None if Path::new(CONFIG_FILE_NAME).exists() => {
                ConfigFile::load_from_file(Path::new(CONFIG_FILE_NAME))?
            }
            None => ConfigFile::default(),
        };

        let mut config = Self::resolve(file, |key| std::env::var(key).ok());
        config.terminal_width = console::Term::stdout()
            .size_checked()
            .map(|(_rows, cols)| cols as usize);
        config.color = console::colors_enabled();
        Ok(config)
    }

    /// Combine file settings with variables read through `lookup`. The file
    /// wins over the environment.
    pub fn resolve<F>(file: ConfigFile, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(format) = file.format {
            config.format = format;
        }
        config.package_prefix = file
            .package_prefix
            .or_else(|| lookup(PACKAGE_PREFIX_ENV))
            .filter(|p| !p.is_empty());
        if let Some(n) = file.max_failures {
            config.metrics.max_failures_threshold = n;
        }
        if let Some(d) = file.slow_threshold {
            config.metrics.slow_test_threshold = d;
        }
        if let Some(n) = file.max_slow_tests {
            config.metrics.max_slow_tests = n;
        }
        if let Some(n) = file.rerun_max_attempts {
            config.rerun.max_attempts = n;
        }
        if let Some(n) = file.rerun_max_failures {
            config.rerun.max_failures = n;
        }
        if let Some(cmd) = file.rerun_command {
            config.rerun_command = cmd;
        }
        config.tags = file.tag_source.unwrap_or_default().resolve(lookup);
        config
    }

    /// Display settings for formatters.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            package_prefix: self.package_prefix.clone(),
            color: self.color,
        }
    }

    /// The rerun command for one package and `-run` pattern.
    pub fn rerun_command_for(&self, package: &str, run: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("PACKAGE".to_string(), package.to_string());
        vars.insert("RUN".to_string(), run.to_string());
        substitute_variables(&self.rerun_command, &vars)
    }
}

/// Substitute `$NAME` placeholders in a command string.
pub fn substitute_variables(cmd: &str, vars: &HashMap<String, String>) -> String {
    let mut result = cmd.to_string();

    for (key, value) in vars {
        let placeholder = format!("${}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_basic_config() {
        let config_str = r#"
[DEFAULT]
format=dots
"#;

        let file = ConfigFile::parse(config_str).unwrap();
        assert_eq!(file.format, Some(FormatKind::Dots));
        assert!(file.max_failures.is_none());
        assert!(file.rerun_command.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[DEFAULT]
format=testname
max_failures=3
slow_threshold_ms=250
max_slow_tests=5
rerun_max_attempts=4
rerun_max_failures=12
rerun_command=go test -json -count=1 -run $RUN $PACKAGE
tag_source=circleci
package_prefix=example.com/mod
"#;

        let file = ConfigFile::parse(config_str).unwrap();
        assert_eq!(
            file,
            ConfigFile {
                format: Some(FormatKind::TestName),
                max_failures: Some(3),
                slow_threshold: Some(Duration::from_millis(250)),
                max_slow_tests: Some(5),
                rerun_max_attempts: Some(4),
                rerun_max_failures: Some(12),
                rerun_command: Some("go test -json -count=1 -run $RUN $PACKAGE".to_string()),
                tag_source: Some(TagSource::CircleCi),
                package_prefix: Some("example.com/mod".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_default_section() {
        let config_str = r#"
[OTHER]
format=dots
"#;

        let result = ConfigFile::parse(config_str);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DEFAULT"));
    }

    #[test]
    fn test_invalid_number() {
        let config_str = r#"
[DEFAULT]
max_failures=lots
"#;

        let err = ConfigFile::parse(config_str).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("max_failures"));
    }

    #[test]
    fn test_unknown_format() {
        let config_str = r#"
[DEFAULT]
format=fancy
"#;

        assert!(matches!(
            ConfigFile::parse(config_str),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[DEFAULT]\nmax_slow_tests=2\n").unwrap();

        let file = ConfigFile::load_from_file(&path).unwrap();
        assert_eq!(file.max_slow_tests, Some(2));

        let missing = ConfigFile::load_from_file(&dir.path().join("nope.conf"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(ConfigFile::default(), lookup_from(&[]));
        assert_eq!(config.format, FormatKind::PkgName);
        assert_eq!(config.metrics, MetricConfig::default());
        assert_eq!(config.rerun, RerunConfig::default());
        assert_eq!(config.rerun_command, DEFAULT_RERUN_COMMAND);
        assert!(config.package_prefix.is_none());
        assert!(config.tags.is_empty());
    }

    #[test]
    fn test_resolve_file_overrides_environment() {
        let file = ConfigFile {
            package_prefix: Some("example.com/file".to_string()),
            max_failures: Some(1),
            rerun_max_attempts: Some(5),
            ..Default::default()
        };
        let config = Config::resolve(
            file,
            lookup_from(&[(PACKAGE_PREFIX_ENV, "example.com/env")]),
        );
        assert_eq!(config.package_prefix.as_deref(), Some("example.com/file"));
        assert_eq!(config.metrics.max_failures_threshold, 1);
        assert_eq!(config.rerun.max_attempts, 5);

        let config = Config::resolve(
            ConfigFile::default(),
            lookup_from(&[(PACKAGE_PREFIX_ENV, "example.com/env")]),
        );
        assert_eq!(config.package_prefix.as_deref(), Some("example.com/env"));
    }

    #[test]
    fn test_tags_from_env() {
        let lookup = lookup_from(&[
            ("TESTJSON_METRIC_TAG_GITBRANCH", "main"),
            ("TESTJSON_METRIC_TAG_GITREPO", "example/repo"),
            ("TESTJSON_METRIC_TAG_CIJOB", ""),
        ]);
        let tags = TagSource::Env.resolve(lookup);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["git.branch"], "main");
        assert_eq!(tags["git.repo"], "example/repo");
    }

    #[test]
    fn test_tags_auto_detects_circleci() {
        let lookup = lookup_from(&[
            ("CIRCLECI", "true"),
            ("CIRCLE_BRANCH", "feature"),
            ("CIRCLE_REPOSITORY_URL", "git@github.com:example/repo.git"),
            ("CIRCLE_JOB", "test-linux"),
            ("TESTJSON_METRIC_TAG_GITBRANCH", "ignored"),
        ]);
        let tags = TagSource::Auto.resolve(lookup);
        assert_eq!(tags["git.branch"], "feature");
        assert_eq!(tags["ci.job"], "test-linux");
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_tag_source_from_str() {
        assert_eq!("env".parse::<TagSource>().unwrap(), TagSource::Env);
        assert!("jenkins".parse::<TagSource>().is_err());
    }

    #[test]
    fn test_format_options() {
        let config = Config {
            package_prefix: Some("example.com".to_string()),
            color: true,
            ..Default::default()
        };
        let opts = config.format_options();
        assert_eq!(opts.package_prefix.as_deref(), Some("example.com"));
        assert!(opts.color);
    }

    #[test]
    fn test_rerun_command_for() {
        let config = Config::default();
        assert_eq!(
            config.rerun_command_for("example.com/pkg", "^TestA$"),
            "go test -json -run ^TestA$ example.com/pkg"
        );
    }

    #[test]
    fn test_substitute_variables() {
        let mut vars = HashMap::new();
        vars.insert("PACKAGE".to_string(), "./...".to_string());
        vars.insert("RUN".to_string(), "'^TestX$'".to_string());

        let result = substitute_variables("go test -run $RUN $PACKAGE", &vars);
        assert_eq!(result, "go test -run '^TestX$' ./...");
    }
}
