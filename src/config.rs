use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap, fmt, fs::File, io::BufReader, path::Path, path::PathBuf, sync::Arc,
    time::Duration,
};

use crate::provider::{AiAgent, FileSystem, ProcessLauncher};
use crate::{Error, InternalResult};

/// Options for one script execution.
///
/// The serialisable part is what a JSON config file (or the CLI) can set.
/// `agent`, `file_system` and `process_launcher` are injected by the
/// embedding application; when left empty the runtime uses the local
/// implementations and builds the AI agent from the environment on first use.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    /// Base directory for relative file paths and shell commands.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Report mutating file and shell operations instead of performing them.
    #[serde(default)]
    pub dry_run: bool,

    /// Wall-clock budget for the whole script, checked at every node.
    #[serde(default = "default_timeout", with = "duration_ms")]
    pub timeout: Duration,

    #[serde(default = "default_true")]
    pub enable_file_ops: bool,

    #[serde(default)]
    pub enable_bash: bool,

    #[serde(default, rename = "enableAI")]
    pub enable_ai: bool,

    /// Globals defined before the script starts.
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,

    /// Runs `test` blocks and echoes streamed process output.
    #[serde(default)]
    pub verbose: bool,

    #[serde(skip)]
    pub agent: Option<Arc<dyn AiAgent>>,

    #[serde(skip)]
    pub file_system: Option<Arc<dyn FileSystem>>,

    #[serde(skip)]
    pub process_launcher: Option<Arc<dyn ProcessLauncher>>,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout() -> Duration {
    Duration::from_millis(30_000)
}

fn default_true() -> bool {
    true
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            dry_run: false,
            timeout: default_timeout(),
            enable_file_ops: default_true(),
            enable_bash: false,
            enable_ai: false,
            variables: HashMap::new(),
            verbose: false,
            agent: None,
            file_system: None,
            process_launcher: None,
        }
    }
}

impl fmt::Debug for ScriptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptConfig")
            .field("workdir", &self.workdir)
            .field("dry_run", &self.dry_run)
            .field("timeout", &self.timeout)
            .field("enable_file_ops", &self.enable_file_ops)
            .field("enable_bash", &self.enable_bash)
            .field("enable_ai", &self.enable_ai)
            .field("variables", &self.variables)
            .field("verbose", &self.verbose)
            .field("agent", &self.agent.is_some())
            .field("file_system", &self.file_system.is_some())
            .field("process_launcher", &self.process_launcher.is_some())
            .finish()
    }
}

impl ScriptConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        from_file(path)
    }

    pub fn with_agent(mut self, agent: Arc<dyn AiAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    pub fn with_process_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.process_launcher = Some(launcher);
        self
    }

    /// Resolves `path` against `workdir` unless it is already absolute.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::config(format!("Failed to open config file {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

// Duration型のシリアライズ/デシリアライズヘルパー
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ScriptConfig::default();
        assert_eq!(config.workdir, PathBuf::from("."));
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert!(config.enable_file_ops);
        assert!(!config.enable_bash);
        assert!(!config.enable_ai);
        assert!(!config.dry_run);
        assert!(!config.verbose);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ScriptConfig = from_str(
            r#"{"dryRun": true, "timeout": 250, "enableBash": true, "enableAI": true,
                "variables": {"name": "x", "count": 2}}"#,
        )
        .unwrap();
        assert!(config.dry_run);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(config.enable_bash);
        assert!(config.enable_ai);
        assert!(config.enable_file_ops);
        assert_eq!(config.variables["count"], serde_json::json!(2));
    }

    #[test]
    fn test_serialize_timeout_as_millis() {
        let json = serde_json::to_value(ScriptConfig::default()).unwrap();
        assert_eq!(json["timeout"], serde_json::json!(30_000));
        assert_eq!(json["enableFileOps"], serde_json::json!(true));
        assert!(json.get("agent").is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workdir": "/tmp/work", "verbose": true}}"#).unwrap();
        let config = ScriptConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workdir, PathBuf::from("/tmp/work"));
        assert!(config.verbose);

        assert!(ScriptConfig::from_file("/definitely/missing.json").is_err());
    }

    #[test]
    fn test_resolve_path() {
        let config = ScriptConfig {
            workdir: PathBuf::from("/base"),
            ..Default::default()
        };
        assert_eq!(config.resolve_path("a/b.txt"), PathBuf::from("/base/a/b.txt"));
        assert_eq!(config.resolve_path("/abs.txt"), PathBuf::from("/abs.txt"));
    }
}
