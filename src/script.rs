//! # Script façade
//!
//! The entry points the rest of an application calls. Each one wires the
//! tokenizer, parser and evaluator together and folds every failure into the
//! returned value, so a broken script can never take its host down.
//!
//! ```no_run
//! use codebuddy_script::{execute_script, ScriptConfig};
//!
//! # async fn demo() {
//! let result = execute_script("print(\"hi\")\nreturn 1 + 1", ScriptConfig::default()).await;
//! assert!(result.success);
//! assert_eq!(result.output, vec!["hi"]);
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::analyzer::parse_program;
use crate::config::ScriptConfig;
use crate::eval::{Evaluator, TestResult, Value};
use crate::provider::{FileSystem, LocalFileSystem};

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResult {
    pub success: bool,
    /// Every printed line, including those printed before a failure.
    pub output: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<serde_json::Value>,
    pub duration_ms: u64,
    /// Present only when `verbose` is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<Vec<TestResult>>,
}

impl ScriptResult {
    fn failure(error: String, started: Instant, verbose: bool) -> Self {
        Self {
            success: false,
            output: Vec::new(),
            error: Some(error),
            return_value: None,
            duration_ms: elapsed_ms(started),
            test_results: verbose.then(Vec::new),
        }
    }

    /// Test blocks that ran and failed.
    pub fn failed_tests(&self) -> Vec<&TestResult> {
        self.test_results
            .iter()
            .flatten()
            .filter(|result| !result.passed)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Stack reserved for the interpreter thread. Script recursion nests one
/// boxed future per node, and polling them runs on this stack.
const INTERPRETER_STACK_SIZE: usize = 128 * 1024 * 1024;

/// What one run left behind, gathered before the evaluator is dropped.
struct Run {
    outcome: Result<Option<Value>, String>,
    output: Vec<String>,
    test_results: Vec<TestResult>,
}

fn run_program(source: String, config: ScriptConfig) -> Result<Run, String> {
    let program = parse_program(&source).map_err(|e| {
        warn!(error = %e, "script failed to parse");
        e.to_string()
    })?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start script runtime: {}", e))?;

    runtime.block_on(async {
        let evaluator = Evaluator::new(config);
        let outcome = evaluator.execute(&program).await.map_err(|e| e.to_string());
        Ok(Run {
            outcome,
            output: evaluator.output(),
            test_results: evaluator.test_results(),
        })
    })
}

/// Parses and runs `source` on a dedicated interpreter thread.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = source.len()))]
pub async fn execute_script(source: &str, config: ScriptConfig) -> ScriptResult {
    let started = Instant::now();
    let verbose = config.verbose;

    let (tx, rx) = oneshot::channel();
    let source = source.to_string();
    let spawned = std::thread::Builder::new()
        .name("codebuddy-script".to_string())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || {
            let _ = tx.send(run_program(source, config));
        });
    if let Err(e) = spawned {
        return ScriptResult::failure(
            format!("Failed to start script thread: {}", e),
            started,
            verbose,
        );
    }

    let run = match rx.await {
        Ok(Ok(run)) => run,
        Ok(Err(error)) => return ScriptResult::failure(error, started, verbose),
        Err(_) => {
            error!("interpreter thread ended without a result");
            return ScriptResult::failure(
                "Script execution aborted".to_string(),
                started,
                verbose,
            );
        }
    };

    let duration_ms = elapsed_ms(started);
    let test_results = verbose.then_some(run.test_results);
    match run.outcome {
        Ok(value) => {
            info!(duration_ms, lines = run.output.len(), "script completed");
            ScriptResult {
                success: true,
                output: run.output,
                error: None,
                return_value: value.map(|v| v.to_json()),
                duration_ms,
                test_results,
            }
        }
        Err(error) => {
            warn!(duration_ms, error = %error, "script failed");
            ScriptResult {
                success: false,
                output: run.output,
                error: Some(error),
                return_value: None,
                duration_ms,
                test_results,
            }
        }
    }
}

/// Reads `path` (relative to `workdir`) and runs it. An unreadable file is
/// reported as a failed result.
pub async fn execute_script_file(path: impl AsRef<Path>, config: ScriptConfig) -> ScriptResult {
    let started = Instant::now();
    let path = config.resolve_path(path);
    let file_system: Arc<dyn FileSystem> = config
        .file_system
        .clone()
        .unwrap_or_else(|| Arc::new(LocalFileSystem));

    match file_system.read_to_string(&path).await {
        Ok(source) => execute_script(&source, config).await,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "script file unreadable");
            ScriptResult::failure(
                format!("Failed to read script {}: {}", path.display(), e),
                started,
                config.verbose,
            )
        }
    }
}

/// Parses `source` without running it.
pub fn validate_script(source: &str) -> ValidationResult {
    match parse_program(source) {
        Ok(_) => ValidationResult {
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ValidationResult {
            valid: false,
            errors: vec![e.to_string()],
        },
    }
}

/// Starter script for a new automation named `name`.
pub fn generate_template(name: &str, description: Option<&str>) -> String {
    let description = description.unwrap_or("Describe what this script automates");
    format!(
        r#"// {name}
// {description}

const config = {{
    name: "{name}",
    verbose: false
}}

function main() {{
    print(`Running ${{config.name}}`)

    let files = listDir(".")
    print(`Found ${{len(files)}} entries`)

    return {{ success: true, files: len(files) }}
}}

test "{name} runs" {{
    let result = main()
    assert result.success, "main() should succeed"
}}

return main()
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fs::MockFileSystem;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_successful_run() {
        let result = execute_script(
            "let xs = map([1, 2, 3], x => x * 2)\nprint(xs)\nreturn {total: sum(xs)}",
            ScriptConfig::default(),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.output, vec!["[2,4,6]"]);
        assert_eq!(result.return_value, Some(json!({"total": 12})));
        assert_eq!(result.error, None);
        assert_eq!(result.test_results, None);
    }

    #[tokio::test]
    async fn test_runtime_failure_keeps_output() {
        let result = execute_script("print(\"before\")\nmissing()\nprint(\"after\")", ScriptConfig::default()).await;
        assert!(!result.success);
        assert_eq!(result.output, vec!["before"]);
        assert_eq!(result.error.as_deref(), Some("Undefined variable: missing"));
        assert_eq!(result.return_value, None);
    }

    #[tokio::test]
    async fn test_parse_failure_is_structured() {
        let result = execute_script("let = 1", ScriptConfig::default()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Parse error:"));
    }

    #[tokio::test]
    async fn test_timeout_message() {
        let config = ScriptConfig {
            timeout: Duration::from_millis(10),
            ..Default::default()
        };
        let started = Instant::now();
        let result = execute_script("while (true) { let x = 1 }", config).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Script timeout after 10ms"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_test_results_only_when_verbose() {
        let source = "test \"passes\" { assert 1 == 1 }\ntest \"fails\" { assert false, \"nope\" }";

        let quiet = execute_script(source, ScriptConfig::default()).await;
        assert!(quiet.success);
        assert_eq!(quiet.test_results, None);
        assert!(quiet.output.is_empty());

        let config = ScriptConfig {
            verbose: true,
            ..Default::default()
        };
        let verbose = execute_script(source, config).await;
        assert!(verbose.success);
        assert_eq!(verbose.output, vec!["✓ passes", "✗ fails: nope"]);
        let failed = verbose.failed_tests();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn test_missing_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScriptConfig {
            workdir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let result = execute_script_file("absent.cbs", config).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Failed to read script"));
    }

    #[tokio::test]
    async fn test_script_file_through_file_system() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .returning(|_| Ok("return 40 + 2".to_string()));
        let config = ScriptConfig::default().with_file_system(Arc::new(fs));
        let result = execute_script_file("job.cbs", config).await;
        assert_eq!(result.return_value, Some(json!(42)));
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            validate_script("let x = [1, 2]"),
            ValidationResult {
                valid: true,
                errors: vec![]
            }
        );
        let invalid = validate_script("if (x {");
        assert!(!invalid.valid);
        assert_eq!(invalid.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_template_is_runnable() {
        let source = generate_template("cleanup", Some("Removes stale build output"));
        assert!(source.starts_with("// cleanup\n// Removes stale build output"));
        assert!(validate_script(&source).valid);

        let dir = tempfile::tempdir().unwrap();
        let config = ScriptConfig {
            workdir: dir.path().to_path_buf(),
            verbose: true,
            ..Default::default()
        };
        let result = execute_script(&source, config).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.return_value, Some(json!({"success": true, "files": 0})));
        assert_eq!(result.failed_tests().len(), 0);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ScriptResult {
            success: true,
            output: vec![],
            error: None,
            return_value: Some(json!(1)),
            duration_ms: 3,
            test_results: None,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": true, "output": [], "returnValue": 1, "durationMs": 3})
        );
    }
}
