//! Shell builtins, installed when `enableBash` is on.
//!
//! `exec` and `bash.exec` fail on a non-zero exit; `shell`, `bash.run` and
//! `bash.spawn` report it in the returned `{stdout, stderr, code}` instead.

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{arg, expect_string, Builtins};
use crate::eval::{Dict, EvalError, EvalResult, Evaluator, Value};
use crate::provider::{OutputLine, ProcessOutput};

pub(super) fn register(builtins: &mut Builtins) {
    let mut bash = Builtins::new();
    bash.register_async("run", run)
        .register_async("exec", bash_exec)
        .register_async("spawn", spawn);

    builtins
        .register_async("exec", exec)
        .register_async("shell", run)
        .register_namespace("bash", bash);
}

fn output_value(output: ProcessOutput) -> Value {
    let mut dict = Dict::new();
    dict.insert("stdout", Value::String(output.stdout));
    dict.insert("stderr", Value::String(output.stderr));
    dict.insert("code", Value::from(output.code as i64));
    Value::object(dict)
}

async fn run_command(evaluator: &Evaluator, command: &str) -> EvalResult<ProcessOutput> {
    info!(command, "executing shell command");
    let output = evaluator
        .process_launcher()
        .run(command, &evaluator.config().workdir)
        .await?;
    debug!(command, code = output.code, "shell command finished");
    Ok(output)
}

fn failed(command: &str, output: &ProcessOutput) -> EvalError {
    let detail = output.stderr.trim();
    if detail.is_empty() {
        EvalError::runtime(format!(
            "Command failed with exit code {}: {}",
            output.code, command
        ))
    } else {
        EvalError::runtime(format!(
            "Command failed with exit code {}: {}",
            output.code, detail
        ))
    }
}

/// Trimmed stdout of a successful command.
fn exec<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let command = expect_string(&args, 0, "exec")?;
        if evaluator.dry_run(format!("Would execute: {}", command)) {
            return Ok(Value::from(""));
        }
        let output = run_command(evaluator, &command).await?;
        if !output.success() {
            return Err(failed(&command, &output));
        }
        Ok(Value::from(output.stdout.trim()))
    }
    .boxed()
}

fn bash_exec<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let command = expect_string(&args, 0, "bash.exec")?;
        if evaluator.dry_run(format!("Would execute: {}", command)) {
            return Ok(Value::from(""));
        }
        let output = run_command(evaluator, &command).await?;
        if !output.success() {
            return Err(failed(&command, &output));
        }
        Ok(Value::String(output.stdout))
    }
    .boxed()
}

fn run<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let command = expect_string(&args, 0, "bash.run")?;
        if evaluator.dry_run(format!("Would execute: {}", command)) {
            return Ok(output_value(ProcessOutput::default()));
        }
        Ok(output_value(run_command(evaluator, &command).await?))
    }
    .boxed()
}

/// Runs `program` with `args`, echoing each line while verbose.
fn spawn<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let program = expect_string(&args, 0, "bash.spawn")?;
        let program_args: Vec<String> = match arg(&args, 1) {
            Value::Null => Vec::new(),
            Value::Array(items) => items.read().iter().map(Value::to_string).collect(),
            other => {
                return Err(EvalError::type_error(format!(
                    "bash.spawn() expects an array of arguments, got {}",
                    other.type_name()
                )))
            }
        };
        let command_line = std::iter::once(program.clone())
            .chain(program_args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        if evaluator.dry_run(format!("Would execute: {}", command_line)) {
            return Ok(output_value(ProcessOutput::default()));
        }

        info!(command = %command_line, "spawning process");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let launcher = evaluator.process_launcher().clone();
        let workdir = evaluator.config().workdir.clone();
        let verbose = evaluator.config().verbose;

        let process = launcher.spawn(&program, &program_args, &workdir, tx);
        let echo = async {
            while let Some(line) = rx.recv().await {
                if !verbose {
                    continue;
                }
                match line {
                    OutputLine::Stdout(line) => evaluator.print(line),
                    OutputLine::Stderr(line) => evaluator.print(format!("[stderr] {}", line)),
                }
            }
        };
        let (output, ()) = tokio::join!(process, echo);
        Ok(output_value(output?))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::run_with;
    use crate::config::ScriptConfig;
    use crate::eval::Value;
    use crate::provider::process::MockProcessLauncher;
    use crate::provider::{OutputLine, ProcessOutput};
    use pretty_assertions::assert_eq;

    fn bash_config() -> ScriptConfig {
        ScriptConfig {
            enable_bash: true,
            workdir: std::env::temp_dir(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_exec_and_run() {
        let (_, result) = run_with(
            "let r = bash.run(\"echo out; exit 2\")\nreturn [exec(\"echo  hi \"), r.stdout, r.code, shell(\"true\").code]",
            bash_config(),
        )
        .await;
        assert_eq!(result.unwrap().unwrap().to_string(), r#"["hi","out\n",2,0]"#);
    }

    #[tokio::test]
    async fn test_exec_fails_on_non_zero_exit() {
        let (_, result) = run_with(
            "try { bash.exec(\"echo broken >&2; exit 1\") } catch (e) { return e.message }",
            bash_config(),
        )
        .await;
        assert_eq!(
            result.unwrap(),
            Some(Value::from("Command failed with exit code 1: broken"))
        );
    }

    #[tokio::test]
    async fn test_dry_run_does_not_execute() {
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_run().never();
        launcher.expect_spawn().never();
        let config = ScriptConfig {
            dry_run: true,
            ..bash_config()
        }
        .with_process_launcher(Arc::new(launcher));
        let (evaluator, result) = run_with(
            "let a = exec(\"rm -rf build\")\nlet b = bash.spawn(\"cargo\", [\"build\"])\nreturn [a, b.code]",
            config,
        )
        .await;
        assert_eq!(result.unwrap().unwrap().to_string(), r#"["",0]"#);
        assert_eq!(
            evaluator.output(),
            vec![
                "[DRY RUN] Would execute: rm -rf build",
                "[DRY RUN] Would execute: cargo build"
            ]
        );
    }

    #[tokio::test]
    async fn test_spawn_echoes_lines_when_verbose() {
        let mut launcher = MockProcessLauncher::new();
        launcher
            .expect_spawn()
            .withf(|program, args, _, _| program == "make" && args == ["all".to_string()])
            .returning(|_, _, _, lines| {
                lines.send(OutputLine::Stdout("compiling".to_string())).unwrap();
                lines.send(OutputLine::Stderr("warning".to_string())).unwrap();
                Ok(ProcessOutput {
                    stdout: "compiling\n".to_string(),
                    stderr: "warning\n".to_string(),
                    code: 0,
                })
            });
        let config = ScriptConfig {
            verbose: true,
            ..bash_config()
        }
        .with_process_launcher(Arc::new(launcher));
        let (evaluator, result) =
            run_with("return bash.spawn(\"make\", [\"all\"]).stdout", config).await;
        assert_eq!(result.unwrap(), Some(Value::from("compiling\n")));
        assert_eq!(evaluator.output(), vec!["compiling", "[stderr] warning"]);
    }
}
