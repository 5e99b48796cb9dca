//! File builtins, installed when `enableFileOps` is on.
//!
//! Paths are resolved against the configured working directory. In dry-run
//! mode the mutating builtins only print what they would do and return
//! `true`.

use std::path::Path;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use super::{arg, expect_string, optional_string, Builtins};
use crate::eval::{EvalError, EvalResult, Evaluator, Value};

pub(super) fn register(builtins: &mut Builtins) {
    builtins
        .register_async("readFile", read_file)
        .register_async("writeFile", write_file)
        .register_async("appendFile", append_file)
        .register_async("exists", exists)
        .register_async("copyFile", copy_file)
        .register_async("moveFile", move_file)
        .register_async("deleteFile", delete_file)
        .register_async("mkdir", mkdir)
        .register_async("listDir", list_dir)
        .register_async("stat", stat)
        .register_sync("glob", glob);
}

/// Text written by `writeFile`/`appendFile`: strings verbatim, anything else
/// in its printed form.
fn contents_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_file<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = expect_string(&args, 0, "readFile")?;
        let contents = evaluator
            .file_system()
            .read_to_string(&evaluator.resolve_path(&path))
            .await?;
        Ok(Value::String(contents))
    }
    .boxed()
}

fn write_file<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = expect_string(&args, 0, "writeFile")?;
        if evaluator.dry_run(format!("Would write {}", path)) {
            return Ok(Value::from(true));
        }
        let contents = contents_of(&arg(&args, 1));
        debug!(path, bytes = contents.len(), "writeFile");
        evaluator
            .file_system()
            .write(&evaluator.resolve_path(&path), &contents)
            .await?;
        Ok(Value::from(true))
    }
    .boxed()
}

fn append_file<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = expect_string(&args, 0, "appendFile")?;
        if evaluator.dry_run(format!("Would append to {}", path)) {
            return Ok(Value::from(true));
        }
        let contents = contents_of(&arg(&args, 1));
        evaluator
            .file_system()
            .append(&evaluator.resolve_path(&path), &contents)
            .await?;
        Ok(Value::from(true))
    }
    .boxed()
}

fn exists<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = expect_string(&args, 0, "exists")?;
        let found = evaluator
            .file_system()
            .exists(&evaluator.resolve_path(&path))
            .await;
        Ok(Value::from(found))
    }
    .boxed()
}

fn copy_file<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let from = expect_string(&args, 0, "copyFile")?;
        let to = expect_string(&args, 1, "copyFile")?;
        if evaluator.dry_run(format!("Would copy {} to {}", from, to)) {
            return Ok(Value::from(true));
        }
        evaluator
            .file_system()
            .copy(&evaluator.resolve_path(&from), &evaluator.resolve_path(&to))
            .await?;
        Ok(Value::from(true))
    }
    .boxed()
}

fn move_file<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let from = expect_string(&args, 0, "moveFile")?;
        let to = expect_string(&args, 1, "moveFile")?;
        if evaluator.dry_run(format!("Would move {} to {}", from, to)) {
            return Ok(Value::from(true));
        }
        evaluator
            .file_system()
            .rename(&evaluator.resolve_path(&from), &evaluator.resolve_path(&to))
            .await?;
        Ok(Value::from(true))
    }
    .boxed()
}

fn delete_file<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = expect_string(&args, 0, "deleteFile")?;
        if evaluator.dry_run(format!("Would delete {}", path)) {
            return Ok(Value::from(true));
        }
        evaluator
            .file_system()
            .remove(&evaluator.resolve_path(&path))
            .await?;
        Ok(Value::from(true))
    }
    .boxed()
}

fn mkdir<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = expect_string(&args, 0, "mkdir")?;
        if evaluator.dry_run(format!("Would create directory {}", path)) {
            return Ok(Value::from(true));
        }
        evaluator
            .file_system()
            .create_dir_all(&evaluator.resolve_path(&path))
            .await?;
        Ok(Value::from(true))
    }
    .boxed()
}

fn list_dir<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = optional_string(&args, 0).unwrap_or_else(|| ".".to_string());
        let names = evaluator
            .file_system()
            .read_dir(&evaluator.resolve_path(&path))
            .await?;
        Ok(Value::array(names.into_iter().map(Value::from).collect()))
    }
    .boxed()
}

fn stat<'a>(evaluator: &'a Evaluator, args: Vec<Value>) -> BoxFuture<'a, EvalResult<Value>> {
    async move {
        let path = expect_string(&args, 0, "stat")?;
        let stat = evaluator
            .file_system()
            .stat(&evaluator.resolve_path(&path))
            .await?;
        Ok(Value::from_json(&serde_json::to_value(stat)?))
    }
    .boxed()
}

/// Matches below the working directory. Results are relative to it unless
/// the pattern was absolute.
fn glob(evaluator: &Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let pattern = expect_string(&args, 0, "glob")?;
    let workdir = evaluator.config().workdir.clone();
    let absolute = Path::new(&pattern).is_absolute();
    let resolved = evaluator.resolve_path(&pattern);
    let entries = glob::glob(&resolved.to_string_lossy())
        .map_err(|e| EvalError::runtime(format!("Invalid glob pattern '{}': {}", pattern, e)))?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| EvalError::Io(e.to_string()))?;
        let shown = if absolute {
            path
        } else {
            path.strip_prefix(&workdir).map(Path::to_path_buf).unwrap_or(path)
        };
        matches.push(Value::from(shown.to_string_lossy().into_owned()));
    }
    Ok(Value::array(matches))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::run_with;
    use crate::config::ScriptConfig;
    use crate::eval::Value;
    use crate::provider::fs::MockFileSystem;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> ScriptConfig {
        ScriptConfig {
            workdir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_file_round_trip_in_workdir() {
        let dir = TempDir::new().unwrap();
        let (_, result) = run_with(
            r#"
writeFile("notes/a.txt", "one")
appendFile("notes/a.txt", "\ntwo")
copyFile("notes/a.txt", "notes/b.txt")
moveFile("notes/b.txt", "notes/c.txt")
let info = stat("notes/c.txt")
return [readFile("notes/c.txt"), exists("notes/b.txt"), listDir("notes"), info.size, info.isFile]
"#,
            config_in(&dir),
        )
        .await;
        assert_eq!(
            result.unwrap().unwrap().to_string(),
            r#"["one\ntwo",false,["a.txt","c.txt"],7,true]"#
        );
        assert!(dir.path().join("notes/c.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_and_mkdir() {
        let dir = TempDir::new().unwrap();
        let (_, result) = run_with(
            "mkdir(\"a/b\")\nwriteFile(\"a/b/x.txt\", 1)\ndeleteFile(\"a\")\nreturn exists(\"a\")",
            config_in(&dir),
        )
        .await;
        assert_eq!(result.unwrap(), Some(Value::from(false)));
    }

    #[tokio::test]
    async fn test_glob_relative_to_workdir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/b.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/c.txt"), "").unwrap();
        let (_, result) = run_with("return glob(\"src/*.rs\")", config_in(&dir)).await;
        assert_eq!(result.unwrap().unwrap().to_string(), r#"["src/a.rs","src/b.rs"]"#);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_disk_alone() {
        let dir = TempDir::new().unwrap();
        let config = ScriptConfig {
            dry_run: true,
            ..config_in(&dir)
        };
        let (evaluator, result) = run_with(
            "let ok = writeFile(\"out.txt\", \"x\")\ndeleteFile(\"gone.txt\")\nreturn ok",
            config,
        )
        .await;
        assert_eq!(result.unwrap(), Some(Value::from(true)));
        assert!(!dir.path().join("out.txt").exists());
        assert_eq!(
            evaluator.output(),
            vec!["[DRY RUN] Would write out.txt", "[DRY RUN] Would delete gone.txt"]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_catchable() {
        let dir = TempDir::new().unwrap();
        let (_, result) = run_with(
            "try { readFile(\"nope.txt\") } catch (e) { return e.message }",
            config_in(&dir),
        )
        .await;
        let message = result.unwrap().unwrap().to_string();
        assert!(message.starts_with("IO error"), "{}", message);
    }

    #[tokio::test]
    async fn test_builtins_use_injected_file_system() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .withf(|path| path.ends_with("config.json"))
            .returning(|_| Ok("{\"name\": \"demo\"}".to_string()));
        let config = ScriptConfig::default().with_file_system(Arc::new(fs));
        let (_, result) = run_with(
            "return JSON.parse(readFile(\"config.json\")).name",
            config,
        )
        .await;
        assert_eq!(result.unwrap(), Some(Value::from("demo")));
    }
}
