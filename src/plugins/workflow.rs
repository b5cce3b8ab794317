//! Legacy workflow invocation
//!
//! A workflow runs as a child process in its own directory with the query
//! tokens as arguments and must print one `{"items": [...]}` document.
//! Dropping the returned future kills the child.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::core::{items_from_document, Item, Query};
use crate::plugins::error::DispatchError;
use crate::plugins::schema::WorkflowEntry;
use crate::{log_debug, log_warn};

fn build_command(plugin_dir: &Path, entry: &WorkflowEntry, query: &Query) -> Command {
    let mut command = match entry {
        WorkflowEntry::Executable(file) => Command::new(plugin_dir.join(file)),
        WorkflowEntry::Script { interpreter, source } => {
            let mut command = Command::new(interpreter.program());
            command.arg(interpreter.inline_flag()).arg(source);
            if interpreter.takes_arg0() {
                command.arg(plugin_dir.as_os_str());
            }
            command
        }
    };

    command
        .args(query.tokens())
        .current_dir(plugin_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

fn program_path(plugin_dir: &Path, entry: &WorkflowEntry) -> std::path::PathBuf {
    match entry {
        WorkflowEntry::Executable(file) => plugin_dir.join(file),
        WorkflowEntry::Script { interpreter, .. } => interpreter.program().into(),
    }
}

/// Run the workflow at `plugin_dir` and parse the items it prints
pub async fn run_workflow(
    plugin_dir: &Path,
    entry: &WorkflowEntry,
    query: &Query,
) -> Result<Vec<Item>, DispatchError> {
    let child = build_command(plugin_dir, entry, query)
        .spawn()
        .map_err(|source| DispatchError::Spawn {
            path: program_path(plugin_dir, entry),
            source,
        })?;

    let output = child.wait_with_output().await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        log_debug!("[{}] stderr: {}", plugin_dir.display(), stderr.trim());
    }
    if !output.status.success() {
        log_warn!("Workflow {} exited with {}", plugin_dir.display(), output.status);
    }

    parse_workflow_output(&output.stdout)
}

/// Parse captured stdout. Blank output means no items.
pub fn parse_workflow_output(stdout: &[u8]) -> Result<Vec<Item>, DispatchError> {
    let text = String::from_utf8_lossy(stdout);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document = serde_json::from_str(text.trim()).map_err(DispatchError::Parse)?;
    Ok(items_from_document(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output() {
        assert!(parse_workflow_output(b"").unwrap().is_empty());
        assert!(parse_workflow_output(b" \n\t").unwrap().is_empty());

        let items = parse_workflow_output(br#"{"items":[{"title":"A","arg":"a"}]}"#).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "A");
    }

    #[test]
    fn test_parse_output_errors() {
        assert!(matches!(
            parse_workflow_output(br#"{"items": [{"title"#),
            Err(DispatchError::Parse(_))
        ));
        assert!(matches!(
            parse_workflow_output(br#"{"rerun": 1}"#),
            Err(DispatchError::Protocol(_))
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::plugins::schema::Interpreter;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use tempfile::TempDir;

        fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_executable_receives_tokens_as_argv() {
            let temp_dir = TempDir::new().unwrap();
            write_script(
                temp_dir.path(),
                "main",
                r#"echo "{\"items\":[{\"title\":\"$1\",\"subtitle\":\"$2\"}]}"
echo "diagnostics" >&2"#,
            );

            let items = run_workflow(
                temp_dir.path(),
                &WorkflowEntry::default(),
                &Query::new(["hello world", "two"]),
            )
            .await
            .unwrap();

            assert_eq!(items[0].title, "hello world");
            assert_eq!(items[0].subtitle.as_deref(), Some("two"));
        }

        #[tokio::test]
        async fn test_runs_in_plugin_directory() {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join("data.json"), r#"{"items":[{"title":"local"}]}"#).unwrap();
            write_script(temp_dir.path(), "filter.sh", "cat data.json");

            let entry = WorkflowEntry::Executable("filter.sh".into());
            let items = run_workflow(temp_dir.path(), &entry, &Query::default()).await.unwrap();
            assert_eq!(items[0].title, "local");
        }

        #[tokio::test]
        async fn test_inline_script() {
            let temp_dir = TempDir::new().unwrap();
            let entry = WorkflowEntry::Script {
                interpreter: Interpreter::Sh,
                source: r#"printf '{"items":[{"title":"%s"}]}' "$*""#.to_string(),
            };

            let items = run_workflow(temp_dir.path(), &entry, &Query::new(["a", "b"]))
                .await
                .unwrap();
            assert_eq!(items[0].title, "a b");
        }

        #[tokio::test]
        async fn test_silent_failure_yields_no_items() {
            let temp_dir = TempDir::new().unwrap();
            write_script(temp_dir.path(), "main", "exit 3");

            let items = run_workflow(temp_dir.path(), &WorkflowEntry::default(), &Query::default())
                .await
                .unwrap();
            assert!(items.is_empty());
        }

        #[tokio::test]
        async fn test_garbage_output_is_parse_error() {
            let temp_dir = TempDir::new().unwrap();
            write_script(temp_dir.path(), "main", "echo 'not json'");

            let result =
                run_workflow(temp_dir.path(), &WorkflowEntry::default(), &Query::default()).await;
            assert!(matches!(result, Err(DispatchError::Parse(_))));
        }

        #[tokio::test]
        async fn test_missing_entry_is_spawn_error() {
            let temp_dir = TempDir::new().unwrap();
            let result =
                run_workflow(temp_dir.path(), &WorkflowEntry::default(), &Query::default()).await;
            assert!(matches!(result, Err(DispatchError::Spawn { .. })));
        }
    }
}
