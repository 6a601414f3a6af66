use crate::executor::{kill_process_group, shell_command};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, PartialEq)]
pub enum CompileStatus {
    Compiled,
    /// Compiler diagnostics, or a note that the compiler ran out of time
    Failed(String),
}

/// Run a compile command in `cwd` with the execution's time budget.
///
/// Only an exit status other than zero counts as failure; warnings on
/// stderr from a successful compile are ignored. `Err` means the compiler
/// could not be launched at all.
pub async fn compile(command: &str, cwd: &Path, limit: Duration) -> Result<CompileStatus> {
    let mut cmd = shell_command(command);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().context("Failed to execute compiler")?;
    let pid = child.id();

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(output) => output.context("Failed to wait for compiler")?,
        Err(_) => {
            // cc1, as, the JVM... live in the compiler's process group
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            return Ok(CompileStatus::Failed(format!(
                "Compilation timed out after {} ms",
                limit.as_millis()
            )))
        }
    };

    if output.status.success() {
        return Ok(CompileStatus::Compiled);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let diagnostics = if !stderr.trim().is_empty() {
        stderr.into_owned()
    } else {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            stdout.into_owned()
        } else {
            match output.status.code() {
                Some(code) => format!("Command failed: {} (exit code {})", command, code),
                None => format!("Command failed: {} (terminated by signal)", command),
            }
        }
    };
    Ok(CompileStatus::Failed(diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn successful_command_compiles() {
        let dir = TempDir::new().unwrap();
        let status = compile("touch artifact", dir.path(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status, CompileStatus::Compiled);
        assert!(dir.path().join("artifact").exists());
    }

    #[tokio::test]
    async fn failure_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let status = compile("echo 'main.c:1: error' >&2; exit 1", dir.path(), Duration::from_secs(5))
            .await
            .unwrap();
        match status {
            CompileStatus::Failed(diag) => assert!(diag.contains("main.c:1: error")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn silent_failure_names_the_exit_code() {
        let dir = TempDir::new().unwrap();
        let status = compile("exit 4", dir.path(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            status,
            CompileStatus::Failed("Command failed: exit 4 (exit code 4)".into())
        );
    }

    #[tokio::test]
    async fn slow_compiler_is_cut_off() {
        let dir = TempDir::new().unwrap();
        let status = compile("sleep 5", dir.path(), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(matches!(status, CompileStatus::Failed(ref m) if m.contains("timed out")));
    }

    /// Running and not merely a zombie waiting to be reaped
    fn is_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map_or(false, |rest| rest.trim_start().chars().next() != Some('Z')),
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn timed_out_compiler_takes_its_children_with_it() {
        let dir = TempDir::new().unwrap();
        let command = "sh -c 'echo $$ > helper.pid; exec sleep 30' & wait";
        let status = compile(command, dir.path(), Duration::from_millis(500))
            .await
            .unwrap();
        assert!(matches!(status, CompileStatus::Failed(ref m) if m.contains("timed out")));

        let pid = std::fs::read_to_string(dir.path().join("helper.pid")).unwrap();
        let pid = pid.trim();
        let mut gone = false;
        for _ in 0..40 {
            if !is_running(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "compiler helper {} survived the timeout", pid);
    }
}
