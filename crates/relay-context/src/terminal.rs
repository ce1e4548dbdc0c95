//! Terminal/shell abstraction exposed by the context router.

use async_trait::async_trait;
use relay_kernel::KernelResult;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// The result of running a command to completion.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
    pub pid: Option<u32>,
    pub context_id: String,
}

/// The shell surface a tool needs, independent of whether commands run on
/// the local host or a remote hop.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn execute_command(&self, command: &str) -> KernelResult<CommandOutput>;
    fn context_id(&self) -> &str;
}

/// Executes commands on the local host via `/bin/sh -c`.
pub struct LocalTerminal {
    context_id: String,
    cwd: std::path::PathBuf,
}

impl LocalTerminal {
    pub fn new(context_id: impl Into<String>, cwd: impl Into<std::path::PathBuf>) -> Self {
        Self {
            context_id: context_id.into(),
            cwd: cwd.into(),
        }
    }
}

#[async_trait]
impl Terminal for LocalTerminal {
    async fn execute_command(&self, command: &str) -> KernelResult<CommandOutput> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(relay_kernel::KernelError::from)?;

        let pid = child.id();

        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();
        if let Some(mut out) = child.stdout.take() {
            let _ = out.read_to_string(&mut stdout_buf).await;
        }
        if let Some(mut err) = child.stderr.take() {
            let _ = err.read_to_string(&mut stderr_buf).await;
        }

        let status = child.wait().await.map_err(relay_kernel::KernelError::from)?;

        Ok(CommandOutput {
            status: status.code().unwrap_or(-1),
            stdout: stdout_buf,
            stderr: stderr_buf,
            pid,
            context_id: self.context_id.clone(),
        })
    }

    fn context_id(&self) -> &str {
        &self.context_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_simple_command() {
        let term = LocalTerminal::new("local", std::env::temp_dir());
        let out = term.execute_command("echo hi").await.unwrap();
        assert_eq!(out.status, 0);
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.context_id, "local");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_errored() {
        let term = LocalTerminal::new("local", std::env::temp_dir());
        let out = term.execute_command("exit 7").await.unwrap();
        assert_eq!(out.status, 7);
    }
}
