//! Child-process supervision for the MP3 encoder and audio player, wrapped
//! so their completion surfaces as a pollable event rather than a blocking
//! wait.

use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::oneshot;

use crate::error::{AppError, AppResult};

/// A spawned child process whose stdin is writable and whose termination
/// can be awaited without blocking the caller's event loop.
///
/// Used for both the MP3 encoder (fed the WAV payload via a temp file and
/// run to completion) and the audio player (kept running, stopped with a
/// `q\n` write to stdin). The child itself is moved into a background task
/// that drives `wait()`; this struct keeps only its stdin and a one-shot
/// receiver for the exit status.
pub struct ChildSupervisor {
    stdin: Option<ChildStdin>,
    finished: Option<oneshot::Receiver<std::process::ExitStatus>>,
}

impl ChildSupervisor {
    /// Spawns `command` with piped stdin, and arranges for a background
    /// task to report its exit status once.
    pub fn spawn(mut command: Command) -> AppResult<Self> {
        command.stdin(std::process::Stdio::piped());
        let mut child = command
            .spawn()
            .map_err(|e| AppError::ChildProcess(format!("failed to spawn: {e}")))?;

        let stdin = child.stdin.take();

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            if let Ok(status) = child.wait().await {
                let _ = tx.send(status);
            }
        });

        Ok(Self {
            stdin,
            finished: Some(rx),
        })
    }

    /// Writes `q\n` to the child's stdin, the documented stop signal for
    /// both the encoder and player children. A no-op once stdin has already
    /// been closed (the child already exited and dropped its end).
    pub async fn stop(&mut self) -> AppResult<()> {
        if let Some(stdin) = self.stdin.as_mut() {
            stdin
                .write_all(b"q\n")
                .await
                .map_err(|e| AppError::ChildProcess(format!("stdin write failed: {e}")))?;
        }
        Ok(())
    }

    /// Resolves once the child process has exited, yielding its status.
    /// Can only be awaited once; subsequent calls return a `ChildProcess`
    /// error.
    pub async fn finished(&mut self) -> AppResult<std::process::ExitStatus> {
        match self.finished.take() {
            Some(rx) => rx
                .await
                .map_err(|_| AppError::ChildProcess("child exit channel closed".into())),
            None => Err(AppError::ChildProcess("already awaited".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawned_process_reports_success() {
        let cmd = Command::new("true");
        let mut supervisor = ChildSupervisor::spawn(cmd).expect("spawn should succeed");
        let status = supervisor.finished().await.expect("child should finish");
        assert!(status.success());
    }

    #[tokio::test]
    async fn stop_writes_quit_sentinel_to_stdin() {
        let mut cmd = Command::new("cat");
        cmd.stdout(std::process::Stdio::null());
        let mut supervisor = ChildSupervisor::spawn(cmd).expect("spawn should succeed");
        supervisor.stop().await.expect("stop should write to stdin");
        // Dropping stdin (implicitly, once the struct itself drops) closes
        // the pipe and lets `cat` see EOF and exit.
        drop(supervisor);
    }

    #[tokio::test]
    async fn finished_twice_errors_on_the_second_call() {
        let cmd = Command::new("true");
        let mut supervisor = ChildSupervisor::spawn(cmd).expect("spawn should succeed");
        supervisor.finished().await.expect("first await succeeds");
        assert!(supervisor.finished().await.is_err());
    }
}
