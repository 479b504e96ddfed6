// Notification sinks. A notifier takes one batch (description, subject, ordered bodies) and
// reports success or failure; state is only acknowledged after success.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::config::{NotifyConfig, NotifyKind};

pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        description: &str,
        subject: &str,
        messages: &[String],
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Writes each batch to the log at WARN. Useful when no mail relay is available.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, description: &str, subject: &str, messages: &[String]) -> anyhow::Result<()> {
        tracing::warn!(
            operation = "notify",
            description,
            subject,
            body = %messages.join("\n"),
            "notification"
        );
        Ok(())
    }
}

/// Pipes the body into an external command (e.g. `mail -s {subject} ops@example.com`).
/// `{subject}` and `{description}` in args are substituted.
pub struct CommandNotifier {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    async fn deliver(&self, description: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let args = self.args.iter().map(|a| {
            a.replace("{subject}", subject)
                .replace("{description}", description)
        });
        let mut child = tokio::process::Command::new(&self.command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(body.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        let output = child.wait_with_output().await?;
        anyhow::ensure!(
            output.status.success(),
            "{} exited with {}: {}",
            self.command,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(())
    }
}

impl Notifier for CommandNotifier {
    async fn notify(&self, description: &str, subject: &str, messages: &[String]) -> anyhow::Result<()> {
        let body = messages.join("\n");
        tokio::time::timeout(self.timeout, self.deliver(description, subject, &body))
            .await
            .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", self.command, self.timeout))?
    }
}

/// Notifier selected by `[notify] kind`.
pub enum AppNotifier {
    Log(LogNotifier),
    Command(CommandNotifier),
}

impl AppNotifier {
    pub fn from_config(config: &NotifyConfig) -> anyhow::Result<Self> {
        match config.kind {
            NotifyKind::Log => Ok(AppNotifier::Log(LogNotifier)),
            NotifyKind::Command => {
                let command = config
                    .command
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("notify.command is required for kind = \"command\""))?;
                Ok(AppNotifier::Command(CommandNotifier::new(
                    command,
                    config.args.clone(),
                    Duration::from_secs(config.timeout_secs),
                )))
            }
        }
    }
}

impl Notifier for AppNotifier {
    async fn notify(&self, description: &str, subject: &str, messages: &[String]) -> anyhow::Result<()> {
        match self {
            AppNotifier::Log(n) => n.notify(description, subject, messages).await,
            AppNotifier::Command(n) => n.notify(description, subject, messages).await,
        }
    }
}
