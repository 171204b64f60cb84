use super::RenderedTextFetcher;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Drives a single headless browser session through the `agent-browser` CLI.
///
/// `open <url>` navigates the session; `eval <js>` prints the JSON-quoted
/// result of the expression on stdout.
pub struct AgentBrowser {
    command: String,
    timeout: Duration,
    text_limit: usize,
}

impl AgentBrowser {
    pub fn new(command: impl Into<String>, timeout: Duration, text_limit: usize) -> Self {
        Self {
            command: command.into(),
            timeout,
            text_limit,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.command);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Scrape(format!("{} {} timed out", self.command, args[0])))?
            .map_err(|e| Error::Scrape(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Scrape(format!(
                "{} {} failed: {}",
                self.command,
                args[0],
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Strips the surrounding quotes and expands escaped newlines.
pub fn unquote_eval_output(raw: &str) -> String {
    raw.trim().trim_matches('"').replace("\\n", "\n")
}

#[async_trait]
impl RenderedTextFetcher for AgentBrowser {
    async fn open(&self, url: &str) -> Result<()> {
        self.run(&["open", url]).await.map(|_| ())
    }

    async fn text(&self) -> Result<String> {
        let script = format!("document.body.innerText.substring(0, {})", self.text_limit);
        let raw = self.run(&["eval", &script]).await?;
        Ok(unquote_eval_output(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_output_is_unquoted() {
        assert_eq!(
            unquote_eval_output("\"Largest Contentful Paint (LCP)\\n2.3 s\"\n"),
            "Largest Contentful Paint (LCP)\n2.3 s"
        );
    }
}
