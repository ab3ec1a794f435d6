use super::LlmBackend;
use crate::ai_provider::AiProvider;
use crate::error::{AllerGuardError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// AI CLI をサブプロセスとして起動し、プロンプトを標準入力で渡す
pub struct CliBackend {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CliBackend {
    pub fn new(provider: AiProvider, model: String) -> Self {
        let args: Vec<String> = match provider {
            AiProvider::Ollama => vec!["run".into(), model],
            AiProvider::Claude => vec!["-p".into(), "--output-format".into(), "text".into()],
            AiProvider::Codex => vec!["exec".into(), "-".into()],
            AiProvider::Gemini => Vec::new(),
        };
        Self {
            name: provider.command_name().to_string(),
            program: provider.command_name().to_string(),
            args,
        }
    }

    /// 任意のコマンドを使う
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            name: program.clone(),
            program,
            args,
        }
    }

    fn command(&self) -> Command {
        // Windowsではcmd /c経由
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/c").arg(&self.program);
            cmd
        };

        #[cfg(not(windows))]
        let mut cmd = Command::new(&self.program);

        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl LlmBackend for CliBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(program = %self.program, prompt_chars = prompt.chars().count(), "CLI実行");

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| AllerGuardError::ApiCall(format!("{} CLI実行エラー: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AllerGuardError::ApiCall(format!(
                "{} CLI failed (code {:?}): {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(program = %self.program, response_chars = response.chars().count(), "CLI応答");
        Ok(response)
    }
}
