use crate::config::SttConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Turns recorded speech into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError>;
}

/// Speech recognition backed by the whisper.cpp command line tool.
#[derive(Debug, Clone)]
pub struct SttService {
    config: SttConfig,
}

impl SttService {
    pub fn new(config: SttConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SttConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

#[async_trait]
impl Transcriber for SttService {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
        if audio.is_empty() {
            return Err(VoiceError::Stt("audio data is empty".to_string()));
        }
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        // -f - reads the recording from stdin; -nt drops timestamps so stdout
        // carries only the recognized text.
        let mut command = Command::new(&self.config.binary_path);
        command
            .arg("-m")
            .arg(&self.config.model_path)
            .arg("-l")
            .arg(&self.config.language)
            .arg("-nt")
            .arg("-f")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Stt(format!("Failed to spawn STT binary: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Stt("Failed to open stdin".to_string()))?;

        // Feed stdin from a separate task so a chatty child cannot deadlock on a
        // full stdout pipe while we are still writing.
        let audio_owned = audio.to_vec();
        let write_task = tokio::spawn(async move {
            let result = stdin.write_all(&audio_owned).await;
            drop(stdin);
            result
        });

        let output = tokio::time::timeout(self.timeout(), child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Stt(format!(
                    "STT process timed out after {} seconds",
                    self.config.timeout_secs
                ))
            })?
            .map_err(|e| VoiceError::Stt(format!("Failed to read stdout: {}", e)))?;

        match write_task.await {
            Ok(Ok(())) => {}
            // The child stopped reading early; its exit status decides the outcome.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!("STT binary closed stdin before reading all audio");
            }
            Ok(Err(e)) => {
                return Err(VoiceError::Stt(format!(
                    "Failed to write audio to stdin: {}",
                    e
                )))
            }
            Err(e) => return Err(VoiceError::Stt(format!("Stdin task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Stt(format!("STT binary failed: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let text = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::debug!(bytes = audio.len(), chars = text.chars().count(), "transcribed audio");
        Ok(text)
    }
}
