use crate::config::TtsConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use sous_types::AudioChunk;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Bytes per sample of the s16le PCM piper emits.
const BYTES_PER_SAMPLE: usize = 2;

/// Lazily produced synthesis output, in playback order.
pub type AudioStream = BoxStream<'static, Result<AudioChunk, VoiceError>>;

/// Turns reply text into speech.
///
/// Implementations return as soon as synthesis has started; audio arrives
/// through the returned stream while the engine is still working. Dropping the
/// stream abandons synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, VoiceError>;
}

/// Speech synthesis backed by the piper command line tool.
///
/// Piper writes raw PCM (s16le, mono) to stdout as it renders each sentence.
/// The output is forwarded in chunks of at most `chunk_bytes` bytes, each
/// ending on a sample boundary.
#[derive(Debug, Clone)]
pub struct TtsService {
    config: TtsConfig,
    sample_rate: u32,
}

/// The part of a piper voice config this service reads.
#[derive(Debug, Deserialize)]
struct VoiceConfig {
    audio: VoiceAudio,
}

#[derive(Debug, Deserialize)]
struct VoiceAudio {
    sample_rate: u32,
}

impl TtsService {
    /// The voice's own config (`config_path`, or `<model>.json` next to the
    /// model) decides the sample rate when it can be read; `sample_rate` in
    /// `config` is the fallback.
    pub fn new(config: TtsConfig) -> Self {
        let voice_config = config
            .config_path
            .clone()
            .unwrap_or_else(|| voice_config_path(&config.model_path));
        let sample_rate = match read_voice_sample_rate(&voice_config) {
            Some(rate) if rate != config.sample_rate => {
                tracing::warn!(
                    configured = config.sample_rate,
                    voice = rate,
                    path = %voice_config.display(),
                    "tts.sample_rate disagrees with the voice config, using the voice's rate"
                );
                rate
            }
            Some(rate) => rate,
            None => config.sample_rate,
        };
        Self {
            config,
            sample_rate,
        }
    }

    /// Sample rate stamped on every chunk this service produces.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn validate(&self, text: &str) -> Result<(), VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        if !self.config.model_path.exists() {
            return Err(VoiceError::Tts(format!(
                "Model file not found: {:?}",
                self.config.model_path
            )));
        }

        if self.config.speed < 0.1 || self.config.speed > 10.0 {
            return Err(VoiceError::Config(
                "Speed must be between 0.1 and 10.0".to_string(),
            ));
        }

        if self.config.chunk_bytes < BYTES_PER_SAMPLE {
            return Err(VoiceError::Config(format!(
                "chunk_bytes must be at least {}",
                BYTES_PER_SAMPLE
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsService {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, VoiceError> {
        self.validate(text)?;

        let mut command = Command::new(&self.config.binary_path);
        command
            .arg("--model")
            .arg(&self.config.model_path)
            .arg("--output_raw")
            // Length scale is inverse of speed (roughly).
            // If speed is 2.0 (faster), length_scale should be 0.5 (shorter).
            .arg("--length_scale")
            .arg((1.0 / self.config.speed).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(config_path) = &self.config.config_path {
            command.arg("--config").arg(config_path);
        }

        if let Some(speaker) = self.config.speaker_id {
            command.arg("--speaker").arg(speaker.to_string());
        }

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("Failed to spawn piper: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Tts("Failed to open stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VoiceError::Tts("Failed to open stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VoiceError::Tts("Failed to open stderr".to_string()))?;

        // Piper reads one utterance per line.
        let mut line = text.replace('\n', " ");
        line.push('\n');
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                tracing::debug!(error = %e, "failed to write text to piper stdin");
            }
        });

        // Piper logs progress on stderr; drain it so the pipe never fills.
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        });

        let reader = PcmReader {
            child,
            stdout,
            stderr_task: Some(stderr_task),
            carry: None,
            chunk_bytes: self.config.chunk_bytes,
            sample_rate: self.sample_rate,
            timeout: Duration::from_secs(self.config.timeout_secs),
            finished: false,
        };

        Ok(stream::unfold(reader, PcmReader::next_chunk).boxed())
    }
}

/// Piper looks for `<model>.json` when no `--config` is given.
fn voice_config_path(model_path: &Path) -> PathBuf {
    let mut path = model_path.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

fn read_voice_sample_rate(path: &Path) -> Option<u32> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no readable voice config");
            return None;
        }
    };
    match serde_json::from_str::<VoiceConfig>(&contents) {
        Ok(voice) if voice.audio.sample_rate > 0 => Some(voice.audio.sample_rate),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse voice config");
            None
        }
    }
}

/// Reads piper's stdout incrementally. Owns the child so that dropping the
/// stream kills the process.
struct PcmReader {
    child: Child,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
    carry: Option<u8>,
    chunk_bytes: usize,
    sample_rate: u32,
    timeout: Duration,
    finished: bool,
}

impl PcmReader {
    async fn next_chunk(mut self) -> Option<(Result<AudioChunk, VoiceError>, Self)> {
        if self.finished {
            return None;
        }

        loop {
            // Leave room for a carried byte so no chunk exceeds chunk_bytes.
            let capacity = self.chunk_bytes - usize::from(self.carry.is_some());
            let mut buf = vec![0u8; capacity];
            let read = match tokio::time::timeout(self.timeout, self.stdout.read(&mut buf)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    return Some((
                        Err(VoiceError::Tts(format!("Failed to read piper output: {}", e))),
                        self.fail(),
                    ))
                }
                Err(_) => {
                    let timeout_secs = self.timeout.as_secs();
                    return Some((
                        Err(VoiceError::Tts(format!(
                            "TTS process produced no audio for {} seconds",
                            timeout_secs
                        ))),
                        self.fail(),
                    ));
                }
            };

            if read == 0 {
                self.finished = true;
                return match self.wait_for_exit().await {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), self)),
                };
            }

            buf.truncate(read);
            let samples = self.align(buf);
            if samples.is_empty() {
                continue;
            }
            return Some((Ok(AudioChunk::new(samples, self.sample_rate)), self));
        }
    }

    /// Prepends a byte held over from the previous read and holds back a
    /// trailing half sample.
    fn align(&mut self, buf: Vec<u8>) -> Vec<u8> {
        let mut samples = match self.carry.take() {
            Some(byte) => {
                let mut joined = Vec::with_capacity(buf.len() + 1);
                joined.push(byte);
                joined.extend_from_slice(&buf);
                joined
            }
            None => buf,
        };
        if samples.len() % BYTES_PER_SAMPLE != 0 {
            self.carry = samples.pop();
        }
        samples
    }

    async fn wait_for_exit(&mut self) -> Result<(), VoiceError> {
        let status = tokio::time::timeout(self.timeout, self.child.wait())
            .await
            .map_err(|_| VoiceError::Tts("piper did not exit after closing stdout".to_string()))?
            .map_err(|e| VoiceError::Tts(format!("Failed to wait for piper: {}", e)))?;

        if self.carry.is_some() {
            tracing::debug!("discarding trailing half sample from piper output");
        }

        if !status.success() {
            let stderr = match self.stderr_task.take() {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            return Err(VoiceError::Tts(format!("Piper failed: {}", stderr.trim())));
        }

        Ok(())
    }

    fn fail(mut self) -> Self {
        self.finished = true;
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "failed to kill piper after read error");
        }
        self
    }
}
