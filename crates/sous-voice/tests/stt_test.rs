use sous_voice::{SttConfig, SttService, Transcriber, VoiceError};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Writes an executable shell script standing in for whisper-cli.
fn mock_binary(dir: &Path, body: &str) -> PathBuf {
    let script_path = dir.join("mock_whisper.sh");
    std::fs::write(&script_path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&script_path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script_path, perms).unwrap();
    script_path
}

fn service(binary: PathBuf) -> SttService {
    SttService::new(SttConfig {
        binary_path: binary,
        model_path: PathBuf::from("dummy_model.bin"),
        timeout_secs: 5,
        ..SttConfig::default()
    })
}

#[tokio::test]
async fn test_transcribe_returns_stdout_text() {
    let temp_dir = tempfile::tempdir().unwrap();
    let script = mock_binary(temp_dir.path(), "cat > /dev/null\necho '오늘 뭐 만들지'");

    let text = service(script).transcribe(b"RIFF fake wav").await.unwrap();
    assert_eq!(text, "오늘 뭐 만들지");
}

#[tokio::test]
async fn test_transcribe_joins_output_lines() {
    let temp_dir = tempfile::tempdir().unwrap();
    let script = mock_binary(
        temp_dir.path(),
        "cat > /dev/null\nprintf '\\n  양파를  \\n썰어 주세요\\n\\n'",
    );

    let text = service(script).transcribe(b"audio").await.unwrap();
    assert_eq!(text, "양파를 썰어 주세요");
}

#[tokio::test]
async fn test_transcribe_passes_model_and_language() {
    let temp_dir = tempfile::tempdir().unwrap();
    let script = mock_binary(temp_dir.path(), "cat > /dev/null\necho \"$@\"");

    let text = service(script).transcribe(b"audio").await.unwrap();
    assert_eq!(text, "-m dummy_model.bin -l ko -nt -f -");
}

#[tokio::test]
async fn test_transcribe_reports_binary_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let script = mock_binary(
        temp_dir.path(),
        "cat > /dev/null\necho 'unsupported audio format' >&2\nexit 3",
    );

    match service(script).transcribe(b"audio").await {
        Err(VoiceError::Stt(msg)) => {
            assert!(msg.contains("STT binary failed"));
            assert!(msg.contains("unsupported audio format"));
        }
        other => panic!("Expected Stt error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transcribe_rejects_empty_audio() {
    let service = service(PathBuf::from("/nonexistent/whisper"));
    match service.transcribe(b"").await {
        Err(VoiceError::Stt(msg)) => assert!(msg.contains("empty")),
        other => panic!("Expected Stt error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transcribe_missing_binary() {
    let service = service(PathBuf::from("/nonexistent/whisper"));
    match service.transcribe(b"audio").await {
        Err(VoiceError::Stt(msg)) => assert!(msg.contains("Failed to spawn")),
        other => panic!("Expected Stt error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transcribe_times_out() {
    let temp_dir = tempfile::tempdir().unwrap();
    let script = mock_binary(temp_dir.path(), "cat > /dev/null\nsleep 10\necho late");
    let service = SttService::new(SttConfig {
        binary_path: script,
        timeout_secs: 1,
        ..SttConfig::default()
    });

    match service.transcribe(b"audio").await {
        Err(VoiceError::Stt(msg)) => assert!(msg.contains("timed out")),
        other => panic!("Expected timeout error, got {:?}", other),
    }
}
