//! Cloud recognition: external recorder + Google Speech REST API.

use std::io::Cursor;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use aleph_core::config::SpeechConfig;

use crate::{Capture, CaptureRequest, SpeechBackend, SpeechError};

/// Extra time the recorder gets beyond the recording length before it is
/// considered hung.
const RECORDER_GRACE: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Speech backend that records with an external command (arecord by default)
/// and sends the WAV to the `speech:recognize` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleSpeechBackend {
    client: Client,
    config: SpeechConfig,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'a str,
    sample_rate_hertz: u32,
    language_code: &'a str,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

impl GoogleSpeechBackend {
    /// Create the backend, reading the API key from the configured
    /// environment variable. A missing key is not an error here; it is
    /// reported through `has_credentials` before each attempt.
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        let api_key = std::env::var(&config.credentials_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(variable = %config.credentials_env, "Speech API key is not set");
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SpeechError::Other(format!("failed to create HTTP client: {}", e)))?;
        info!(endpoint = %config.endpoint, language = %config.language, "Speech backend ready");
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Recorder command line with `{secs}` and `{rate}` filled in.
    pub fn recorder_args(&self, record_secs: u64) -> Vec<String> {
        self.config
            .record_command
            .iter()
            .map(|arg| {
                arg.replace("{secs}", &record_secs.to_string())
                    .replace("{rate}", &self.config.sample_rate.to_string())
            })
            .collect()
    }

    async fn record(&self, request: CaptureRequest) -> Result<Vec<u8>, SpeechError> {
        let record_time = request.listen_timeout + request.phrase_limit;
        let args = self.recorder_args(record_time.as_secs().max(1));
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| SpeechError::Other("record command is empty".to_string()))?;

        debug!(command = %args.join(" "), "Recording phrase");
        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(record_time + RECORDER_GRACE, output)
            .await
            .map_err(|_| SpeechError::Other(format!("{} did not finish in time", program)))?
            .map_err(|e| SpeechError::Other(format!("failed to start {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(SpeechError::Other(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(SpeechError::Other(format!("{} produced no audio", program)));
        }
        Ok(output.stdout)
    }

    /// Send a WAV recording for recognition and return the top transcript.
    pub async fn recognize(&self, wav: Vec<u8>) -> Result<String, SpeechError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SpeechError::Request("API key is not set".to_string()))?;

        let body = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: self.config.sample_rate,
                language_code: &self.config.language,
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(&wav),
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Request(format!("HTTP {}: {}", status, text.trim())));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::Request(format!("invalid response: {}", e)))?;

        let transcript = parsed
            .results
            .into_iter()
            .flat_map(|result| result.alternatives)
            .map(|alternative| alternative.transcript)
            .next();

        match transcript {
            Some(transcript) => Ok(transcript.trim().to_string()),
            None => Err(SpeechError::Unrecognized { audio: Some(wav) }),
        }
    }
}

/// Largest absolute sample value of a 16-bit WAV recording.
///
/// Streams written to a pipe carry a placeholder length, so reading stops at
/// the first sample that cannot be decoded.
pub fn peak_amplitude(wav: &[u8]) -> Result<i16, SpeechError> {
    let mut reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| SpeechError::Other(format!("invalid WAV recording: {}", e)))?;
    let peak = reader
        .samples::<i16>()
        .map_while(Result::ok)
        .map(|sample| sample.saturating_abs())
        .max()
        .unwrap_or(0);
    Ok(peak)
}

#[async_trait]
impl SpeechBackend for GoogleSpeechBackend {
    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn capture(&self, request: CaptureRequest) -> Result<Capture, SpeechError> {
        let wav = self.record(request).await?;

        let peak = peak_amplitude(&wav)?;
        if peak < self.config.silence_threshold {
            debug!(peak, threshold = self.config.silence_threshold, "Recording is silent");
            return Err(SpeechError::WaitTimeout);
        }

        let transcript = self.recognize(wav.clone()).await?;
        debug!(%transcript, "Recognition result");
        Ok(Capture::new(transcript).with_audio(wav))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn wav_with_amplitude(amplitude: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..1600 {
                let sample = if i % 2 == 0 { amplitude } else { -amplitude };
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn backend_for(server: &MockServer) -> GoogleSpeechBackend {
        let config = SpeechConfig {
            endpoint: format!("{}/v1/speech:recognize", server.uri()),
            ..SpeechConfig::default()
        };
        GoogleSpeechBackend::new(config)
            .unwrap()
            .with_api_key(Some("test-key".to_string()))
    }

    #[test]
    fn test_recorder_args_substitution() {
        let backend = GoogleSpeechBackend::new(SpeechConfig::default())
            .unwrap()
            .with_api_key(None);
        let args = backend.recorder_args(5);
        assert_eq!(args[0], "arecord");
        assert!(args.contains(&"16000".to_string()));
        assert!(args.contains(&"5".to_string()));
        assert!(!args.iter().any(|a| a.contains('{')));
        assert!(!backend.has_credentials());
    }

    #[test]
    fn test_peak_amplitude() {
        assert_eq!(peak_amplitude(&wav_with_amplitude(1200)).unwrap(), 1200);
        assert_eq!(peak_amplitude(&wav_with_amplitude(0)).unwrap(), 0);
        assert!(peak_amplitude(b"not a wav").is_err());
    }

    #[tokio::test]
    async fn test_recognize_returns_top_transcript() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech:recognize"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "config": { "encoding": "LINEAR16", "sampleRateHertz": 16000, "languageCode": "he-IL" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "alternatives": [ { "transcript": "אלף", "confidence": 0.93 } ] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let transcript = backend.recognize(wav_with_amplitude(900)).await.unwrap();
        assert_eq!(transcript, "אלף");
    }

    #[tokio::test]
    async fn test_recognize_without_results_is_unrecognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech:recognize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let wav = wav_with_amplitude(900);
        match backend.recognize(wav.clone()).await {
            Err(SpeechError::Unrecognized { audio }) => assert_eq!(audio, Some(wav)),
            other => panic!("Expected Unrecognized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recognize_http_failure_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech:recognize"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        match backend.recognize(wav_with_amplitude(900)).await {
            Err(SpeechError::Request(msg)) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("API key not valid"));
            }
            other => panic!("Expected Request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recognize_unreachable_service_is_request_error() {
        let config = SpeechConfig {
            endpoint: "http://127.0.0.1:1/v1/speech:recognize".to_string(),
            ..SpeechConfig::default()
        };
        let backend = GoogleSpeechBackend::new(config)
            .unwrap()
            .with_api_key(Some("k".to_string()));
        let result = backend.recognize(wav_with_amplitude(900)).await;
        assert!(matches!(result, Err(SpeechError::Request(_))));
    }

    #[tokio::test]
    async fn test_capture_silent_recording_is_wait_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("silence.wav");
        std::fs::write(&wav_path, wav_with_amplitude(10)).unwrap();

        let config = SpeechConfig {
            record_command: vec!["cat".to_string(), wav_path.display().to_string()],
            endpoint: "http://127.0.0.1:1/unused".to_string(),
            ..SpeechConfig::default()
        };
        let backend = GoogleSpeechBackend::new(config)
            .unwrap()
            .with_api_key(Some("k".to_string()));
        let result = backend
            .capture(CaptureRequest {
                listen_timeout: Duration::from_secs(1),
                phrase_limit: Duration::from_secs(1),
            })
            .await;
        assert!(matches!(result, Err(SpeechError::WaitTimeout)));
    }

    #[tokio::test]
    async fn test_capture_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech:recognize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [ { "alternatives": [ { "transcript": " bet " } ] } ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("bet.wav");
        let wav = wav_with_amplitude(4000);
        std::fs::write(&wav_path, &wav).unwrap();

        let config = SpeechConfig {
            record_command: vec!["cat".to_string(), wav_path.display().to_string()],
            endpoint: format!("{}/v1/speech:recognize", server.uri()),
            ..SpeechConfig::default()
        };
        let backend = GoogleSpeechBackend::new(config)
            .unwrap()
            .with_api_key(Some("k".to_string()));
        let capture = backend
            .capture(CaptureRequest {
                listen_timeout: Duration::from_secs(1),
                phrase_limit: Duration::from_secs(1),
            })
            .await
            .unwrap();
        assert_eq!(capture.transcript, "bet");
        assert_eq!(capture.audio, Some(wav));
    }

    #[tokio::test]
    async fn test_capture_failing_recorder_is_other() {
        let config = SpeechConfig {
            record_command: vec!["false".to_string()],
            ..SpeechConfig::default()
        };
        let backend = GoogleSpeechBackend::new(config)
            .unwrap()
            .with_api_key(Some("k".to_string()));
        let result = backend
            .capture(CaptureRequest {
                listen_timeout: Duration::from_secs(1),
                phrase_limit: Duration::from_secs(1),
            })
            .await;
        assert!(matches!(result, Err(SpeechError::Other(_))));
    }
}
