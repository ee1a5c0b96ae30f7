//! Speech-to-text for pot audio uploads
//!
//! Uploads arrive in whatever the firmware or the browser simulator managed
//! to record: RIFF/WAV from the ESP32 path, WebM/Opus from the simulator,
//! or raw 16 kHz PCM frames when the firmware skips the container entirely.
//! The format is probed from magic bytes before transcription so the right
//! content type reaches the provider.

use async_trait::async_trait;

use crate::{Error, Result};

/// Container format of an uploaded audio blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    /// RIFF/WAV container
    Wav {
        /// Sample rate read from the header
        sample_rate: u32,
    },
    /// WebM (EBML) container, typically Opus from a browser
    WebM,
    /// No recognizable container; assumed raw 16 kHz PCM from the firmware
    RawPcm,
}

impl UploadFormat {
    /// EBML magic that opens a WebM container
    const EBML_MAGIC: [u8; 4] = [0x1a, 0x45, 0xdf, 0xa3];

    /// Probe the container format from the first bytes of an upload
    ///
    /// WAV headers are validated with a real parse so a truncated RIFF
    /// prefix is not mistaken for playable audio.
    #[must_use]
    pub fn probe(audio: &[u8]) -> Self {
        if audio.starts_with(&Self::EBML_MAGIC) {
            return Self::WebM;
        }

        if audio.starts_with(b"RIFF") {
            let mut cursor = std::io::Cursor::new(audio);
            if let Ok(reader) = hound::WavReader::new(&mut cursor) {
                return Self::Wav {
                    sample_rate: reader.spec().sample_rate,
                };
            }
        }

        Self::RawPcm
    }

    /// MIME type to present to the transcription provider
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Wav { .. } => "audio/wav",
            Self::WebM => "audio/webm",
            Self::RawPcm => "application/octet-stream",
        }
    }

    /// Provider-side file name hint
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Wav { .. } => "query.wav",
            Self::WebM => "query.webm",
            Self::RawPcm => "query.pcm",
        }
    }
}

/// Transcribes pot audio to text
///
/// May return an empty string for silence; the pipeline treats that as a
/// recognition miss, not an error.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe an audio blob to text
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// Reqwest-backed speech recognizer
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a Whisper-backed recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn whisper(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a Deepgram-backed recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn deepgram(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Deepgram,
        })
    }

    async fn transcribe_whisper(&self, audio: &[u8], format: UploadFormat) -> Result<String> {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(format.file_name())
                    .mime_str(format.mime())
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        #[derive(serde::Deserialize)]
        struct WhisperResponse {
            text: String,
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text.trim().to_string())
    }

    async fn transcribe_deepgram(&self, audio: &[u8], format: UploadFormat) -> Result<String> {
        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", format.mime())
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        #[derive(serde::Deserialize)]
        struct DeepgramResponse {
            results: DeepgramResults,
        }
        #[derive(serde::Deserialize)]
        struct DeepgramResults {
            channels: Vec<DeepgramChannel>,
        }
        #[derive(serde::Deserialize)]
        struct DeepgramChannel {
            alternatives: Vec<DeepgramAlternative>,
        }
        #[derive(serde::Deserialize)]
        struct DeepgramAlternative {
            transcript: String,
        }

        let result: DeepgramResponse = response.json().await?;
        let transcript = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default();

        Ok(transcript)
    }
}

#[async_trait]
impl SpeechRecognizer for SpeechToText {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let format = UploadFormat::probe(audio);
        tracing::debug!(audio_bytes = audio.len(), ?format, "transcribing upload");

        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio, format).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio, format).await?,
        };

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..64 {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn probe_detects_wav_with_sample_rate() {
        let audio = wav_bytes(16_000);
        assert_eq!(
            UploadFormat::probe(&audio),
            UploadFormat::Wav {
                sample_rate: 16_000
            }
        );
    }

    #[test]
    fn probe_detects_webm_magic() {
        let mut audio = vec![0x1a, 0x45, 0xdf, 0xa3];
        audio.extend_from_slice(&[0u8; 32]);
        assert_eq!(UploadFormat::probe(&audio), UploadFormat::WebM);
    }

    #[test]
    fn probe_falls_back_to_raw_pcm() {
        assert_eq!(UploadFormat::probe(&[0u8; 128]), UploadFormat::RawPcm);
        // Truncated RIFF prefix is not a parseable WAV
        assert_eq!(UploadFormat::probe(b"RIFFxxxx"), UploadFormat::RawPcm);
    }

    #[test]
    fn whisper_requires_api_key() {
        assert!(SpeechToText::whisper(String::new(), "whisper-1".to_string()).is_err());
    }
}
