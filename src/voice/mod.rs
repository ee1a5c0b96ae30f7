//! Speech collaborators: recognition (STT) and synthesis (TTS)

pub mod stt;
pub mod tts;

pub use stt::{SpeechRecognizer, SpeechToText, UploadFormat};
pub use tts::{SpeechSynthesizer, TextToSpeech};
