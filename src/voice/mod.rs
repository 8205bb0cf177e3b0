//! Voice processing module
//!
//! Provider clients for transcription and synthesis, plus microphone
//! recording and speaker playback for the terminal adapter.

mod capture;
mod clip;
mod playback;
mod stt;
mod tts;

pub use capture::{Recorder, SAMPLE_RATE, rms, samples_to_wav};
pub use clip::{AudioClip, AudioFormat, SynthesizedAudio};
pub use playback::{AudioPlayback, Pcm, decode_mp3};
pub use stt::{DEFAULT_STT_BASE_URL, DEFAULT_STT_MODEL, SpeechToText};
pub use tts::{DEFAULT_TTS_BASE_URL, DEFAULT_TTS_MODEL, DEFAULT_VOICE_ID, TextToSpeech};
