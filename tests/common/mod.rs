//! Shared test utilities

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use persona_voice::voice::{AudioClip, AudioFormat};
use persona_voice::{
    ChatModel, CompletionParams, Error, PersonaStore, PipelineState, Result, Synthesizer,
    Transcriber, Turn, TurnPipeline,
};
use tempfile::TempDir;
use tokio::sync::watch;

/// Transcriber returning a fixed text or failing
pub struct FakeTranscriber {
    text: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn saying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _clip: &AudioClip) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| Error::Transcription("provider unavailable".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}

/// Chat model replying with fixed text and remembering what it was sent
pub struct FakeChatModel {
    reply: Option<String>,
    pub seen: Mutex<Vec<Vec<Turn>>>,
}

impl FakeChatModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    async fn complete(&self, turns: &[Turn], _params: &CompletionParams) -> Result<String> {
        self.seen.lock().unwrap().push(turns.to_vec());
        // Surface a non-completion error to check the pipeline normalizes it
        self.reply
            .clone()
            .ok_or_else(|| Error::Config("upstream returned 500".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-llm"
    }
}

/// Synthesizer producing fixed bytes or failing
pub struct FakeSynthesizer {
    audio: Option<Vec<u8>>,
    pub calls: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn producing(audio: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            audio: Some(audio.to_vec()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            audio: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.audio
            .clone()
            .ok_or_else(|| Error::Synthesis("quota exceeded".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

/// Records the published pipeline state at each provider call
#[derive(Default)]
pub struct StateRecorder {
    receiver: OnceLock<watch::Receiver<PipelineState>>,
    pub observed: Mutex<Vec<PipelineState>>,
}

impl StateRecorder {
    pub fn attach(&self, pipeline: &TurnPipeline) {
        let _ = self.receiver.set(pipeline.subscribe());
    }

    fn record(&self) {
        if let Some(rx) = self.receiver.get() {
            self.observed.lock().unwrap().push(*rx.borrow());
        }
    }
}

#[async_trait]
impl Transcriber for StateRecorder {
    async fn transcribe(&self, _clip: &AudioClip) -> Result<String> {
        self.record();
        Ok("hello".to_string())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[async_trait]
impl ChatModel for StateRecorder {
    async fn complete(&self, _turns: &[Turn], _params: &CompletionParams) -> Result<String> {
        self.record();
        Ok("hi there".to_string())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[async_trait]
impl Synthesizer for StateRecorder {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        self.record();
        Ok(vec![0xff, 0xfb])
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Pipeline over the given fakes with default sampling parameters
pub fn pipeline(
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn ChatModel>,
    synthesizer: Arc<dyn Synthesizer>,
) -> TurnPipeline {
    TurnPipeline::new(transcriber, model, synthesizer, CompletionParams::default())
}

/// A non-empty browser-style recording
pub fn clip() -> AudioClip {
    AudioClip::new(vec![0x1a, 0x45, 0xdf, 0xa3], AudioFormat::Webm)
}

/// Persona documents written to a temporary directory
pub struct PersonaFixture {
    pub dir: TempDir,
    pub store: Arc<PersonaStore>,
}

impl PersonaFixture {
    pub fn write_persona(&self, json: &str) {
        std::fs::write(self.dir.path().join("persona.json"), json).unwrap();
    }

    pub fn write_facts(&self, json: &str) {
        std::fs::write(self.dir.path().join("facts.json"), json).unwrap();
    }
}

/// Persona named Dan with a small fact sheet
pub fn dan_fixture() -> PersonaFixture {
    persona_fixture(
        r#"{"name": "Dan Smith", "role": "Backend engineer", "tone": "warm"}"#,
        r#"{"years_experience": 7, "languages": ["Rust", "Go"]}"#,
    )
}

pub fn persona_fixture(persona: &str, facts: &str) -> PersonaFixture {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "persona.json", persona);
    write(dir.path(), "facts.json", facts);
    let store = Arc::new(PersonaStore::new(
        dir.path().join("persona.json"),
        dir.path().join("facts.json"),
    ));
    PersonaFixture { dir, store }
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}
