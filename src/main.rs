use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use persona_voice::api::{ApiServer, ApiState};
use persona_voice::prompt::{DEFAULT_NAME, POLICY_VERSION};
use persona_voice::voice::{
    AudioClip, AudioFormat, AudioPlayback, Pcm, Recorder, SynthesizedAudio, rms,
};
use persona_voice::{
    Config, ConfigOverrides, Fingerprint, PersonaStore, PipelineState, Session, TurnOutcome,
    TurnPipeline, build_system_prompt,
};

/// Persona Voice - talk to a persona-grounded assistant
#[derive(Parser)]
#[command(name = "persona-voice", version, about)]
struct Cli {
    /// Persona document
    #[arg(long, env = "PERSONA_VOICE_PERSONA")]
    persona: Option<PathBuf>,

    /// Fact sheet document
    #[arg(long, env = "PERSONA_VOICE_FACTS")]
    facts: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "PERSONA_VOICE_PORT")]
    port: Option<u16>,

    /// TOML secrets file
    #[arg(long, env = "PERSONA_VOICE_SECRETS")]
    secrets: Option<PathBuf>,

    /// dotenv file consulted after the environment
    #[arg(long, env = "PERSONA_VOICE_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Settings file (default: search standard locations)
    #[arg(long, env = "PERSONA_VOICE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            settings_path: self.settings.clone(),
            persona_path: self.persona.clone(),
            facts_path: self.facts.clone(),
            secrets_path: self.secrets.clone(),
            env_path: self.env_file.clone(),
            port: self.port,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve the conversation page and API (default)
    Serve,
    /// Push-to-talk conversation in the terminal
    Talk,
    /// Run one turn for a recorded audio file
    Ask {
        /// Audio file (wav, webm, ogg, mp3, m4a)
        file: PathBuf,
        /// Write the reply audio (MP3) here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the system prompt built from the persona documents
    Prompt,
    /// Report where each secret comes from and validate the documents
    Check,
    /// Interactive secrets setup
    Setup,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,persona_voice=info",
        1 => "info,persona_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = cli.overrides();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&overrides).await,
        Command::Talk => talk(&overrides).await,
        Command::Ask { file, out } => ask(&overrides, &file, out.as_deref()).await,
        Command::Prompt => print_prompt(&overrides),
        Command::Check => check(&overrides),
        Command::Setup => {
            let config = Config::load(&overrides)?;
            persona_voice::setup::run_setup(&config.secrets_path)
        }
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::TestTts { text } => test_tts(&overrides, &text).await,
    }
}

/// Load configuration, documents and secrets, then build the pipeline
///
/// Fails before any session starts if a document or secret is missing.
fn start(
    overrides: &ConfigOverrides,
) -> anyhow::Result<(Config, Arc<PersonaStore>, TurnPipeline)> {
    let config = Config::load(overrides)?;
    tracing::debug!(?config, "loaded configuration");

    let store = Arc::new(PersonaStore::new(
        config.persona_path.clone(),
        config.facts_path.clone(),
    ));
    store.load()?;

    let secrets = config.secret_resolver().resolve()?;
    let pipeline = config.build_pipeline(&secrets)?;

    Ok((config, store, pipeline))
}

async fn serve(overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let (config, store, pipeline) = start(overrides)?;

    let state = Arc::new(ApiState::new(Arc::new(pipeline), store)?);
    let name = state
        .documents()
        .persona
        .name
        .clone()
        .unwrap_or_else(|| DEFAULT_NAME.to_string());

    tracing::info!(persona = %name, port = config.port, "persona voice ready");
    println!("Open http://localhost:{} to talk to {name}", config.port);

    ApiServer::new(state, config.port).run().await?;
    Ok(())
}

/// Terminal conversation: Enter toggles recording
#[allow(clippy::future_not_send)]
async fn talk(overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let (_config, store, pipeline) = start(overrides)?;
    let documents = store.load()?;
    let name = documents.persona.first_name().unwrap_or(DEFAULT_NAME).to_string();
    let mut session = Session::for_persona(&documents);

    let mut recorder = Recorder::new()?;
    let playback = AudioPlayback::new()?;

    let mut states = pipeline.subscribe();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            if state != PipelineState::Idle {
                println!("  {}", state.label());
            }
        }
    });

    println!("Talk to {name}");
    println!("Enter: start/stop recording | r: new conversation | q: quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "q" => break,
            "r" => {
                let documents = store.load()?;
                session = Session::for_persona(&documents);
                println!("New conversation started.\n");
                continue;
            }
            _ => {}
        }

        recorder.start()?;
        println!("Recording... press Enter to stop");
        if lines.next_line().await?.is_none() {
            recorder.stop()?;
            break;
        }
        let clip = recorder.stop()?;

        match pipeline.run(&mut session, clip).await {
            Ok(outcome) => {
                print_outcome(&name, &outcome);
                if let Some(audio) = session.take_audio() {
                    if let Err(e) = playback.play_reply(audio).await {
                        tracing::warn!(error = %e, "reply playback failed");
                    }
                }
            }
            Err(e) if e.is_recoverable() => println!("  ! {e}\n"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn print_outcome(name: &str, outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Silent => println!("  (nothing heard)\n"),
        TurnOutcome::Spoken { transcript, reply } => {
            println!("You: {transcript}");
            println!("{name}: {reply}\n");
        }
        TurnOutcome::TextOnly {
            transcript,
            reply,
            error,
        } => {
            println!("You: {transcript}");
            println!("{name}: {reply}");
            println!("  ! {error}\n");
        }
    }
}

/// One turn from a file, without audio devices
async fn ask(overrides: &ConfigOverrides, file: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let (_config, store, pipeline) = start(overrides)?;
    let documents = store.load()?;
    let name = documents.persona.first_name().unwrap_or(DEFAULT_NAME).to_string();
    let mut session = Session::for_persona(&documents);

    let format = file
        .extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension)
        .ok_or_else(|| anyhow::anyhow!("unsupported audio file: {}", file.display()))?;
    let clip = AudioClip::new(tokio::fs::read(file).await?, format);

    let outcome = pipeline.run(&mut session, clip).await?;
    print_outcome(&name, &outcome);

    if let (Some(out), Some(audio)) = (out, session.take_audio()) {
        tokio::fs::write(out, &audio.bytes).await?;
        println!("Reply audio written to {}", out.display());
    }

    Ok(())
}

fn print_prompt(overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let config = Config::load(overrides)?;
    let store = PersonaStore::new(config.persona_path, config.facts_path);
    let documents = store.load()?;
    println!("{}", build_system_prompt(&documents.persona, &documents.facts));
    Ok(())
}

fn check(overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let config = Config::load(overrides)?;

    let resolver = config.secret_resolver();
    let order: Vec<String> = resolver.sources().iter().map(ToString::to_string).collect();
    println!("Secrets (lookup order: {}):", order.join(", "));
    for (name, source) in resolver.report() {
        match source {
            Some(source) => println!("  {name:<20} {source}"),
            None => println!("  {name:<20} MISSING"),
        }
    }

    let store = PersonaStore::new(config.persona_path.clone(), config.facts_path.clone());
    println!("\nDocuments:");
    for path in [store.persona_path(), store.facts_path()] {
        match std::fs::read(path) {
            Ok(bytes) => println!("  {} {}", path.display(), Fingerprint::of(&bytes)),
            Err(e) => println!("  {} unreadable: {e}", path.display()),
        }
    }

    let documents = store.load()?;
    println!(
        "\nPersona: {} (policy v{POLICY_VERSION})",
        documents.persona.name.as_deref().unwrap_or(DEFAULT_NAME)
    );

    resolver.resolve()?;
    println!("\nAll checks passed.");
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut recorder = Recorder::new()?;
    recorder.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = recorder.peek();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        recorder.clear();
    }

    recorder.stop()?;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check your input device and levels.");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);
    playback
        .play(Pcm {
            samples,
            sample_rate,
        })
        .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS output with the configured voice
async fn test_tts(overrides: &ConfigOverrides, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(overrides)?;
    let secrets = config.secret_resolver().resolve()?;
    let tts = config.text_to_speech(&secrets)?;

    println!("Synthesizing speech...");
    let bytes = tts.synthesize_text(text).await?;
    println!("Got {} bytes of audio data", bytes.len());

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    playback.play_reply(SynthesizedAudio { bytes }).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
