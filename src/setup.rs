//! Interactive first-run setup (`persona-voice setup`)

use std::path::Path;

use dialoguer::{Confirm, Input};

use crate::config::secrets::{
    ELEVENLABS_API_KEY, GROQ_API_KEY, OPENAI_API_KEY, OPENAI_BASE_URL, load_toml_secrets,
    write_secrets_file,
};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Prompt for each credential and write the secrets file
///
/// Existing values are offered as the default and shown masked.
///
/// # Errors
///
/// Returns error if user input fails or the file cannot be written
pub fn run_setup(secrets_path: &Path) -> anyhow::Result<()> {
    println!("Persona Voice Setup\n");

    let existing = load_toml_secrets(secrets_path);
    if !existing.is_empty() {
        println!("Existing secrets found at {}\n", secrets_path.display());
    }

    let mut values = Vec::new();

    for (key, label) in [
        (OPENAI_API_KEY, "OpenAI API key"),
        (GROQ_API_KEY, "Groq API key (transcription)"),
        (ELEVENLABS_API_KEY, "ElevenLabs API key (speech)"),
    ] {
        let current = existing.get(key).map(String::as_str);
        let prompt = match current {
            Some(value) => format!("{label} (current: {}, leave blank to keep)", mask(value)),
            None => format!("{label} ({key})"),
        };

        let input: String = Input::new()
            .with_prompt(&prompt)
            .allow_empty(current.is_some())
            .interact_text()?;

        let value = if input.trim().is_empty() {
            current.unwrap_or_default().to_string()
        } else {
            input.trim().to_string()
        };
        values.push((key, value));
    }

    let base_url: String = Input::new()
        .with_prompt("OpenAI-compatible base URL")
        .default(
            existing
                .get(OPENAI_BASE_URL)
                .cloned()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        )
        .interact_text()?;
    values.push((OPENAI_BASE_URL, base_url.trim().to_string()));

    if secrets_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!("Overwrite {}?", secrets_path.display()))
            .default(true)
            .interact()?;
        if !overwrite {
            println!("Nothing written.");
            return Ok(());
        }
    }

    write_secrets_file(secrets_path, &values)?;
    println!("\nSecrets written to {}", secrets_path.display());
    println!("Keep this file out of version control.");
    println!("\nSetup complete! Run `persona-voice check` to verify.");

    Ok(())
}

/// Show only the ends of a secret
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
