//! System prompt builder
//!
//! The prompt is a pure function of the persona and fact sheet. The
//! behavioral policy appended after the identity sections lives in
//! `prompts/behavior_policy.txt` and is compiled into the binary.

use crate::persona::{FactSheet, Persona};

/// Version of the embedded behavioral policy
///
/// Bump whenever `prompts/behavior_policy.txt` or [`FORBIDDEN_PHRASES`]
/// change, since either changes how the assistant answers.
pub const POLICY_VERSION: u32 = 1;

/// Phrases the assistant is told never to use
pub const FORBIDDEN_PHRASES: &[&str] = &[
    "impactful",
    "leverage",
    "solutions",
    "efficient systems",
    "enhance",
    "skills improvement",
];

const POLICY_TEMPLATE: &str = include_str!("../prompts/behavior_policy.txt");

/// Name used when the persona has none
pub const DEFAULT_NAME: &str = "Assistant";
const DEFAULT_ROLE: &str = "Voice Agent";
const DEFAULT_TONE: &str = "Professional";
const DEFAULT_SPEAKING_STYLE: &str = "Natural";
const DEFAULT_CONTEXT: &str = "Interview";

/// Render the behavioral policy section
#[must_use]
pub fn behavior_policy() -> String {
    let phrases = FORBIDDEN_PHRASES
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");

    POLICY_TEMPLATE.replace("{forbidden_phrases}", &phrases)
}

/// Build the system prompt for a persona and its fact sheet
///
/// Prompt layout:
/// 1. Identity line
/// 2. Identity and behavior (role, tone, speaking style, context)
/// 3. Persona instructions
/// 4. Grounded facts (pretty-printed JSON)
/// 5. Behavioral policy
#[must_use]
pub fn build_system_prompt(persona: &Persona, facts: &FactSheet) -> String {
    let name = persona.name.as_deref().unwrap_or(DEFAULT_NAME);
    let role = persona.role.as_deref().unwrap_or(DEFAULT_ROLE);
    let tone = persona.tone.as_deref().unwrap_or(DEFAULT_TONE);
    let speaking_style = persona
        .speaking_style
        .as_deref()
        .unwrap_or(DEFAULT_SPEAKING_STYLE);
    let context = persona.context.as_deref().unwrap_or(DEFAULT_CONTEXT);

    // Value serialization cannot fail; fall back to compact form regardless
    let facts_json =
        serde_json::to_string_pretty(&facts.0).unwrap_or_else(|_| facts.0.to_string());

    let sections = [
        format!("You are {name}."),
        format!(
            "**Identity & Behavior:**\n{role}\nTone: {tone}\nSpeaking Style: {speaking_style}\nContext: {context}"
        ),
        format!("**Instructions:**\n{}", persona.instructions.join("\n")),
        format!(
            "**Grounded Facts:**\nUse these facts to answer questions. Do not invent contradictory information.\n{facts_json}"
        ),
        behavior_policy().trim_end().to_string(),
    ];

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dan() -> Persona {
        Persona {
            name: Some("Dan".to_string()),
            ..Persona::default()
        }
    }

    #[test]
    fn build_is_deterministic() {
        let facts = FactSheet(serde_json::json!({
            "education": {"degree": "BSc", "year": 2021},
            "city": "Pune",
        }));
        let a = build_system_prompt(&dan(), &facts);
        let b = build_system_prompt(&dan(), &facts);
        assert_eq!(a, b);
    }

    #[test]
    fn defaults_fill_absent_fields() {
        let prompt = build_system_prompt(&Persona::default(), &FactSheet::empty());
        assert!(prompt.starts_with("You are Assistant."));
        assert!(prompt.contains("Voice Agent"));
        assert!(prompt.contains("Tone: Professional"));
        assert!(prompt.contains("Speaking Style: Natural"));
        assert!(prompt.contains("Context: Interview"));
    }

    #[test]
    fn persona_fields_are_rendered() {
        let persona = Persona {
            name: Some("Dan".to_string()),
            role: Some("Backend engineer".to_string()),
            tone: Some("Relaxed".to_string()),
            speaking_style: None,
            context: Some("Podcast".to_string()),
            instructions: vec!["Be brief.".to_string(), "No jargon.".to_string()],
        };
        let prompt = build_system_prompt(&persona, &FactSheet::empty());

        assert!(prompt.starts_with("You are Dan."));
        assert!(prompt.contains("Backend engineer"));
        assert!(prompt.contains("Tone: Relaxed"));
        assert!(prompt.contains("Context: Podcast"));
        assert!(prompt.contains("**Instructions:**\nBe brief.\nNo jargon."));
    }

    #[test]
    fn facts_are_embedded_as_pretty_json() {
        let facts = FactSheet(serde_json::json!({"city": "Pune"}));
        let prompt = build_system_prompt(&dan(), &facts);
        assert!(prompt.contains("{\n  \"city\": \"Pune\"\n}"));
    }

    #[test]
    fn empty_facts_render_as_empty_object() {
        let prompt = build_system_prompt(&dan(), &FactSheet::empty());
        assert!(prompt.contains("contradictory information.\n{}"));
    }

    #[test]
    fn policy_lists_every_forbidden_phrase() {
        let policy = behavior_policy();
        for phrase in FORBIDDEN_PHRASES {
            assert!(policy.contains(&format!("- {phrase}\n")), "missing {phrase}");
        }
        assert!(!policy.contains("{forbidden_phrases}"));
    }

    #[test]
    fn policy_is_appended_after_facts() {
        let prompt = build_system_prompt(&dan(), &FactSheet::empty());
        let facts_at = prompt.find("**Grounded Facts:**").unwrap();
        let policy_at = prompt.find("**PERSONAL REALITY RULE:**").unwrap();
        assert!(facts_at < policy_at);
        assert!(prompt.contains("Avoid markdown formatting"));
    }
}
