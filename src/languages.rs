//! Language profile registry (C2).
//!
//! A static map from language tag to {image, compile command, run command,
//! source extension, default timeout}, loaded once from a bundled TOML file
//! into a process-global `OnceLock` -- the teacher's pattern for language
//! configuration, trimmed to the fields this judge actually needs.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;

/// Resolved configuration for one supported language.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    /// Docker image the sandbox driver pulls/runs the program under.
    pub image: String,
    /// Compile command, split into argv. `None` for interpreted languages.
    pub compile_command: Option<Vec<String>>,
    /// Run command, split into argv.
    pub run_command: Vec<String>,
    /// Source file extension, including the leading dot.
    pub source_ext: String,
}

#[derive(Debug, Deserialize)]
struct RawLanguageProfile {
    image: String,
    compile_command: Option<String>,
    run_command: String,
    source_ext: String,
}

static LANGUAGES: OnceLock<HashMap<String, LanguageProfile>> = OnceLock::new();

/// Load language profiles from the bundled TOML file and populate the
/// process-global registry. Must be called once before `get_language_profile`.
pub fn init_languages() -> anyhow::Result<()> {
    let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
    load_languages_from_str(content)
}

fn load_languages_from_str(content: &str) -> anyhow::Result<()> {
    let raw: HashMap<String, RawLanguageProfile> =
        toml::from_str(content).context("failed to parse languages.toml")?;

    let mut languages = HashMap::with_capacity(raw.len());
    for (tag, profile) in raw {
        languages.insert(
            tag.to_lowercase(),
            LanguageProfile {
                image: profile.image,
                compile_command: profile.compile_command.map(|cmd| into_argv(&cmd)),
                run_command: into_argv(&profile.run_command),
                source_ext: profile.source_ext,
            },
        );
    }

    LANGUAGES
        .set(languages)
        .map_err(|_| anyhow::anyhow!("languages already initialized"))?;

    Ok(())
}

/// Resolve a language tag to its profile. Unknown tags return `None`; the
/// executor maps that to a CE verdict with "Unsupported language".
pub fn get_language_profile(tag: &str) -> Option<LanguageProfile> {
    LANGUAGES.get()?.get(&tag.to_lowercase()).cloned()
}

fn into_argv(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[c]
image = "gcc:11-alpine"
compile_command = "gcc -O2 -std=c11 -o solution solution.c"
run_command = "./solution"
source_ext = ".c"

[python]
image = "python:3.11-alpine"
run_command = "python3 solution.py"
source_ext = ".py"
"#;

    #[test]
    fn parses_compiled_and_interpreted_profiles() {
        let raw: HashMap<String, RawLanguageProfile> = toml::from_str(SAMPLE).unwrap();
        assert_eq!(
            raw["c"].compile_command.as_deref(),
            Some("gcc -O2 -std=c11 -o solution solution.c")
        );
        assert!(raw["python"].compile_command.is_none());
    }

    #[test]
    fn into_argv_splits_on_whitespace() {
        assert_eq!(
            into_argv("gcc -O2 -o solution solution.c"),
            vec!["gcc", "-O2", "-o", "solution", "solution.c"]
        );
    }
}
