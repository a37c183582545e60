use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Error;

/// Which request/response wire shape an endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    OpenAi,
    Google,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub endpoint: String,
    pub model: String,
    pub key: String,
    pub kind: ApiKind,
    pub enabled: bool,
}

/// Reads all `[API_*]` sections from the config file.
///
/// Sections missing a required key, with an unsupported TYPE, or with an
/// unparseable ENABLED value are logged and skipped; later sections still
/// load. Disabled entries are kept in the list but never dispatched.
pub fn load_model_configs(path: &Path) -> Result<Vec<ModelConfig>, Error> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "configuration file '{}' not found",
            path.display()
        )));
    }
    let text = fs::read_to_string(path)?;

    let mut configs = Vec::new();
    for (section, keys) in parse_sections(&text) {
        let Some(suffix) = section.strip_prefix("API_") else {
            continue;
        };
        let get = |wanted: &str| {
            keys.iter()
                .find(|(key, _)| key == wanted)
                .map(|(_, value)| value.as_str())
                .filter(|value| !value.is_empty())
        };

        let name = get("NAME").unwrap_or(suffix).to_string();
        let kind = match get("TYPE").unwrap_or("openai").to_ascii_lowercase().as_str() {
            "openai" => ApiKind::OpenAi,
            "google" => ApiKind::Google,
            other => {
                warn!(section = %section, api_type = other, "unsupported API type, skipping section");
                continue;
            }
        };
        let enabled = match get("ENABLED") {
            None => true,
            Some(raw) => match parse_bool(raw) {
                Some(value) => value,
                None => {
                    warn!(section = %section, value = raw, "unparseable ENABLED value, skipping section");
                    continue;
                }
            },
        };
        let (Some(key), Some(endpoint), Some(model)) = (get("KEY"), get("ENDPOINT"), get("MODEL"))
        else {
            warn!(section = %section, "incomplete configuration, skipping section");
            continue;
        };

        info!(name = %name, kind = ?kind, enabled, "loaded model configuration");
        configs.push(ModelConfig {
            name,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            key: key.to_string(),
            kind,
            enabled,
        });
    }
    Ok(configs)
}

/// Reads the shared system prompt, creating an empty file when absent so a
/// fresh checkout runs without manual setup. Empty means "no system message".
/// Never aborts the run: a file that cannot be created or read just means
/// requests go out without a system message.
pub fn load_system_prompt(path: &Path) -> String {
    if !path.exists() {
        info!(path = %path.display(), "creating empty system prompt file");
        if let Err(err) = fs::write(path, "") {
            warn!(path = %path.display(), error = %err, "failed to create system prompt file");
        }
        return String::new();
    }
    match fs::read_to_string(path) {
        Ok(text) => text.trim().to_string(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read system prompt, continuing without one");
            String::new()
        }
    }
}

/// Minimal INI-style parser: `[section]` lines followed by `key = value`
/// pairs. Keys are uppercased so lookups are case-insensitive; `#` and `;`
/// start comment lines. Pairs before any section header are dropped.
fn parse_sections(text: &str) -> Vec<(String, Vec<(String, String)>)> {
    let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            sections.push((name.trim().to_string(), Vec::new()));
        } else if let Some((key, value)) = line.split_once('=') {
            if let Some((_, pairs)) = sections.last_mut() {
                pairs.push((key.trim().to_ascii_uppercase(), value.trim().to_string()));
            }
        }
    }
    sections
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(".config");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_openai_and_google_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[API_GPT]\n\
             KEY = sk-test\n\
             ENDPOINT = https://api.example.com/v1\n\
             MODEL = gpt-test\n\
             NAME = GPT\n\
             TYPE = openai\n\
             \n\
             [API_GEMINI]\n\
             KEY = g-test\n\
             ENDPOINT = https://generativelanguage.example.com/v1beta/models\n\
             MODEL = gemini-test\n\
             TYPE = Google\n",
        );

        let configs = load_model_configs(&path).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "GPT");
        assert_eq!(configs[0].kind, ApiKind::OpenAi);
        assert!(configs[0].enabled);
        assert_eq!(configs[1].name, "GEMINI");
        assert_eq!(configs[1].kind, ApiKind::Google);
    }

    #[test]
    fn defaults_name_type_and_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[API_LOCAL]\nkey = k\nendpoint = http://localhost:8080/v1\nmodel = m\n",
        );

        let configs = load_model_configs(&path).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "LOCAL");
        assert_eq!(configs[0].kind, ApiKind::OpenAi);
        assert!(configs[0].enabled);
    }

    #[test]
    fn disabled_entry_is_retained() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[API_OFF]\nKEY = k\nENDPOINT = e\nMODEL = m\nENABLED = no\n",
        );

        let configs = load_model_configs(&path).unwrap();
        assert_eq!(configs.len(), 1);
        assert!(!configs[0].enabled);
    }

    #[test]
    fn malformed_section_does_not_block_later_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[API_BROKEN]\nKEY = k\nMODEL = m\n\
             [API_BADTYPE]\nKEY = k\nENDPOINT = e\nMODEL = m\nTYPE = azure\n\
             [API_OK]\nKEY = k\nENDPOINT = e\nMODEL = m\n",
        );

        let configs = load_model_configs(&path).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "OK");
    }

    #[test]
    fn non_api_sections_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[GENERAL]\nKEY = noise\n[API_A]\nKEY = k\nENDPOINT = e\nMODEL = m\n",
        );

        let configs = load_model_configs(&path).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "A");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_model_configs(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for raw in ["1", "yes", "True", "ON"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "No", "false", "off"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn system_prompt_created_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("systemprompt.txt");

        assert_eq!(load_system_prompt(&path), "");
        assert!(path.exists());
    }

    #[test]
    fn system_prompt_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("systemprompt.txt");
        fs::write(&path, "  answer in haiku  \n").unwrap();

        assert_eq!(load_system_prompt(&path), "answer in haiku");
    }

    #[test]
    fn unreadable_system_prompt_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("systemprompt.txt");
        fs::create_dir(&path).unwrap();

        assert_eq!(load_system_prompt(&path), "");
    }
}
