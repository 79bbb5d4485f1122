//! Code generation client.
//!
//! The Coder stage hands the user's request to an external LLM CLI and
//! expects back a single JSON object holding the complete file set. This
//! module owns the prompt contract, the subprocess invocation, and the
//! strict response parsing; nothing downstream ever sees a partially valid
//! file list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;

use crate::errors::GenerationError;

/// The system prompt used for generating an application from a user request.
pub const GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert full-stack developer generating a small React application from a user's request. The output must be compatible with Sandpack (a browser-based bundler).

Given the user request below, generate every file the application needs.

Requirements:
- The package.json file MUST include "react", "react-dom", and "react-scripts" as dependencies. Use recent but stable versions.
- The main application component lives at /src/App.jsx and the entry point at /src/index.js.
- Include any other components or stylesheets the request calls for.
- Keep the code simple, functional, and directly related to the request.

Output ONLY a single JSON object in this exact format (no other text):
{
  "codeFiles": [
    {
      "path": "/package.json",
      "content": "<complete raw file content>"
    }
  ]
}

Guidelines:
- Every path is absolute and slash-rooted (e.g. /src/App.jsx)
- "content" holds the complete raw code for the file as a string
- Do not wrap the JSON in markdown fences"#;

/// One generated file: an absolute slash-rooted path and its full content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// The canonical generation result: an ordered list of files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub code_files: Vec<GeneratedFile>,
}

impl GenerationOutput {
    /// Best-guess entry point: the first conventional app-root file, else
    /// the first file.
    pub fn entry_point(&self) -> Option<&str> {
        self.code_files
            .iter()
            .find(|f| f.path.contains("App.jsx") || f.path.contains("index.js"))
            .or_else(|| self.code_files.first())
            .map(|f| f.path.as_str())
    }
}

/// The generation service boundary.
///
/// The orchestrator only ever talks to this trait, so tests and offline runs
/// can substitute a scripted implementation.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError>;
}

/// Generates code by invoking an LLM CLI in print mode.
pub struct ClaudeCliGenerator {
    command: String,
    working_dir: PathBuf,
}

impl ClaudeCliGenerator {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: expand_home(&command.into()),
            working_dir: working_dir.into(),
        }
    }

    fn build_prompt(user_prompt: &str) -> String {
        format!(
            "{}\n\n## User Request\n\n{}",
            GENERATION_SYSTEM_PROMPT, user_prompt
        )
    }
}

#[async_trait]
impl CodeGenerator for ClaudeCliGenerator {
    async fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError> {
        let full_prompt = Self::build_prompt(prompt);

        tracing::debug!(command = %self.command, "invoking generation command");

        let output = Command::new(&self.command)
            .arg("--print")
            .arg("-p")
            .arg(&full_prompt)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| GenerationError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(stderr = %stderr, "generation command failed");
            return Err(GenerationError::NonZeroExit {
                exit_code: output.status.code().unwrap_or(-1),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_generation_output(&stdout)
    }
}

/// Deterministic generator for tests and offline runs.
///
/// Pops one queued response per `generate` call; an exhausted script fails
/// the same way an empty service response would.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<GenerationOutput, GenerationError>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a script with a single successful reply.
    pub fn with_output(files: Vec<GeneratedFile>) -> Self {
        let generator = Self::new();
        generator.push_success(files);
        generator
    }

    pub fn push_success(&self, files: Vec<GeneratedFile>) {
        self.queue()
            .push_back(Ok(GenerationOutput { code_files: files }));
    }

    pub fn push_failure(&self, error: GenerationError) {
        self.queue().push_back(Err(error));
    }

    fn queue(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<GenerationOutput, GenerationError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GenerationOutput, GenerationError> {
        self.queue()
            .pop_front()
            .unwrap_or(Err(GenerationError::Empty))
    }
}

/// Resolve a leading `~/` in a configured command path. `Command::new` does
/// no shell expansion of its own.
fn expand_home(command: &str) -> String {
    if let Some(rest) = command.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest).to_string_lossy().into_owned();
    }
    command.to_string()
}

/// Compute a short content hash of a prompt.
///
/// Used to correlate a persisted run record with the request that produced
/// it. First 12 hex characters of the SHA256.
pub fn compute_prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..12].to_string()
}

/// Parse a generation response into the canonical output shape.
///
/// The model may wrap the JSON in prose, so the object is first extracted
/// from the raw text. The shape is then validated strictly: a `codeFiles`
/// array, non-empty, every entry carrying an absolute path and content.
pub fn parse_generation_output(output: &str) -> Result<GenerationOutput, GenerationError> {
    let json_str = extract_json_object(output).ok_or(GenerationError::NoJson)?;

    let parsed: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| GenerationError::Malformed {
            reason: e.to_string(),
        })?;

    let entries = parsed
        .get("codeFiles")
        .ok_or_else(|| GenerationError::Malformed {
            reason: "missing 'codeFiles' field".to_string(),
        })?
        .as_array()
        .ok_or_else(|| GenerationError::Malformed {
            reason: "'codeFiles' is not an array".to_string(),
        })?;

    if entries.is_empty() {
        return Err(GenerationError::Empty);
    }

    let mut code_files = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let file: GeneratedFile =
            serde_json::from_value(entry.clone()).map_err(|e| GenerationError::Malformed {
                reason: format!("file {}: {}", i + 1, e),
            })?;
        if !file.path.starts_with('/') {
            return Err(GenerationError::Malformed {
                reason: format!(
                    "file {}: path must be slash-rooted, got '{}'",
                    i + 1,
                    file.path
                ),
            });
        }
        code_files.push(file);
    }

    Ok(GenerationOutput { code_files })
}

/// Extract a JSON object from text that may contain other content.
///
/// Scans for the outermost `{...}` pair. Brace characters inside JSON string
/// literals do not count toward nesting, since generated code content is
/// full of them.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> GeneratedFile {
        GeneratedFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    // =========================================
    // compute_prompt_hash tests
    // =========================================

    #[test]
    fn test_compute_prompt_hash_basic() {
        let hash = compute_prompt_hash("build me a todo app");
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_compute_prompt_hash_deterministic() {
        let prompt = "a weather dashboard with a five day forecast";
        assert_eq!(compute_prompt_hash(prompt), compute_prompt_hash(prompt));
    }

    #[test]
    fn test_compute_prompt_hash_empty_string() {
        // Empty string SHA256 is well-known
        assert_eq!(compute_prompt_hash(""), "e3b0c44298fc");
    }

    // =========================================
    // expand_home tests
    // =========================================

    #[test]
    fn test_expand_home_leaves_plain_commands_alone() {
        assert_eq!(expand_home("claude"), "claude");
        assert_eq!(expand_home("/usr/local/bin/claude"), "/usr/local/bin/claude");
    }

    #[test]
    fn test_expand_home_resolves_tilde_prefix() {
        if dirs::home_dir().is_none() {
            return;
        }
        let expanded = expand_home("~/bin/claude");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("bin/claude"));
    }

    // =========================================
    // extract_json_object tests
    // =========================================

    #[test]
    fn test_extract_json_object_simple() {
        let text = r#"{"key": "value"}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"key": "value"}"#));
    }

    #[test]
    fn test_extract_json_object_with_surrounding_text() {
        let text = r#"Here is the app: {"codeFiles": []} hope it helps"#;
        assert_eq!(extract_json_object(text), Some(r#"{"codeFiles": []}"#));
    }

    #[test]
    fn test_extract_json_object_nested() {
        let text = r#"{"outer": {"inner": "value"}}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_json_object_braces_in_strings() {
        // Code content carries unbalanced braces inside string literals
        let text = r#"{"content": "} } {"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_json_object_escaped_quotes_in_strings() {
        let text = r#"{"content": "say \"hi\" {"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_json_object_no_json() {
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn test_extract_json_object_unclosed() {
        assert_eq!(extract_json_object(r#"{"unclosed": "object""#), None);
    }

    // =========================================
    // parse_generation_output tests
    // =========================================

    #[test]
    fn test_parse_generation_output_basic() {
        let output = r#"{
            "codeFiles": [
                {"path": "/package.json", "content": "{}"},
                {"path": "/src/App.jsx", "content": "export default function App() {}"}
            ]
        }"#;

        let result = parse_generation_output(output).unwrap();
        assert_eq!(result.code_files.len(), 2);
        assert_eq!(result.code_files[0].path, "/package.json");
        assert_eq!(
            result.code_files[1].content,
            "export default function App() {}"
        );
    }

    #[test]
    fn test_parse_generation_output_with_surrounding_text() {
        let output = r#"Sure! Here is your application:

{"codeFiles": [{"path": "/src/index.js", "content": "render()"}]}

Let me know if you need changes."#;

        let result = parse_generation_output(output).unwrap();
        assert_eq!(result.code_files.len(), 1);
    }

    #[test]
    fn test_parse_generation_output_no_json() {
        let err = parse_generation_output("plain text only").unwrap_err();
        assert!(matches!(err, GenerationError::NoJson));
    }

    #[test]
    fn test_parse_generation_output_invalid_json() {
        let err = parse_generation_output(r#"{"codeFiles": oops}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed { .. }));
    }

    #[test]
    fn test_parse_generation_output_missing_code_files() {
        let err = parse_generation_output(r#"{"files": []}"#).unwrap_err();
        match err {
            GenerationError::Malformed { reason } => {
                assert!(reason.contains("codeFiles"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_generation_output_code_files_not_array() {
        let err = parse_generation_output(r#"{"codeFiles": "nope"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed { .. }));
    }

    #[test]
    fn test_parse_generation_output_empty_list() {
        let err = parse_generation_output(r#"{"codeFiles": []}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Empty));
        assert_eq!(err.to_string(), "AI failed to generate code files");
    }

    #[test]
    fn test_parse_generation_output_relative_path_rejected() {
        let output = r#"{"codeFiles": [{"path": "src/App.jsx", "content": ""}]}"#;
        let err = parse_generation_output(output).unwrap_err();
        match err {
            GenerationError::Malformed { reason } => {
                assert!(reason.contains("slash-rooted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_generation_output_missing_content_rejected() {
        let output = r#"{"codeFiles": [{"path": "/src/App.jsx"}]}"#;
        let err = parse_generation_output(output).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed { .. }));
    }

    // =========================================
    // entry_point tests
    // =========================================

    #[test]
    fn test_entry_point_prefers_app_root_file() {
        let output = GenerationOutput {
            code_files: vec![
                file("/package.json", "{}"),
                file("/src/App.jsx", ""),
                file("/src/index.js", ""),
            ],
        };
        assert_eq!(output.entry_point(), Some("/src/App.jsx"));
    }

    #[test]
    fn test_entry_point_falls_back_to_index() {
        let output = GenerationOutput {
            code_files: vec![file("/package.json", "{}"), file("/src/index.js", "")],
        };
        assert_eq!(output.entry_point(), Some("/src/index.js"));
    }

    #[test]
    fn test_entry_point_falls_back_to_first_file() {
        let output = GenerationOutput {
            code_files: vec![file("/readme.md", ""), file("/style.css", "")],
        };
        assert_eq!(output.entry_point(), Some("/readme.md"));
    }

    #[test]
    fn test_entry_point_empty() {
        let output = GenerationOutput { code_files: vec![] };
        assert_eq!(output.entry_point(), None);
    }

    // =========================================
    // GENERATION_SYSTEM_PROMPT tests
    // =========================================

    #[test]
    fn test_system_prompt_contains_output_contract() {
        assert!(GENERATION_SYSTEM_PROMPT.contains("\"codeFiles\""));
        assert!(GENERATION_SYSTEM_PROMPT.contains("\"path\""));
        assert!(GENERATION_SYSTEM_PROMPT.contains("\"content\""));
        assert!(GENERATION_SYSTEM_PROMPT.contains("no other text"));
    }

    #[test]
    fn test_system_prompt_contains_sandpack_requirements() {
        assert!(GENERATION_SYSTEM_PROMPT.contains("Sandpack"));
        assert!(GENERATION_SYSTEM_PROMPT.contains("react-scripts"));
        assert!(GENERATION_SYSTEM_PROMPT.contains("/src/App.jsx"));
        assert!(GENERATION_SYSTEM_PROMPT.contains("/src/index.js"));
    }

    // =========================================
    // ScriptedGenerator tests
    // =========================================

    #[tokio::test]
    async fn test_scripted_generator_pops_in_order() {
        let generator = ScriptedGenerator::new();
        generator.push_success(vec![file("/a.txt", "first")]);
        generator.push_failure(GenerationError::Empty);

        let first = generator.generate("prompt").await.unwrap();
        assert_eq!(first.code_files[0].content, "first");

        let second = generator.generate("prompt").await;
        assert!(matches!(second, Err(GenerationError::Empty)));
    }

    #[tokio::test]
    async fn test_scripted_generator_exhausted_script_fails() {
        let generator = ScriptedGenerator::new();
        let result = generator.generate("prompt").await;
        assert!(matches!(result, Err(GenerationError::Empty)));
    }
}
