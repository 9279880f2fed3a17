//! System prompts and template builders.
//!
//! Templates use `{query}` and `{results}` placeholders. Only those exact
//! tokens are substituted, so templates may contain literal JSON braces.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use super::plan::SubtaskResult;
use crate::core::truncate;

/// System prompt for the planning call.
pub const ORCHESTRATOR_SYSTEM_PROMPT: &str = "You are an orchestrator agent that breaks down complex tasks into smaller subtasks.

Your role is to:
1. Analyze the user's request
2. Decompose it into manageable subtasks
3. Assign each subtask to the appropriate worker type
4. Synthesize the results into a coherent response

Available worker types:
- general: For general reasoning and simple tasks
- calculator: For mathematical computations
- researcher: For information gathering and analysis
- writer: For content creation and editing

Be strategic in your task decomposition to maximize efficiency.";

/// User-message template for the planning call.
pub const PLANNING_TEMPLATE: &str = r#"Analyze this task and create a plan:

Task: {query}

Create a JSON plan with this structure:
{
  "analysis": "Your analysis of what needs to be done",
  "subtasks": [
    {
      "id": "task_1",
      "description": "What this subtask accomplishes",
      "worker_type": "general|calculator|researcher|writer",
      "input": "The specific input for this subtask"
    }
  ],
  "dependencies": {
    "task_2": ["task_1"]
  }
}

The "dependencies" object maps a subtask id to the ids it depends on.
Return only valid JSON."#;

/// User-message template for the synthesis call.
pub const SYNTHESIS_TEMPLATE: &str = "Synthesize these subtask results into a final response:

Original Task: {query}

Subtask Results:
{results}

Create a coherent, comprehensive response that addresses the original task.
Integrate all relevant information from the subtask results.";

/// System prompt for the synthesis call.
pub const SYNTHESIZER_SYSTEM_PROMPT: &str =
    "You are a skilled synthesizer. Create coherent responses from multiple inputs.";

/// System prompt for the executor used when no worker matches.
pub const DEFAULT_EXECUTOR_PROMPT: &str = "You are a helpful assistant. Complete the given task.";

/// System prompt for LLM-backed tree summarization.
pub const SUMMARIZER_SYSTEM_PROMPT: &str = "You are a summarization assistant. \
Write a concise summary that preserves the key facts, names, and figures of the \
provided passages. Return only the summary text.";

/// Maximum characters of a dependency's output carried into a dependent task.
pub const DEPENDENCY_EXCERPT_LEN: usize = 200;

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/agentree/prompts";

const ORCHESTRATOR_FILENAME: &str = "orchestrator.md";
const PLANNING_FILENAME: &str = "planning.md";
const SYNTHESIS_FILENAME: &str = "synthesis.md";
const SYNTHESIZER_FILENAME: &str = "synthesizer.md";
const SUMMARIZER_FILENAME: &str = "summarizer.md";

/// Prompts used by the orchestrator and summarizer.
///
/// Loaded from template files when available, falling back to compiled-in
/// defaults file by file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for planning.
    pub orchestrator: String,
    /// Planning user-message template (`{query}`).
    pub planning: String,
    /// Synthesis user-message template (`{query}`, `{results}`).
    pub synthesis: String,
    /// System prompt for synthesis.
    pub synthesizer: String,
    /// System prompt for LLM summarization.
    pub summarizer: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir`)
    /// 2. `AGENTREE_PROMPT_DIR` environment variable
    /// 3. `~/.config/agentree/prompts/`
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("AGENTREE_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            orchestrator: load_file(ORCHESTRATOR_FILENAME, ORCHESTRATOR_SYSTEM_PROMPT),
            planning: load_file(PLANNING_FILENAME, PLANNING_TEMPLATE),
            synthesis: load_file(SYNTHESIS_FILENAME, SYNTHESIS_TEMPLATE),
            synthesizer: load_file(SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
            summarizer: load_file(SUMMARIZER_FILENAME, SUMMARIZER_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            orchestrator: ORCHESTRATOR_SYSTEM_PROMPT.to_string(),
            planning: PLANNING_TEMPLATE.to_string(),
            synthesis: SYNTHESIS_TEMPLATE.to_string(),
            synthesizer: SYNTHESIZER_SYSTEM_PROMPT.to_string(),
            summarizer: SUMMARIZER_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Existing files are **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (ORCHESTRATOR_FILENAME, ORCHESTRATOR_SYSTEM_PROMPT),
            (PLANNING_FILENAME, PLANNING_TEMPLATE),
            (SYNTHESIS_FILENAME, SYNTHESIS_TEMPLATE),
            (SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
            (SUMMARIZER_FILENAME, SUMMARIZER_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Fills the planning template.
#[must_use]
pub fn build_planning_prompt(template: &str, query: &str) -> String {
    template.replace("{query}", query)
}

/// Fills the synthesis template with one `[✓]`/`[✗]` line per result.
///
/// Failed results show their error message in place of output.
#[must_use]
pub fn build_synthesis_prompt(template: &str, query: &str, results: &[SubtaskResult]) -> String {
    let mut block = String::new();
    for r in results {
        let (marker, body) = if r.success {
            ("✓", r.output.as_str())
        } else {
            ("✗", r.error.as_deref().unwrap_or(r.output.as_str()))
        };
        let _ = write!(block, "[{marker}] {}: {body}\n\n", r.id);
    }
    template
        .replace("{query}", query)
        .replace("{results}", &block)
}

/// Builds a subtask's input from its own input plus dependency context.
///
/// Each successful dependency contributes one line with at most
/// [`DEPENDENCY_EXCERPT_LEN`] characters of its output. With no
/// dependencies the input is returned unchanged.
#[must_use]
pub fn build_task_input(
    input: &str,
    dependencies: &[String],
    completed: &BTreeMap<String, SubtaskResult>,
) -> String {
    if dependencies.is_empty() {
        return input.to_string();
    }

    let mut out = format!("{input}\n\nContext from previous tasks:\n");
    for dep in dependencies {
        if let Some(result) = completed.get(dep).filter(|r| r.success) {
            let _ = writeln!(
                out,
                "- {dep}: {}",
                truncate(&result.output, DEPENDENCY_EXCERPT_LEN)
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn result(id: &str, success: bool, output: &str) -> SubtaskResult {
        SubtaskResult {
            id: id.to_string(),
            success,
            output: output.to_string(),
            error: (!success).then(|| "boom".to_string()),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_planning_prompt_keeps_json_braces() {
        let prompt = build_planning_prompt(PLANNING_TEMPLATE, "add 2 and 3");
        assert!(prompt.contains("Task: add 2 and 3"));
        assert!(prompt.contains("\"subtasks\""));
        assert!(!prompt.contains("{query}"));
    }

    #[test]
    fn test_synthesis_prompt_markers() {
        let results = vec![result("task_1", true, "five"), result("task_2", false, "")];
        let prompt = build_synthesis_prompt(SYNTHESIS_TEMPLATE, "q", &results);
        assert!(prompt.contains("Original Task: q"));
        assert!(prompt.contains("[✓] task_1: five\n\n"));
        assert!(prompt.contains("[✗] task_2: boom\n\n"));
    }

    #[test]
    fn test_task_input_without_dependencies() {
        let completed = BTreeMap::new();
        assert_eq!(build_task_input("do it", &[], &completed), "do it");
    }

    #[test]
    fn test_task_input_truncates_and_skips_failures() {
        let mut completed = BTreeMap::new();
        completed.insert("a".to_string(), result("a", true, &"x".repeat(500)));
        completed.insert("b".to_string(), result("b", false, "partial"));
        let deps = vec!["a".to_string(), "b".to_string(), "missing".to_string()];

        let input = build_task_input("next", &deps, &completed);
        assert!(input.starts_with("next\n\nContext from previous tasks:\n- a: "));
        let line = input.lines().find(|l| l.starts_with("- a: ")).unwrap_or_default();
        assert_eq!(line.chars().count(), "- a: ".len() + DEPENDENCY_EXCERPT_LEN);
        assert!(line.ends_with("..."));
        assert!(!input.contains("- b:"));
        assert!(!input.contains("missing"));
    }

    #[test]
    fn test_load_prefers_files_and_falls_back() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(PLANNING_FILENAME), "custom {query}")
            .unwrap_or_else(|_| unreachable!());

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.planning, "custom {query}");
        assert_eq!(prompts.orchestrator, ORCHESTRATOR_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(SYNTHESIS_FILENAME), "mine")
            .unwrap_or_else(|_| unreachable!());

        let written = PromptSet::write_defaults(dir.path()).unwrap_or_default();
        assert_eq!(written.len(), 4);
        let kept = std::fs::read_to_string(dir.path().join(SYNTHESIS_FILENAME)).unwrap_or_default();
        assert_eq!(kept, "mine");
        assert_eq!(PromptSet::load(Some(dir.path())).planning, PLANNING_TEMPLATE);
    }
}
