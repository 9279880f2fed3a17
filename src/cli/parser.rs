//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::embedding::DEFAULT_HASH_DIMENSION;
use crate::retrieval::DEFAULT_SEARCH_LIMIT;

/// agentree: multi-agent orchestration and hierarchical retrieval.
///
/// Runs planner/worker/synthesizer pipelines against an LLM provider and
/// builds RAPTOR summary trees over local text files.
#[derive(Parser, Debug)]
#[command(name = "agentree")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Directory containing prompt template files.
    #[arg(long, global = true, env = "AGENTREE_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan, execute, and synthesize a task with the configured provider.
    #[command(after_help = r#"Examples:
  agentree run "Compare tokio and async-std"
  agentree run "What is 17 * 23?" --max-workers 2
  agentree --format json run "Summarize RAPTOR" | jq '.results'
"#)]
    Run {
        /// The task or question.
        query: String,

        /// LLM provider name.
        #[arg(long)]
        provider: Option<String>,

        /// Maximum subtasks executing at once.
        #[arg(long)]
        max_workers: Option<usize>,

        /// Model for the planning call.
        #[arg(long)]
        planner_model: Option<String>,

        /// Model for worker calls.
        #[arg(long)]
        worker_model: Option<String>,

        /// Model for the synthesis call.
        #[arg(long)]
        synthesizer_model: Option<String>,
    },

    /// Build a tree over text files and search it.
    ///
    /// Each blank-line separated paragraph becomes one document, embedded
    /// with the offline hash embedder.
    #[command(after_help = r#"Examples:
  agentree search "error handling" --file notes.md
  agentree search "ownership" -f a.txt -f b.txt -k 3 --context
"#)]
    Search {
        /// Search query text.
        query: String,

        /// Input files.
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Maximum number of results.
        #[arg(short = 'k', long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,

        /// Add parent summaries as context entries.
        #[arg(long)]
        context: bool,

        /// Tree options.
        #[command(flatten)]
        tree: TreeArgs,
    },

    /// Build a tree over text files and show its levels.
    Tree {
        /// Input files.
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Tree options.
        #[command(flatten)]
        tree: TreeArgs,
    },

    /// Prompt template operations.
    #[command(subcommand)]
    Prompts(PromptCommands),
}

impl Commands {
    /// Short name used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Search { .. } => "search",
            Self::Tree { .. } => "tree",
            Self::Prompts(_) => "prompts",
        }
    }
}

/// Tree construction options shared by `search` and `tree`.
#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Maximum summary levels above the leaves.
    #[arg(long)]
    pub max_levels: Option<usize>,

    /// Target number of nodes per cluster.
    #[arg(long)]
    pub cluster_size: Option<usize>,

    /// Similarity threshold for clustering and descent (0.0-1.0].
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Maximum children per summary node.
    #[arg(long)]
    pub max_children: Option<usize>,

    /// Hash embedding dimension.
    #[arg(long, default_value_t = DEFAULT_HASH_DIMENSION)]
    pub dimension: usize,
}

/// Prompt template subcommands.
#[derive(Subcommand, Debug)]
pub enum PromptCommands {
    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched.
    Init {
        /// Target directory (defaults to ~/.config/agentree/prompts).
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "agentree", "--format", "json", "search", "needle", "-f", "a.txt", "--file", "b.txt",
            "-k", "3", "--context", "--cluster-size", "4",
        ])
        .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Search {
                query,
                files,
                limit,
                context,
                tree,
            } => {
                assert_eq!(query, "needle");
                assert_eq!(files.len(), 2);
                assert_eq!(limit, 3);
                assert!(context);
                assert_eq!(tree.cluster_size, Some(4));
                assert_eq!(tree.dimension, DEFAULT_HASH_DIMENSION);
            }
            other => unreachable!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_search_requires_file() {
        assert!(Cli::try_parse_from(["agentree", "search", "needle"]).is_err());
    }

    #[test]
    fn test_parse_run_and_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["agentree", "run", "task", "--max-workers", "2", "-v"])
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert!(cli.verbose);
        assert_eq!(cli.command.name(), "run");
        assert!(matches!(
            cli.command,
            Commands::Run {
                max_workers: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_prompts_init() {
        let cli = Cli::try_parse_from(["agentree", "prompts", "init", "/tmp/p"])
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Prompts(PromptCommands::Init { dir: Some(_) })
        ));
    }
}
