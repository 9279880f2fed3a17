//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands are
//! synchronous; async work runs on a runtime created per invocation.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::format_push_string)]

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent::{
    AgentConfig, PromptSet, RunResponse, TaskOrchestrator, ToolRegistry, create_provider,
};
use crate::cli::output::{OutputFormat, format_score};
use crate::cli::parser::{Cli, Commands, PromptCommands, TreeArgs};
use crate::core::truncate;
use crate::embedding::{Document, HashEmbedder};
use crate::error::{Error, Result};
use crate::retrieval::{
    ConcatSummarizer, HierarchicalTree, MemoryStore, RaptorConfig, RaptorStore, SearchResult,
    TreeRoot,
};

/// Preview length for search result content.
const PREVIEW_LEN: usize = 160;

// ==================== Parameter Structs ====================

/// Parameters for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunParams<'a> {
    /// The task or question.
    pub query: &'a str,
    /// Provider name override.
    pub provider: Option<&'a str>,
    /// Concurrency override.
    pub max_workers: Option<usize>,
    /// Planner model override.
    pub planner_model: Option<&'a str>,
    /// Worker model override.
    pub worker_model: Option<&'a str>,
    /// Synthesizer model override.
    pub synthesizer_model: Option<&'a str>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// Show per-subtask details.
    pub verbose: bool,
}

/// Executes the CLI command.
///
/// # Returns
///
/// The text to print on stdout.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run {
            query,
            provider,
            max_workers,
            planner_model,
            worker_model,
            synthesizer_model,
        } => {
            let params = RunParams {
                query,
                provider: provider.as_deref(),
                max_workers: *max_workers,
                planner_model: planner_model.as_deref(),
                worker_model: worker_model.as_deref(),
                synthesizer_model: synthesizer_model.as_deref(),
                prompt_dir: cli.prompt_dir.as_deref(),
                verbose: cli.verbose,
            };
            cmd_run(&params, format)
        }
        Commands::Search {
            query,
            files,
            limit,
            context,
            tree,
        } => cmd_search(query, files, *limit, *context, tree, format),
        Commands::Tree { files, tree } => cmd_tree(files, tree, cli.verbose, format),
        Commands::Prompts(PromptCommands::Init { dir }) => cmd_init_prompts(dir.as_deref(), format),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Command(format!("Failed to create async runtime: {e}")))
}

/// Returns a token that fires on Ctrl-C. Must be called inside a runtime.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}

// ==================== Run Command ====================

fn cmd_run(params: &RunParams<'_>, format: OutputFormat) -> Result<String> {
    let mut builder = AgentConfig::builder();
    if let Some(provider) = params.provider {
        builder = builder.provider(provider);
    }
    if let Some(n) = params.max_workers {
        builder = builder.max_workers(n);
    }
    if let Some(model) = params.planner_model {
        builder = builder.planner_model(model);
    }
    if let Some(model) = params.worker_model {
        builder = builder.worker_model(model);
    }
    if let Some(model) = params.synthesizer_model {
        builder = builder.synthesizer_model(model);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    let config = builder.from_env().build()?;

    let provider = create_provider(&config)?;
    let orchestrator = TaskOrchestrator::new(provider, config)?
        .with_tools(ToolRegistry::with_builtins())
        .with_default_workers()?;

    let rt = runtime()?;
    let response = rt.block_on(async {
        let cancel = ctrl_c_token();
        orchestrator.run(params.query, &cancel).await
    })?;

    match format {
        OutputFormat::Text => Ok(format_run_text(&response, params.verbose)),
        OutputFormat::Json => Ok(format.to_json(&response)),
    }
}

fn format_run_text(response: &RunResponse, verbose: bool) -> String {
    let mut output = response.output.trim_end().to_string();
    let succeeded = response.results.iter().filter(|r| r.success).count();
    let fallback_hint = if response.plan_fallback { " (fallback)" } else { "" };
    output.push_str(&format!(
        "\n\n---\nSubtasks: {succeeded}/{} succeeded{fallback_hint} | Levels: {} | Tokens: {} | Time: {:.1}s\n",
        response.results.len(),
        response.levels.len(),
        response.usage.total_tokens,
        response.elapsed.as_secs_f64()
    ));

    if verbose {
        for result in &response.results {
            let status = if result.success { "ok" } else { "failed" };
            let detail = result
                .error
                .as_deref()
                .map_or_else(|| truncate(&result.output, PREVIEW_LEN), ToString::to_string);
            let _ = writeln!(output, "[{status}] {} ({:.1}s): {detail}", result.id, result.duration.as_secs_f64());
        }
    }
    output
}

// ==================== Retrieval Commands ====================

/// Splits file contents into paragraph documents.
///
/// Paragraphs are separated by blank lines. Ids are `<file name>#<n>`
/// counting from 1; each document records its source path.
///
/// # Errors
///
/// Returns an I/O error if a file cannot be read, and a command error if
/// the files contain no text.
pub fn load_documents(files: &[PathBuf]) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for path in files {
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let normalized = text.replace("\r\n", "\n");
        let paragraphs = normalized
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty());
        for (i, paragraph) in paragraphs.enumerate() {
            docs.push(
                Document::new(format!("{name}#{}", i + 1), paragraph)
                    .with_metadata("source", path.display().to_string())
                    .with_metadata("paragraph", i + 1),
            );
        }
    }

    if docs.is_empty() {
        return Err(Error::Command("input files contain no text".to_string()));
    }
    Ok(docs)
}

fn raptor_config(args: &TreeArgs) -> Result<RaptorConfig> {
    let mut builder = RaptorConfig::builder();
    if let Some(n) = args.max_levels {
        builder = builder.max_levels(n);
    }
    if let Some(n) = args.cluster_size {
        builder = builder.cluster_size(n);
    }
    if let Some(t) = args.threshold {
        builder = builder.similarity_threshold(t);
    }
    if let Some(n) = args.max_children {
        builder = builder.max_children_per_node(n);
    }
    Ok(builder.from_env().build()?)
}

async fn build_store(
    files: &[PathBuf],
    args: &TreeArgs,
    cancel: &CancellationToken,
) -> Result<RaptorStore> {
    let docs = load_documents(files)?;
    let store = RaptorStore::new(
        MemoryStore::new(),
        Arc::new(HashEmbedder::new(args.dimension)?),
        Arc::new(ConcatSummarizer),
        raptor_config(args)?,
    )?;
    debug!(documents = docs.len(), "building tree");
    store.add_texts(docs, cancel).await?;
    Ok(store)
}

fn cmd_search(
    query: &str,
    files: &[PathBuf],
    limit: usize,
    context: bool,
    args: &TreeArgs,
    format: OutputFormat,
) -> Result<String> {
    let rt = runtime()?;
    let results = rt.block_on(async {
        let cancel = ctrl_c_token();
        let store = build_store(files, args, &cancel).await?;
        let results = if context {
            store.search_with_context(query, limit, &cancel).await?
        } else {
            store.search_text(query, limit, &cancel).await?
        };
        Ok::<_, Error>(results)
    })?;

    Ok(format_search_results(query, &results, format))
}

fn format_search_results(query: &str, results: &[SearchResult], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if results.is_empty() {
                return format!("No results for: {query}\n");
            }
            let mut output = format!("Results for: {query}\n\n");
            for (rank, result) in results.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "{:>2}. [{}] {}",
                    rank + 1,
                    format_score(result.score),
                    result.document.id
                );
                let preview = truncate(&result.document.content.replace('\n', " "), PREVIEW_LEN);
                let _ = writeln!(output, "    {preview}");
            }
            output
        }
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.document.id,
                        "score": r.score,
                        "content": r.document.content,
                        "metadata": r.document.metadata,
                    })
                })
                .collect();
            format.to_json(&serde_json::json!({
                "query": query,
                "count": items.len(),
                "results": items,
            }))
        }
    }
}

fn cmd_tree(files: &[PathBuf], args: &TreeArgs, verbose: bool, format: OutputFormat) -> Result<String> {
    let rt = runtime()?;
    let tree = rt.block_on(async {
        let cancel = ctrl_c_token();
        let store = build_store(files, args, &cancel).await?;
        Ok::<_, Error>(store.tree().await)
    })?;

    Ok(format_tree(&tree, verbose, format))
}

fn format_tree(tree: &HierarchicalTree, verbose: bool, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let root = match tree.root() {
                Some(TreeRoot::Node(id)) => tree.node(*id).map_or("-", |n| n.id.as_str()),
                Some(TreeRoot::Aggregate { id, .. }) => id.as_str(),
                None => "-",
            };
            let mut output = format!(
                "Leaves: {}\nHeight: {}\nRoot: {root}\n",
                tree.leaf_count(),
                tree.height()
            );
            for stats in tree.stats() {
                let _ = writeln!(output, "Level {}: {} node(s)", stats.level, stats.nodes);
            }
            if verbose {
                let snapshot = tree.snapshot();
                for (level, nodes) in snapshot.levels.iter().rev() {
                    let _ = writeln!(output, "\n== Level {level} ==");
                    for node in nodes {
                        let _ = writeln!(output, "{}: {}", node.id, node.text.replace('\n', " "));
                        if !node.children.is_empty() {
                            let _ = writeln!(output, "    children: {}", node.children.join(", "));
                        }
                    }
                }
            }
            output
        }
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "leaves": tree.leaf_count(),
            "height": tree.height(),
            "levels": tree.stats(),
            "tree": tree.snapshot(),
        })),
    }
}

// ==================== Prompt Commands ====================

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            Error::Command("Could not determine home directory for default prompt path".to_string())
        })?;

    let written = PromptSet::write_defaults(&target_dir)?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    let _ = writeln!(
                        output,
                        "  {}",
                        path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown")
                    );
                }
                output.push_str("\nEdit these files to customize agent system prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
