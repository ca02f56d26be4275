//! # Canvas Doc CLI
//!
//! Command-line front end for `canvas-document`.
//!
//! Every subcommand reads JSON files and writes canonical JSON:
//!
//! - `canonicalize <doc>`
//! - `validate <doc>`
//! - `patch <doc> <patches> [--reverse]`
//! - `diff <from> <to> [--max-operations N]`
//! - `merge <base> <local> <remote> [--strategy ...]`
//! - `hit-test <doc> --x X --y Y [--include-invisible] [--artboard N]`
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `CliConfig` - Resolved configuration handed to [`run`]
//! - [`Report`] - Output text plus whether the command succeeded

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use canvas_document::canonical;
use canvas_document::patch::parse_patches;
use canvas_document::{
    apply_patches, apply_patches_with_reverse, diff_documents, hit_test, merge_documents,
    CanvasDocument, DiffOptions, Hit, HitTestOptions, MergeOptions, Point, ResolutionStrategy,
    ResolverPipeline, Validator, ValidatorConfig,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

/// Command-line arguments for canvas-doc.
#[derive(Debug, Clone, Parser)]
#[command(name = "canvas-doc")]
#[command(about = "Inspect, edit and merge canvas documents")]
#[command(version)]
pub struct CliArgs {
    /// Maximum number of nodes accepted by the validator
    #[arg(long, global = true, env = "CANVAS_MAX_NODES")]
    pub max_nodes: Option<usize>,

    /// Maximum nesting depth accepted by the validator
    #[arg(long, global = true, env = "CANVAS_MAX_DEPTH")]
    pub max_depth: Option<usize>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print a document in canonical form
    Canonicalize {
        /// Document file
        doc: PathBuf,
    },
    /// Check a document and list every problem
    Validate {
        /// Document file
        doc: PathBuf,
    },
    /// Apply a patch sequence atomically
    Patch {
        /// Document file
        doc: PathBuf,
        /// File holding one patch or an array of patches
        patches: PathBuf,
        /// Also print the reverse patches
        #[arg(long)]
        reverse: bool,
    },
    /// Compare two documents
    Diff {
        /// Old document
        from: PathBuf,
        /// New document
        to: PathBuf,
        /// Cap on reported operations
        #[arg(long)]
        max_operations: Option<usize>,
    },
    /// Three-way merge
    Merge {
        /// Common ancestor
        base: PathBuf,
        /// Our version
        local: PathBuf,
        /// Their version
        remote: PathBuf,
        /// How conflicts are resolved
        #[arg(long, value_enum, default_value_t = StrategyArg::Manual)]
        strategy: StrategyArg,
    },
    /// Find the topmost node under a point
    HitTest {
        /// Document file
        doc: PathBuf,
        /// X coordinate in document space
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
        /// Y coordinate in document space
        #[arg(long, allow_negative_numbers = true)]
        y: f64,
        /// Consider invisible nodes too
        #[arg(long)]
        include_invisible: bool,
        /// Restrict to one artboard
        #[arg(long)]
        artboard: Option<usize>,
    },
}

/// Conflict resolution strategies selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Keep our value
    PreferLocal,
    /// Take their value
    PreferRemote,
    /// Leave every conflict for review
    Manual,
    /// Apply each conflict's suggested strategy
    Auto,
    /// Average numeric values
    Average,
}

impl From<StrategyArg> for ResolutionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::PreferLocal => Self::PreferLocal,
            StrategyArg::PreferRemote => Self::PreferRemote,
            StrategyArg::Manual => Self::Manual,
            StrategyArg::Auto => Self::AutoResolve,
            StrategyArg::Average => Self::Average,
        }
    }
}

/// Resolved CLI configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Validator limits.
    pub validator: ValidatorConfig,
    /// Subcommand to run.
    pub command: Command,
}

impl From<CliArgs> for CliConfig {
    fn from(args: CliArgs) -> Self {
        let mut validator = ValidatorConfig::default();
        if let Some(max_nodes) = args.max_nodes {
            validator.max_nodes = max_nodes;
        }
        if let Some(max_depth) = args.max_depth {
            validator.max_depth = max_depth;
        }
        Self {
            validator,
            command: args.command,
        }
    }
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Canonical JSON written to stdout.
    pub output: String,
    /// `false` makes the process exit with status 1.
    pub success: bool,
}

impl Report {
    fn ok(output: String) -> Self {
        Self {
            output,
            success: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HitReport {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    path: String,
    artboard_index: usize,
    depth: usize,
}

impl From<Hit<'_>> for HitReport {
    fn from(hit: Hit<'_>) -> Self {
        Self {
            id: hit.node.id().to_string(),
            name: hit.node.name().to_string(),
            kind: hit.node.kind().as_str(),
            path: hit.path,
            artboard_index: hit.artboard_index,
            depth: hit.depth,
        }
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_document(path: &Path) -> anyhow::Result<CanvasDocument> {
    let text = read_text(path)?;
    canonical::parse(&text).with_context(|| format!("Invalid document {}", path.display()))
}

/// Run one command.
///
/// # Errors
///
/// Returns an error if an input cannot be read or parsed, or if the
/// operation itself fails (rejected patch, unusable resolution).
pub fn run(config: &CliConfig) -> anyhow::Result<Report> {
    match &config.command {
        Command::Canonicalize { doc } => {
            let document = read_document(doc)?;
            Ok(Report::ok(canonical::serialize(&document)?))
        }
        Command::Validate { doc } => validate(doc, config.validator),
        Command::Patch {
            doc,
            patches,
            reverse,
        } => patch(doc, patches, *reverse),
        Command::Diff {
            from,
            to,
            max_operations,
        } => diff(from, to, *max_operations),
        Command::Merge {
            base,
            local,
            remote,
            strategy,
        } => merge(base, local, remote, (*strategy).into()),
        Command::HitTest {
            doc,
            x,
            y,
            include_invisible,
            artboard,
        } => {
            let mut options = HitTestOptions::default().with_include_invisible(*include_invisible);
            if let Some(index) = *artboard {
                options = options.with_artboard_index(index);
            }
            locate(doc, Point::new(*x, *y), &options)
        }
    }
}

fn validate(doc: &Path, limits: ValidatorConfig) -> anyhow::Result<Report> {
    let text = read_text(doc)?;
    let result = Validator::new(limits).validate_str(&text);
    tracing::info!(valid = result.valid, errors = result.errors.len(), "validated");
    let output = canonical::serialize_value(&serde_json::json!({
        "valid": result.valid,
        "errors": result.errors,
    }))?;
    Ok(Report {
        output,
        success: result.valid,
    })
}

fn patch(doc: &Path, patches: &Path, reverse: bool) -> anyhow::Result<Report> {
    let document = read_document(doc)?;
    let sequence = parse_patches(&read_text(patches)?)
        .with_context(|| format!("Invalid patches {}", patches.display()))?;
    let output = if reverse {
        let outcome =
            apply_patches_with_reverse(&document, &sequence).context("Patch sequence rejected")?;
        canonical::serialize_value(&outcome)?
    } else {
        let patched = apply_patches(&document, &sequence).context("Patch sequence rejected")?;
        canonical::serialize(&patched)?
    };
    Ok(Report::ok(output))
}

fn diff(from: &Path, to: &Path, max_operations: Option<usize>) -> anyhow::Result<Report> {
    let (from, to) = (read_document(from)?, read_document(to)?);
    let mut options = DiffOptions::default();
    if let Some(max) = max_operations {
        options = options.with_max_operations(max);
    }
    let result = diff_documents(&from, &to, &options);
    tracing::info!(
        operations = result.summary.total,
        truncated = result.truncated,
        "diffed"
    );
    Ok(Report::ok(canonical::serialize_value(&result)?))
}

fn merge(
    base: &Path,
    local: &Path,
    remote: &Path,
    strategy: ResolutionStrategy,
) -> anyhow::Result<Report> {
    let base = read_document(base)?;
    let local = read_document(local)?;
    let remote = read_document(remote)?;
    let pipeline = ResolverPipeline::for_strategy(strategy);
    let outcome = merge_documents(&base, &local, &remote, &MergeOptions::default(), &pipeline)
        .context("Merge failed")?;
    tracing::info!(
        conflicts = outcome.conflicts.len(),
        unresolved = outcome.unresolved.len(),
        review = outcome.needs_review(),
        strategy = strategy.as_str(),
        "merged"
    );
    Ok(Report::ok(canonical::serialize_value(&outcome)?))
}

fn locate(doc: &Path, point: Point, options: &HitTestOptions) -> anyhow::Result<Report> {
    let document = read_document(doc)?;
    let hit = hit_test(&document, point, options).map(HitReport::from);
    let output = canonical::serialize_value(&serde_json::json!({ "hit": hit }))?;
    Ok(Report::ok(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_to_config() {
        let args = CliArgs::parse_from(["canvas-doc", "--max-nodes", "5", "validate", "doc.json"]);
        let config = CliConfig::from(args);
        assert_eq!(config.validator.max_nodes, 5);
        assert_eq!(config.validator.max_depth, ValidatorConfig::default().max_depth);
        assert_eq!(
            config.command,
            Command::Validate {
                doc: PathBuf::from("doc.json")
            }
        );
    }

    #[test]
    fn test_merge_strategy_parsing() {
        let args = CliArgs::parse_from([
            "canvas-doc",
            "merge",
            "a.json",
            "b.json",
            "c.json",
            "--strategy",
            "prefer-remote",
        ]);
        match args.command {
            Command::Merge { strategy, .. } => {
                assert_eq!(
                    ResolutionStrategy::from(strategy),
                    ResolutionStrategy::PreferRemote
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_hit_test_accepts_negative_coordinates() {
        let args = CliArgs::parse_from(["canvas-doc", "hit-test", "d.json", "--x", "-10", "--y", "4"]);
        assert!(matches!(args.command, Command::HitTest { x, .. } if (x + 10.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let config = CliConfig {
            validator: ValidatorConfig::default(),
            command: Command::Canonicalize {
                doc: PathBuf::from("/definitely/not/here.json"),
            },
        };
        let err = run(&config).expect_err("missing file");
        assert!(err.to_string().contains("Failed to read"));
    }
}
