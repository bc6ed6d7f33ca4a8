use clap::{Parser, Subcommand};
use weft::validation::clap_workspace_validator;

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Staged document pipeline engine", long_about = None)]
#[command(version)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    /// Root directory holding the requirement workspaces
    #[arg(long, default_value = ".", global = true)]
    pub root: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize pipeline state for a workspace (idempotent)
    Init {
        /// Workspace name (alphanumeric, dash, underscore only)
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,
    },

    /// Reset pipeline state back to all-pending; documents are kept
    Reset {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,
    },

    /// Print the authoring context for a stage as JSON
    Context {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        /// Stage name (analysis, prd, tech, acceptance, validation)
        stage: String,

        /// Opaque routing metadata (JSON) passed through to the payload
        #[arg(long)]
        routing: Option<String>,
    },

    /// Mark a stage as in progress
    Start {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        stage: String,

        /// Agent identifier recorded on the stage
        #[arg(long, default_value = "")]
        agent: String,
    },

    /// Report a completed stage, verifying its dependency signature
    Complete {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        stage: String,

        /// Read the document from this file instead of stdin
        #[arg(long)]
        file: Option<String>,

        /// Agent identifier recorded on the stage
        #[arg(long, default_value = "")]
        agent: String,

        /// Decision gate policy: strict or lenient
        #[arg(long, default_value = "strict")]
        policy: String,
    },

    /// Record a failed validation verdict
    Fail {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        stage: String,

        /// Failure notes recorded on the stage
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Apply a validation result: issues as JSON, or --pass for zero issues
    Validate {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        /// Read issues (JSON array) from this file instead of stdin
        #[arg(long)]
        file: Option<String>,

        /// Validation passed with zero issues
        #[arg(long)]
        pass: bool,
    },

    /// Reopen a stage and everything after it
    Reopen {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        stage: String,

        /// Reason recorded on the reopened stages
        #[arg(long, default_value = "manual reopen")]
        cause: String,
    },

    /// Show pipeline status with staleness derived on read
    Status {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        /// Persist pending for stale stages before reporting
        #[arg(long)]
        normalize: bool,

        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },

    /// Decision-item operations
    Decisions {
        #[command(subcommand)]
        command: DecisionCommands,
    },

    /// Print a stage document
    Doc {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        stage: String,
    },
}

#[derive(Subcommand)]
pub enum DecisionCommands {
    /// List open decision items
    List {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        /// Restrict to items gating this stage
        #[arg(long)]
        scope: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Add an open decision item
    Add {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        /// The open question
        question: String,

        /// Owning stage; omit for a pipeline-wide item
        #[arg(long)]
        stage: Option<String>,

        /// Priority: high, medium, low
        #[arg(long, default_value = "medium")]
        priority: String,
    },

    /// Resolve a decision item (idempotent)
    Resolve {
        #[arg(value_parser = clap_workspace_validator)]
        workspace: String,

        /// Item id, e.g. D-3
        id: String,

        /// Resolution text
        resolution: String,
    },
}
