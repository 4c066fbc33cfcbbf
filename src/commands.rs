//! CLI command definitions
//!
//! Defines the clap commands for the rdb CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::runtime::Phase;

#[derive(Subcommand)]
pub enum Commands {
    /// Show the run state and where execution is paused
    Status,

    /// Print the call stack, innermost unit first
    #[command(alias = "bt")]
    Stack,

    /// Breakpoint management
    #[command(subcommand)]
    Break(BreakCommands),

    /// Resume until the next breakpoint
    #[command(alias = "c")]
    Continue,

    /// Pause at the next unit start, descending into children
    #[command(alias = "s")]
    Into,

    /// Run the current unit to completion
    #[command(alias = "n")]
    Over,

    /// Run until the enclosing unit ends
    #[command(alias = "finish")]
    Return,

    /// Pause after COUNT more unit starts
    Step {
        /// Number of unit starts to run
        #[arg(default_value = "1")]
        count: u32,
    },

    /// Pause at the next transition
    Pause,

    /// Terminate the run
    Abort,

    /// Wait for the run to pause or finish
    Await {
        /// Timeout in seconds (default from config)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Stop the session's control server (the run continues)
    Shutdown,

    /// View host logs
    Logs {
        /// Number of lines to show (default: 50)
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,

        /// Clear the log file
        #[arg(long)]
        clear: bool,
    },

    /// Execute a test scenario defined in a YAML file
    Test {
        /// Path to the YAML test scenario file
        path: PathBuf,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
pub enum BreakCommands {
    /// Break on keywords whose name matches a glob (case-insensitive)
    Add {
        /// Keyword name pattern, e.g. "Get*"
        pattern: String,

        /// Phase to stop at: start or done
        #[arg(long, default_value = "start")]
        phase: Phase,

        /// Breakpoint identifier (generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Break on an ancestor chain, outermost first
    Stack {
        /// Glob per stack entry, e.g. "suite:Login*" "*" "Click"
        #[arg(required = true, num_args = 1..)]
        patterns: Vec<String>,

        /// Phase to stop at: start or done
        #[arg(long, default_value = "start")]
        phase: Phase,

        /// Breakpoint identifier (generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Break on one running unit, by the number shown in 'rdb stack'
    Unit {
        /// Unit number
        node: u64,

        /// Phase to stop at: start, end or done
        #[arg(long, default_value = "end")]
        phase: Phase,

        /// Breakpoint identifier (generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// List all breakpoints
    List,

    /// Remove a breakpoint
    Remove {
        /// Breakpoint ID to remove
        id: Option<String>,

        /// Remove all breakpoints
        #[arg(long)]
        all: bool,
    },

    /// Enable a breakpoint
    Enable {
        /// Breakpoint ID to enable
        id: String,
    },

    /// Disable a breakpoint
    Disable {
        /// Breakpoint ID to disable
        id: String,
    },

    /// Flip a breakpoint on or off
    Toggle {
        /// Breakpoint ID, or pattern text with --pattern
        target: String,

        /// Look the breakpoint up by its pattern instead of its ID
        #[arg(long)]
        pattern: bool,
    },
}
