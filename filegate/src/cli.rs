use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// FileGate - path containment and content screening for file servers
#[derive(Parser, Debug)]
#[command(name = "filegate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Allowed root directory (repeatable; default: FILEGATE_ALLOWED_ROOTS or cwd)
    #[arg(long = "root", value_name = "DIR", global = true)]
    pub roots: Vec<PathBuf>,

    /// Base directory for relative paths (default: FILEGATE_BASE_DIR or cwd)
    #[arg(long, value_name = "DIR", global = true)]
    pub base: Option<PathBuf>,

    /// YAML file with custom type signatures
    #[arg(long, value_name = "FILE", global = true)]
    pub signatures: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScreenArgs {
    /// Fail on any issue, including warnings and unknown content
    #[arg(long, default_value = "false")]
    pub strict: bool,

    /// Skip the declared-vs-detected extension check
    #[arg(long, default_value = "false")]
    pub no_mismatch: bool,

    /// Skip the executable-content check
    #[arg(long, default_value = "false")]
    pub no_executable: bool,

    /// Skip filename pattern checks
    #[arg(long, default_value = "false")]
    pub no_patterns: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a requested path inside the allowed roots
    Resolve {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Check file names or paths against the sensitive-name policy
    CheckName {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Detect a file's type from its content
    Detect {
        #[arg(value_name = "PATH")]
        path: String,

        /// Output results as structured JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Screen files for disguised executables and spoofed names
    Screen {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,

        #[command(flatten)]
        screen: ScreenArgs,

        /// Only accept these type tags or extensions (repeatable)
        #[arg(long = "allow-type", value_name = "TYPE")]
        allow_types: Vec<String>,

        /// Reuse detection results cached under FILEGATE_CACHE_DIR
        #[arg(long, default_value = "false")]
        cache: bool,

        /// Output results as structured JSON
        #[arg(long, default_value = "false")]
        json: bool,

        /// One line per file
        #[arg(long, default_value = "false")]
        compact: bool,
    },

    /// Screen files and print an aggregate report
    Report {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,

        #[command(flatten)]
        screen: ScreenArgs,

        /// Output the report as structured JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List registered type signatures in match order
    Signatures {
        /// Output as structured JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}
