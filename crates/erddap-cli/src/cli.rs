//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};

/// Where ERDDAP's Tomcat image reads datasets.xml from
pub const DEFAULT_DATASETS_XML: &str = "/usr/local/tomcat/content/erddap/datasets.xml";

/// ERDDAP deployment - build datasets.xml from datasets.d fragments
#[derive(Parser, Debug)]
#[command(name = "erddap-deploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Path to datasets.xml
    #[arg(long, global = true, env = "ERDDAP_DATASETS_XML", default_value = DEFAULT_DATASETS_XML)]
    pub datasets_xml: String,

    /// Glob expression selecting datasets.d fragments; empty to use datasets.xml
    #[arg(long, global = true, env = "ERDDAP_DATASETS_D", default_value = "datasets.d/*.xml")]
    pub datasets_d: String,

    /// Search for datasets.d fragments recursively
    #[arg(
        long,
        global = true,
        env = "ERDDAP_RECURSIVE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub recursive: bool,

    /// ERDDAP bigParentDirectory
    #[arg(long, global = true, env = "ERDDAP_BIG_PARENT_DIRECTORY", default_value = "/erddapData")]
    pub big_parent_directory: String,

    /// Logging level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, env = "ERDDAP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Save datasets.xml
    ///
    /// Merges ERDDAP_SECRET_<datasetID>_<attribute> environment variables
    /// into the rendered document. The file is left alone when its content
    /// would not change.
    Save {
        /// Output file
        #[arg(short, long, default_value = "{datasets_xml}")]
        output: String,
    },

    /// Sync datasets.xml from a git repo
    ///
    /// Clones the repository when the local path is missing or empty,
    /// checks out the branch, fast-forwards it and rewrites datasets.xml
    /// when any dataset changed.
    Sync {
        /// URL or path of the datasets repository
        #[arg(short = 'r', long)]
        repo: Option<String>,

        /// Branch to sync from
        #[arg(short, long)]
        branch: Option<String>,

        /// Where to clone the repository
        #[arg(
            short = 'p',
            long,
            env = "ERDDAP_DATASETS_REPO_DIR",
            default_value = "erddap-datasets"
        )]
        local_repo_path: PathBuf,

        /// Write a hard flag for every changed dataset
        #[arg(short = 'f', long)]
        hard_flag: bool,

        /// Directory to write hard flags into
        #[arg(long, default_value = "{bigParentDirectory}/erddap/hardFlag")]
        hard_flag_dir: String,
    },

    /// Show what would change in a deployed datasets.xml
    Diff {
        /// Deployed document to compare against
        #[arg(long, default_value = "{datasets_xml}")]
        against: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Also print a unified diff of the rendered documents
        #[arg(long, conflicts_with = "json")]
        patch: bool,
    },
}
