use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a strings.xml file into one or more languages
    Translate {
        /// Source strings.xml, usually res/values/strings.xml
        #[arg(short, long)]
        input: PathBuf,

        /// Target languages (comma-separated codes, e.g. "es,fr,zh-CN")
        #[arg(short, long)]
        target_langs: String,

        /// Android res directory to write values-<lang>/ into (defaults to the input's)
        #[arg(short, long)]
        res_dir: Option<PathBuf>,

        /// Override the configured source language
        #[arg(short, long)]
        source_lang: Option<String>,

        /// Skip the provider availability check
        #[arg(long)]
        skip_check: bool,
    },

    /// List the entries of a strings.xml file
    Inspect {
        /// strings.xml file to read
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Find source strings.xml files below a project directory
    Scan {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// List supported target languages
    Languages,

    /// Write the default configuration to a file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "droidloc.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
