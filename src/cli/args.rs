//! Command line argument parsing

use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Resolve playable stream URLs from a YouTube player response
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Player-response JSON file, or '-' for stdin
    #[arg(value_name = "MANIFEST")]
    pub manifest: String,

    /// Decipher script (file path or http(s) URL) defining deSC and getNToken
    #[arg(short, long, value_name = "PATH|URL")]
    pub script: Option<String>,

    /// Video URL or ID to show as heading
    #[arg(long, value_name = "REF")]
    pub video: Option<String>,

    /// Codec/container filter (e.g. 'MP4', 'vp9', 'Opus')
    #[arg(short, long, value_name = "LABEL")]
    pub filter: Option<String>,

    /// Stream group to show
    #[arg(short, long, value_enum, default_value = "all")]
    pub group: GroupArg,

    /// Pause between resolution attempts (e.g., 1s, 500ms)
    #[arg(long, value_name = "DURATION", default_value = "1s")]
    pub retry_interval: humantime::Duration,

    /// Attempt cap per variant (0 means retry until timeout)
    #[arg(long, default_value = "0")]
    pub max_attempts: u32,

    /// Overall wait for rows to settle (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Print rows as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Which stream tables to render
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum GroupArg {
    /// Combined audio+video streams
    Combined,
    /// Adaptive (split) streams
    Adaptive,
    /// Both tables
    All,
}

impl GroupArg {
    /// Check whether a table of `group` should be shown
    pub fn includes(&self, group: crate::core::StreamGroup) -> bool {
        use crate::core::StreamGroup;
        match self {
            GroupArg::All => true,
            GroupArg::Combined => group == StreamGroup::Combined,
            GroupArg::Adaptive => group == StreamGroup::Adaptive,
        }
    }
}

impl Args {
    /// Get retry interval as Duration
    pub fn retry_interval_duration(&self) -> Duration {
        self.retry_interval.into()
    }

    /// Get overall timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Check if the manifest comes from stdin
    pub fn reads_stdin(&self) -> bool {
        self.manifest == "-"
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            manifest: "-".to_string(),
            script: None,
            video: None,
            filter: None,
            group: GroupArg::All,
            retry_interval: Duration::from_secs(1).into(),
            max_attempts: 0,
            timeout: Duration::from_secs(30).into(),
            json: false,
            verbose: false,
            quiet: false,
        }
    }
}
