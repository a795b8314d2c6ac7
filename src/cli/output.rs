//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::manifest::VideoDetails;
use crate::present::table::{LinkState, RowView, TableView};
use crate::utils::units::format_duration;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Output formatter for fmturl
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    json: bool,
    spinner: Option<ProgressBar>,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            json: false,
            spinner: None,
        }
    }

    /// Reserve stdout for the JSON document
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Check if human-readable lines go to stdout
    fn prints_human(&self) -> bool {
        self.verbosity != VerbosityLevel::Quiet && !self.json
    }

    /// Start the "resolving" spinner
    pub fn start_spinner(&mut self, total_rows: usize) -> Option<ProgressBar> {
        if self.verbosity == VerbosityLevel::Quiet {
            return None;
        }

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} rows settled {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let spinner = ProgressBar::new(total_rows as u64);
        spinner.set_style(style);
        spinner.set_message("Resolving...");
        spinner.enable_steady_tick(Duration::from_millis(120));

        self.spinner = Some(spinner.clone());
        Some(spinner)
    }

    /// Update spinner from the latest render
    pub fn update_spinner(&self, tables: &[TableView]) {
        if let Some(spinner) = &self.spinner {
            let (settled, total) = settled_counts(tables);
            spinner.set_length(total as u64);
            spinner.set_position(settled as u64);
        }
    }

    /// Finish spinner
    pub fn finish_spinner(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message.to_string());
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.prints_human() {
            println!("✅ {}", message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("⚠️  {}", message);
        }
    }

    /// Print the heading for a pasted video reference
    pub fn print_video_id(&self, video_id: &str) {
        if !self.prints_human() {
            return;
        }
        println!("🔗 {}", video_id.bold());
    }

    /// Print video details
    pub fn print_video_details(&self, details: &VideoDetails) {
        if !self.prints_human() {
            return;
        }

        println!("📹 {}", details.title.bold());
        println!("👤 {}", details.author);
        if let Some(seconds) = details
            .length_seconds
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
        {
            println!("⏱️  {}", format_duration(Duration::from_secs(seconds)));
        }
        println!();
    }

    /// Print the "no playable streams" notice
    pub fn print_no_streams(&self) {
        self.warning("No playable streams in this manifest");
    }

    /// Print one stream table
    pub fn print_table(&self, table: &TableView) {
        match table.filter {
            Some(filter) => println!("{} [{}]", table.title.bold(), filter.cyan()),
            None => println!("{}", table.title.bold()),
        }

        if table.rows.is_empty() {
            println!("  (no streams match)");
        }
        for row in &table.rows {
            println!("  {}", format_row(row));
        }
        println!();
    }

    /// Print the final tables: one JSON document in JSON mode, text otherwise
    pub fn print_tables(&self, tables: &[TableView]) -> serde_json::Result<()> {
        if self.json {
            println!("{}", render_json(tables)?);
        } else {
            tables.iter().for_each(|table| self.print_table(table));
        }
        Ok(())
    }
}

/// Serialize tables as pretty JSON
pub fn render_json(tables: &[TableView]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(tables)
}

/// Format one row as a single line
pub fn format_row(row: &RowView) -> String {
    let link = match &row.link {
        LinkState::Pending => "…".dimmed().to_string(),
        LinkState::Resolved(url) => url.green().to_string(),
        LinkState::Failed(reason) => format!("failed: {}", reason).red().to_string(),
    };
    format!(
        "{:>4} | {}{} | {} | {} | {} | {}",
        row.itag,
        row.mime_kind.bold(),
        row.mime_rest,
        row.quality,
        row.bitrate,
        row.size,
        link
    )
}

/// Count settled and total rows across tables
pub fn settled_counts(tables: &[TableView]) -> (usize, usize) {
    tables.iter().fold((0, 0), |(settled, total), table| {
        let done = table.rows.iter().filter(|r| r.link.is_settled()).count();
        (settled + done, total + table.rows.len())
    })
}
