//! CLI output formatting utilities.
//!
//! Coloured status lines on stderr, the `-u` build summary and JSON
//! reports. Recipe echoes are printed by the library, not here.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use mk_lib::{BuildReport, Outcome};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// The `-u` summary: what the build did and how long it took.
pub fn print_summary(report: &BuildReport, elapsed: Duration) {
  if report.is_success() {
    print_success("mk: build complete");
  } else {
    print_error("mk: build incomplete");
  }
  for (label, value) in summary_stats(report, elapsed) {
    print_stat(label, &value);
  }
}

fn summary_stats(report: &BuildReport, elapsed: Duration) -> Vec<(&'static str, String)> {
  vec![
    ("Jobs", report.jobs_run.to_string()),
    ("Done", report.count(Outcome::Done).to_string()),
    ("Failed", report.count(Outcome::Failed).to_string()),
    ("Skipped", report.count(Outcome::Skipped).to_string()),
    ("Elapsed", format_duration(elapsed)),
  ]
}
