//! Rendering of add and gc output.

use colored::Colorize;
use strata_add::AddedObject;
use strata_gc::KeyRemoved;
use tokio::sync::mpsc;

use crate::cli::OutputFormat;

/// Consumes the add output stream and prints one line per record.
pub struct AddReporter {
    format: OutputFormat,
    quiet: bool,
    progress: bool,
}

impl AddReporter {
    pub fn new(format: OutputFormat, quiet: bool, progress: bool) -> Self {
        Self {
            format,
            quiet,
            progress,
        }
    }

    /// The line for `obj`, or `None` if it is not shown.
    pub fn render(&self, obj: &AddedObject) -> anyhow::Result<Option<String>> {
        if obj.is_progress() && (!self.progress || self.quiet) {
            return Ok(None);
        }
        let line = match (self.format, obj) {
            (OutputFormat::Json, _) => serde_json::to_string(obj)?,
            (OutputFormat::Text, AddedObject::Completed { hash, .. }) if self.quiet => hash.to_hex(),
            (OutputFormat::Text, AddedObject::Completed { name, hash }) => {
                format!("{} {} {}", "added".green(), hash.to_hex().yellow(), name)
                    .trim_end()
                    .to_string()
            }
            (OutputFormat::Text, AddedObject::Progress { name, bytes }) => {
                format!("{} {name}: {bytes} bytes", "reading".dimmed())
            }
        };
        Ok(Some(line))
    }

    /// Print every record until the stream closes. Returns the number of
    /// completions seen.
    pub async fn run(&self, mut events: mpsc::Receiver<AddedObject>) -> anyhow::Result<usize> {
        let mut completed = 0;
        while let Some(obj) = events.recv().await {
            if !obj.is_progress() {
                completed += 1;
            }
            if let Some(line) = self.render(&obj)? {
                if obj.is_progress() {
                    eprintln!("{line}");
                } else {
                    println!("{line}");
                }
            }
        }
        Ok(completed)
    }
}

pub fn render_removed(format: OutputFormat, removed: &KeyRemoved) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(removed)?,
        OutputFormat::Text => format!(
            "{} {} ({})",
            "removed".red(),
            removed.key.to_hex(),
            removed.domain
        ),
    })
}
