use std::io::Write;

use bibcheck_core::pipeline::EntryChanges;
use bibcheck_core::{Diagnostic, FieldChange, ProgressEvent, RunStats, Severity};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Longest field value shown in a change listing before eliding.
const MAX_VALUE_CHARS: usize = 70;

/// Print what was read and which passes will run.
pub fn print_run_header(
    w: &mut dyn Write,
    file_name: &str,
    entries: usize,
    skipped_blocks: usize,
    passes: &[&str],
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Reading {}...", file_name)?;
    writeln!(w, "Found {} entries", entries)?;
    if skipped_blocks > 0 {
        let msg = format!("(Skipped {} unparseable blocks)", skipped_blocks);
        if color.enabled() {
            writeln!(w, "{}", msg.dimmed())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }
    if passes.is_empty() {
        writeln!(w, "Passes: normalize only")?;
    } else {
        writeln!(w, "Passes: {}", passes.join(", "))?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Checking { index, total, key } => {
            writeln!(w, "[{}/{}] Checking: {}", index + 1, total, key)?;
        }
        ProgressEvent::Resolved {
            index,
            total,
            outcome,
            changes,
            ..
        } => {
            let detail = match changes {
                0 => "unchanged".to_string(),
                1 => "1 change".to_string(),
                n => format!("{} changes", n),
            };
            let label = outcome.to_uppercase();
            if color.enabled() {
                let label = match *outcome {
                    "matched" => label.green().to_string(),
                    "no hits" => label.red().to_string(),
                    "normalized" => label.dimmed().to_string(),
                    _ => label.yellow().to_string(),
                };
                writeln!(w, "[{}/{}] -> {} ({})", index + 1, total, label, detail)?;
            } else {
                writeln!(w, "[{}/{}] -> {} ({})", index + 1, total, label, detail)?;
            }
        }
        ProgressEvent::Revised { key, changes } => {
            let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
            writeln!(w, "        revised {}: {}", key, fields.join(", "))?;
        }
        ProgressEvent::Halted { key, .. } => {
            let msg = format!(
                "HALTED at {}: unrecognized entry type (use --suppress-type to continue)",
                key
            );
            if color.enabled() {
                writeln!(w, "{}", msg.red().bold())?;
            } else {
                writeln!(w, "{}", msg)?;
            }
        }
    }
    Ok(())
}

/// Print field-level changes for every entry that changed.
pub fn print_changes(
    w: &mut dyn Write,
    changes: &[EntryChanges],
    color: ColorMode,
) -> std::io::Result<()> {
    if changes.is_empty() {
        return Ok(());
    }
    if color.enabled() {
        writeln!(w, "{}", "=== Changes ===".bold())?;
    } else {
        writeln!(w, "=== Changes ===")?;
    }
    for entry in changes {
        if color.enabled() {
            writeln!(w, "{}", entry.key.bold())?;
        } else {
            writeln!(w, "{}", entry.key)?;
        }
        for change in &entry.changes {
            print_field_change(w, change, color)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

fn print_field_change(w: &mut dyn Write, change: &FieldChange, color: ColorMode) -> std::io::Result<()> {
    let before = change.before.as_deref().map(elide);
    let after = change.after.as_deref().map(elide);
    match (before, after) {
        (None, Some(after)) => {
            if color.enabled() {
                writeln!(w, "  + {} = {}", change.field, after.green())
            } else {
                writeln!(w, "  + {} = {}", change.field, after)
            }
        }
        (Some(before), None) => {
            if color.enabled() {
                writeln!(w, "  - {} = {}", change.field, before.red())
            } else {
                writeln!(w, "  - {} = {}", change.field, before)
            }
        }
        (Some(before), Some(after)) => {
            if color.enabled() {
                writeln!(
                    w,
                    "  ~ {}: {} -> {}",
                    change.field,
                    before.dimmed(),
                    after.green()
                )
            } else {
                writeln!(w, "  ~ {}: {} -> {}", change.field, before, after)
            }
        }
        (None, None) => Ok(()),
    }
}

fn elide(value: &str) -> String {
    if value.chars().count() > MAX_VALUE_CHARS {
        let head: String = value.chars().take(MAX_VALUE_CHARS).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

/// Print every diagnostic once, grouped by entry key in first-seen order.
pub fn print_diagnostics(
    w: &mut dyn Write,
    diagnostics: &[Diagnostic],
    color: ColorMode,
) -> std::io::Result<()> {
    if diagnostics.is_empty() {
        return Ok(());
    }
    if color.enabled() {
        writeln!(w, "{}", "=== Diagnostics ===".bold())?;
    } else {
        writeln!(w, "=== Diagnostics ===")?;
    }

    let mut keys: Vec<&str> = Vec::new();
    for d in diagnostics {
        if !keys.contains(&d.key.as_str()) {
            keys.push(&d.key);
        }
    }

    for key in keys {
        if color.enabled() {
            writeln!(w, "{}", key.bold())?;
        } else {
            writeln!(w, "{}", key)?;
        }
        for d in diagnostics.iter().filter(|d| d.key == key) {
            let tag = format!("[{}]", d.severity);
            if color.enabled() {
                let tag = match d.severity {
                    Severity::Error => tag.red().bold().to_string(),
                    Severity::Warning => tag.yellow().to_string(),
                    Severity::Info => tag.cyan().to_string(),
                };
                writeln!(w, "  {} {}: {}", tag, d.kind.label(), d.message)?;
            } else {
                writeln!(w, "  {} {}: {}", tag, d.kind.label(), d.message)?;
            }
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print the final summary.
pub fn print_summary(
    w: &mut dyn Write,
    stats: &RunStats,
    diagnostics: &[Diagnostic],
    output_name: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    let count = |s: Severity| diagnostics.iter().filter(|d| d.severity == s).count();
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    if color.enabled() {
        writeln!(w, "{}", "=== Summary ===".bold())?;
    } else {
        writeln!(w, "=== Summary ===")?;
    }
    writeln!(w, "  Entries:        {}", stats.total)?;
    writeln!(w, "  Matched:        {}", stats.matched)?;
    writeln!(w, "  No hits:        {}", stats.no_hits)?;
    writeln!(w, "  Manual review:  {}", stats.manual_review)?;
    if stats.lookup_failures > 0 {
        writeln!(w, "  Lookup errors:  {}", stats.lookup_failures)?;
    }
    writeln!(w, "  Changed:        {}", stats.changed)?;
    if stats.revised_fields > 0 {
        writeln!(w, "  Revised fields: {}", stats.revised_fields)?;
    }
    if stats.copied_through > 0 {
        writeln!(w, "  Not checked:    {}", stats.copied_through)?;
    }
    writeln!(w)?;

    if color.enabled() {
        let status = if errors > 0 {
            format!("{} errors", errors).red().bold().to_string()
        } else {
            "no errors".green().to_string()
        };
        writeln!(w, "{}, {} warnings", status, warnings)?;
    } else if errors > 0 {
        writeln!(w, "{} errors, {} warnings", errors, warnings)?;
    } else {
        writeln!(w, "no errors, {} warnings", warnings)?;
    }
    writeln!(w, "Wrote {}", output_name)?;
    Ok(())
}
