//! Diff command implementation
//!
//! Compares a deployed datasets.xml with what `save` would write, without
//! writing anything. Secret values are masked in every output format.

use std::path::Path;

use colored::Colorize;
use serde_json::json;
use similar::{ChangeTag, TextDiff};

use erddap_registry::{
    DatasetDiff, DiffStatus, Registry, RegistryDiff, Secrets, diff, merge_secrets,
    render_to_string,
};

use crate::context::Context;
use crate::error::Result;

const MASK: &str = "********";

/// Run the diff command
pub fn run_diff(ctx: &Context, against: &str, json: bool, patch: bool) -> Result<()> {
    let against = ctx.expand_path(against)?;
    let deployed = load_deployed(&against)?;
    let (current, _) = ctx.load()?;
    let secrets = ctx.secrets();
    let (current, _) = merge_secrets(&current, &secrets);
    let changes = diff(&deployed, &current);
    let redactor = Redactor::new(&secrets);

    if json {
        let mut datasets = serde_json::Map::new();
        for (id, dataset) in changes.changed() {
            datasets.insert(id.to_string(), serde_json::to_value(dataset)?);
        }
        let mut output = json!({
            "against": against.display().to_string(),
            "has_changes": changes.has_changes(),
            "changed": changes.changed_ids(),
            "datasets": datasets,
            "settings": serde_json::to_value(&changes.settings)?,
        });
        redactor.redact_json(&mut output);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut lines = diff_lines(&changes, &against);
    if patch && changes.has_changes() {
        lines.push(String::new());
        lines.extend(patch_lines(
            &render_to_string(&deployed)?,
            &render_to_string(&current)?,
        ));
    }
    for line in lines {
        println!("{}", redactor.redact(&line));
    }
    Ok(())
}

/// A missing deployed document compares as an empty registry.
fn load_deployed(path: &Path) -> Result<Registry> {
    if path.is_file() {
        Ok(Registry::load_file(path)?)
    } else {
        tracing::info!(path = %path.display(), "No deployed datasets.xml, comparing against nothing");
        Ok(Registry::new())
    }
}

/// Replaces secret values with a fixed mask.
struct Redactor {
    values: Vec<String>,
}

impl Redactor {
    fn new(secrets: &Secrets) -> Self {
        let mut values: Vec<String> = secrets
            .values()
            .filter(|value| !value.is_empty())
            .cloned()
            .collect();
        // Longest first so a secret containing another is masked whole
        values.sort_by_key(|value| std::cmp::Reverse(value.len()));
        Self { values }
    }

    fn redact(&self, text: &str) -> String {
        self.values
            .iter()
            .fold(text.to_string(), |text, value| text.replace(value.as_str(), MASK))
    }

    fn redact_json(&self, value: &mut serde_json::Value) {
        match value {
            serde_json::Value::String(text) => *text = self.redact(text),
            serde_json::Value::Array(items) => {
                items.iter_mut().for_each(|item| self.redact_json(item))
            }
            serde_json::Value::Object(map) => {
                map.values_mut().for_each(|item| self.redact_json(item))
            }
            _ => {}
        }
    }
}

fn diff_lines(changes: &RegistryDiff, against: &Path) -> Vec<String> {
    let against = against.display().to_string();
    if !changes.has_changes() {
        return vec![format!(
            "{} {} matches the configured datasets.",
            "OK".green().bold(),
            against.yellow()
        )];
    }

    let mut lines = vec![
        format!("{} {}", "Diff".blue().bold(), against.yellow()),
        String::new(),
    ];

    for (id, diff) in changes.changed() {
        match diff.status {
            DiffStatus::Added => lines.push(format!("  {} {}", "+".green(), id.green())),
            DiffStatus::Removed => lines.push(format!("  {} {}", "-".red(), id.red())),
            DiffStatus::Modified | DiffStatus::Unchanged => {
                lines.push(format!("  {} {}", "~".yellow(), id.yellow()));
                lines.extend(attribute_lines(diff));
            }
        }
    }

    let settings = &changes.settings;
    if !settings.is_empty() {
        lines.push(String::new());
        lines.push("Settings:".bold().to_string());
        for name in settings.added.keys() {
            lines.push(format!("    {} {}", "+".green(), name));
        }
        for name in settings.removed.keys() {
            lines.push(format!("    {} {}", "-".red(), name));
        }
        for (name, change) in &settings.modified {
            lines.push(format!(
                "    {} {}: {} -> {}",
                "~".yellow(),
                name,
                change.old,
                change.new
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Run {} to apply these changes.",
        "erddap-deploy save".cyan()
    ));
    lines
}

fn attribute_lines(diff: &DatasetDiff) -> Vec<String> {
    let mut lines = Vec::new();
    for (name, value) in diff.added_attributes() {
        lines.push(format!("      {} {} = {}", "+".green(), name, value));
    }
    for name in diff.removed_attributes().keys() {
        lines.push(format!("      {} {}", "-".red(), name));
    }
    for (name, change) in diff.modified_attributes() {
        lines.push(format!(
            "      {} {}: {} -> {}",
            "~".yellow(),
            name,
            change.old,
            change.new
        ));
    }
    lines
}

fn patch_lines(old: &str, new: &str) -> Vec<String> {
    let text_diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();
    for hunk in text_diff.unified_diff().context_radius(2).iter_hunks() {
        lines.push(hunk.header().to_string().cyan().to_string());
        for change in hunk.iter_changes() {
            let text = change.to_string_lossy();
            let text = text.trim_end_matches('\n');
            lines.push(match change.tag() {
                ChangeTag::Delete => format!("-{text}").red().to_string(),
                ChangeTag::Insert => format!("+{text}").green().to_string(),
                ChangeTag::Equal => format!(" {text}"),
            });
        }
    }
    lines
}
