use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{HistoryEntry, JudgeEvaluation};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Ja"
    } else {
        "Nein"
    }
}

fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `18.10.2026, 14:03:27` in UTC; unparseable timestamps are shown as stored.
pub fn display_date(timestamp: &str) -> String {
    match parse_timestamp(timestamp) {
        Some(dt) => dt.format("%d.%m.%Y, %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

fn bullet_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("- Keine\n");
        return;
    }
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

fn judge_section(out: &mut String, judge: &JudgeEvaluation) {
    out.push_str("\n## Qualitätsbewertung (Judge)\n\n");
    let _ = writeln!(out, "**Score:** {}", judge.score_label());
    let _ = writeln!(out, "**Framework Fit:** {}", judge.framework_fit);
    let _ = writeln!(
        out,
        "**Ease of Use realistisch:** {}",
        yes_no(judge.ease_of_use_realistic)
    );
    out.push_str("\n### Stärken\n\n");
    bullet_list(out, &judge.strengths);
    out.push_str("\n### Schwächen\n\n");
    bullet_list(out, &judge.weaknesses);
    out.push_str("\n### Verbesserungsvorschläge\n\n");
    bullet_list(out, &judge.improvement_suggestions);
}

pub fn entry_to_markdown(entry: &HistoryEntry) -> String {
    let r = &entry.recommendation;
    let input = &entry.form_input;
    let mut out = String::new();

    let _ = writeln!(out, "# Framework-Empfehlung: {}\n", r.framework);
    let _ = writeln!(out, "**Datum:** {}", display_date(&entry.timestamp));
    let _ = writeln!(out, "**Ease of Use:** {}", r.ease_of_use);
    let _ = writeln!(out, "**KI notwendig:** {}", yes_no(r.ki_notwendig));
    if let Some(judge) = &entry.judge_evaluation {
        let _ = writeln!(out, "**Judge-Score:** {}", judge.score_label());
    }

    let _ = write!(out, "\n## Zusammenfassung\n\n{}\n", r.summary);
    let _ = write!(out, "\n## Begründung\n\n{}\n", r.reasoning);
    if let Some(alt) = r.alternative() {
        let _ = write!(out, "\n## Alternative ohne KI\n\n{}\n", alt);
    }

    out.push_str("\n## Use Case (Eingabe)\n\n");
    let _ = writeln!(out, "**Beschreibung:** {}\n", input.use_case_description);
    let _ = writeln!(out, "**Bevorzugtes LLM:** {}\n", input.preferred_model_ecosystem);
    let _ = writeln!(out, "**Interaktionskanal:** {}\n", input.interaction_channel);
    let targets = if input.integration_targets.trim().is_empty() {
        "–"
    } else {
        input.integration_targets.as_str()
    };
    let _ = writeln!(out, "**Integration Targets:** {}", targets);

    if let Some(judge) = &entry.judge_evaluation {
        judge_section(&mut out, judge);
    }

    out
}

pub fn entry_to_clipboard_text(entry: &HistoryEntry) -> String {
    let r = &entry.recommendation;
    let mut out = String::new();

    let _ = writeln!(out, "Framework-Empfehlung: {}", r.framework);
    let _ = writeln!(out, "Ease of Use: {}", r.ease_of_use);
    let _ = writeln!(out, "KI notwendig: {}", yes_no(r.ki_notwendig));
    if let Some(judge) = &entry.judge_evaluation {
        let _ = writeln!(out, "Judge-Score: {}", judge.score_label());
    }
    let _ = write!(out, "\n{}\n\nBegründung: {}", r.summary, r.reasoning);
    if let Some(alt) = r.alternative() {
        let _ = write!(out, "\n\nAlternative ohne KI: {}", alt);
    }
    if let Some(judge) = &entry.judge_evaluation {
        let _ = write!(
            out,
            "\n\nStärken: {}\nSchwächen: {}\nVerbesserungsvorschläge: {}",
            one_line(&judge.strengths),
            one_line(&judge.weaknesses),
            one_line(&judge.improvement_suggestions)
        );
    }

    out
}

fn one_line(items: &[String]) -> String {
    if items.is_empty() {
        "Keine".to_string()
    } else {
        items.join("; ")
    }
}

/// `empfehlung-google-adk-2026-10-18.md`
pub fn export_filename(entry: &HistoryEntry) -> String {
    let lowered = entry.recommendation.framework.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lowered, "-");
    let date = match parse_timestamp(&entry.timestamp) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => entry.timestamp.chars().take(10).collect(),
    };
    format!("empfehlung-{}-{}.md", slug, date)
}

/// Write the markdown document into `dir`, returning the file path.
pub fn write_markdown(entry: &HistoryEntry, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating export directory {}", dir.display()))?;
    let path = dir.join(export_filename(entry));
    std::fs::write(&path, entry_to_markdown(entry))
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("exported recommendation to {}", path.display());
    Ok(path)
}
