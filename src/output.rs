//! CLI output formatting for `build` and `check`.
//!
//! Output is **content-first**: every line leads with what was built (term,
//! project, language) and shows filesystem paths as indented context, so the
//! log reads as an inventory of the site.
//!
//! # Output Format
//!
//! ## Build progress
//!
//! ```text
//! Found manifest: /repos/scratch/term1/scratch.manifest
//! Copied assets → /site
//! English (en-GB, 1 term)
//!     T1 Scratch Term 1 (2 projects)
//!         01 Ghostbusters
//!             Source: /repos/scratch/term1/Ghostbusters/Ghostbusters.md
//!         02 (Rock Band.md)
//!             Source: /repos/scratch/term1/Rock Band/Rock Band.md
//!         Extra: Certificates
//!     Index → /site/en-GB/scratch.1/index.html
//! English: 2 projects → /site/en-GB/index.html
//! Root index → /site/index.html (1 language)
//! ```
//!
//! ## Summary
//!
//! ```text
//! Built 1 language, 1 term, 2 projects
//! 001 English (en-GB): 1 term, 2 projects
//!
//! Failed manifests
//!     /repos/python/term2/python.manifest
//!         bad file reference in ...: "lessons/*.md" matched 2 files ...
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::pipeline::{BuildEvent, BuildSummary, CheckReport, FailedManifest};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 term`, `2 terms`.
fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Format a project line: titled projects show the title, untitled ones the
/// source file name in parens.
///
/// ```text
/// 03 Ghostbusters      // titled
/// 04 (Worksheet.pdf)   // untitled
/// ```
fn project_line(number: u32, title: Option<&str>, source: &Path) -> String {
    match title {
        Some(t) if !t.is_empty() => format!("{:02} {}", number, t),
        _ => format!(
            "{:02} ({})",
            number,
            source
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.display().to_string())
        ),
    }
}

fn format_failures(failed: &[FailedManifest]) -> Vec<String> {
    if failed.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![String::new(), "Failed manifests".to_string()];
    for failure in failed {
        lines.push(format!("{}{}", indent(1), failure.path.display()));
        lines.push(format!("{}{}", indent(2), failure.error));
    }
    lines
}

// ============================================================================
// Build progress
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::ManifestFound { path } => {
            vec![format!("Found manifest: {}", path.display())]
        }
        BuildEvent::ManifestFailed { path, error } => vec![
            format!("Failed: {}", path.display()),
            format!("{}{}", indent(1), error),
        ],
        BuildEvent::AssetsCopied { output } => {
            vec![format!("Copied assets \u{2192} {}", output.display())]
        }
        BuildEvent::LanguageStarted { code, name, terms } => {
            vec![format!("{} ({}, {})", name, code, count(*terms, "term"))]
        }
        BuildEvent::TermStarted {
            title,
            number,
            projects,
        } => vec![format!(
            "{}T{} {} ({})",
            indent(1),
            number,
            title,
            count(*projects, "project")
        )],
        BuildEvent::ProjectBuilt {
            number,
            title,
            source,
        } => vec![
            format!(
                "{}{}",
                indent(2),
                project_line(*number, title.as_deref(), source)
            ),
            format!("{}Source: {}", indent(3), source.display()),
        ],
        BuildEvent::ExtraBuilt { name } => vec![format!("{}Extra: {}", indent(2), name)],
        BuildEvent::TermFinished { index, .. } => {
            vec![format!("{}Index \u{2192} {}", indent(1), index.display())]
        }
        BuildEvent::LanguageFinished {
            name,
            projects,
            index,
        } => vec![format!(
            "{}: {} \u{2192} {}",
            name,
            count(*projects, "project"),
            index.display()
        )],
        BuildEvent::RootIndexWritten { path, languages } => vec![format!(
            "Root index \u{2192} {} ({})",
            path.display(),
            count(*languages, "language")
        )],
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Format the end-of-build summary, languages in root index order.
pub fn format_build_summary(summary: &BuildSummary) -> Vec<String> {
    let terms: usize = summary.languages.iter().map(|l| l.terms).sum();
    let mut lines = vec![format!(
        "Built {}, {}, {}",
        count(summary.languages.len(), "language"),
        count(terms, "term"),
        count(summary.total_projects(), "project")
    )];
    for (i, language) in summary.languages.iter().enumerate() {
        lines.push(format!(
            "{} {} ({}): {}, {}",
            format_index(i + 1),
            language.name,
            language.code,
            count(language.terms, "term"),
            count(language.projects, "project")
        ));
    }
    lines.extend(format_failures(&summary.failed));
    lines
}

/// Format the result of `check`: every valid term with its projects.
pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, group) in report.groups.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            group.code,
            count(group.terms.len(), "term")
        ));
        for loaded in &group.terms {
            let term = &loaded.term;
            lines.push(format!(
                "{}T{} {} ({})",
                indent(1),
                term.number,
                term.title,
                count(term.projects.len(), "project")
            ));
            lines.push(format!("{}Manifest: {}", indent(2), loaded.manifest.display()));

            let mut projects: Vec<_> = term.projects.iter().collect();
            projects.sort_by_key(|p| p.number);
            for project in projects {
                lines.push(format!(
                    "{}{}",
                    indent(2),
                    project_line(project.number, project.title.as_deref(), &project.filename)
                ));
            }
            for extra in &term.extras {
                lines.push(format!("{}Extra: {}", indent(2), extra.name));
            }
        }
    }
    lines.extend(format_failures(&report.failed));
    lines
}

pub fn print_build_summary(summary: &BuildSummary) {
    for line in format_build_summary(summary) {
        println!("{}", line);
    }
}

pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}
