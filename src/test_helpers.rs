//! Shared test utilities for the lesson-build test suite.
//!
//! Provides filesystem fixture builders (lesson repositories, templates,
//! assets), stock model values, and lookup helpers over build results.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let config = setup_site(tmp.path());
//! write_term(&tmp.path().join("repo"), "term1", "scratch", 1, "en-GB", &[("Ghostbusters", 1)]);
//!
//! let summary = build(...).unwrap();
//! assert_eq!(find_language(&summary, "en-GB").projects, 1);
//! ```

use crate::config::BuildConfig;
use crate::model::{DEFAULT_LANGUAGE, DeclaredTerm, Language, Project, Term, Theme};
use crate::pipeline::{BuildSummary, LanguageSummary};
use crate::render::{Adapter, Renderer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// =========================================================================
// Files
// =========================================================================

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// Manifest JSON for a term whose projects are `{name}/{name}.md`.
pub fn manifest_json(id: &str, number: u32, language: &str, projects: &[(&str, u32)]) -> String {
    let projects: Vec<serde_json::Value> = projects
        .iter()
        .map(|(name, n)| {
            serde_json::json!({
                "filename": format!("{name}/{name}.md"),
                "number": n,
                "title": name,
            })
        })
        .collect();
    serde_json::json!({
        "id": id,
        "title": format!("{id} {number}"),
        "description": "",
        "language": language,
        "number": number,
        "projects": projects,
    })
    .to_string()
}

/// Write a term into `repo/dir`: one markdown lesson per project plus the
/// manifest. Returns the manifest path.
pub fn write_term(
    repo: &Path,
    dir: &str,
    id: &str,
    number: u32,
    language: &str,
    projects: &[(&str, u32)],
) -> PathBuf {
    let term_dir = repo.join(dir);
    for (name, _) in projects {
        write_file(&term_dir, &format!("{name}/{name}.md"), &format!("# {name}\n"));
    }
    write_file(
        &term_dir,
        &format!("{id}.manifest"),
        &manifest_json(id, number, language, projects),
    )
}

/// Create templates and assets under `root` and return a config using them.
pub fn setup_site(root: &Path) -> BuildConfig {
    let templates = root.join("templates");
    write_file(&templates, "template.html", "$body$");
    write_file(&templates, "uk_legal.html", "<p>uk legal</p>");
    write_file(&templates, "world_legal.html", "<p>world legal</p>");
    write_file(
        &templates,
        "css/main.css",
        "header { background: $header_bg_dark; color: ${header_text}; }\n",
    );
    write_file(&templates, "css/fonts.txt", "not a stylesheet");

    let assets = root.join("assets");
    write_file(&assets, "fonts/lesson.woff", "font");
    write_file(&assets, "img/ccuk_logo.svg", "<svg/>");

    BuildConfig {
        templates_dir: templates,
        assets_dir: assets,
        ..BuildConfig::default()
    }
}

// =========================================================================
// Model values
// =========================================================================

/// A project at `path` with nothing but a number.
pub fn project_at(path: &Path, number: u32) -> Project {
    Project {
        filename: path.to_path_buf(),
        number,
        title: None,
        materials: vec![],
        note: None,
        embeds: vec![],
    }
}

pub fn declared_term(id: &str, number: u32, language: &str, projects: Vec<Project>) -> DeclaredTerm {
    Term {
        id: id.to_string(),
        title: format!("{id} {number}"),
        description: String::new(),
        language: language.to_string(),
        number,
        projects,
        extras: vec![],
    }
}

pub fn test_theme() -> Theme {
    Theme {
        id: "uk".to_string(),
        name: "Code Club".to_string(),
        language: DEFAULT_LANGUAGE.to_string(),
        legal: "<p>uk legal</p>".to_string(),
        stylesheets: vec!["/css/theme.css".to_string()],
        logo: "/img/ccuk_logo.svg".to_string(),
        css_variables: BTreeMap::new(),
    }
}

pub fn test_language() -> Language {
    Language {
        name: "English".to_string(),
        ..Language::fallback(DEFAULT_LANGUAGE)
    }
}

pub fn test_adapter<'a>(
    renderer: &'a dyn Renderer,
    theme: &'a Theme,
    language: &'a Language,
    templates_dir: &'a Path,
) -> Adapter<'a> {
    Adapter {
        renderer,
        theme,
        language,
        templates_dir,
    }
}

// =========================================================================
// Lookups
// =========================================================================

/// Find a language in a build summary by code. Panics if not found.
pub fn find_language<'a>(summary: &'a BuildSummary, code: &str) -> &'a LanguageSummary {
    summary
        .languages
        .iter()
        .find(|l| l.code == code)
        .unwrap_or_else(|| panic!("language '{code}' not in summary"))
}

/// Language codes in summary (root index) order.
pub fn language_codes(summary: &BuildSummary) -> Vec<&str> {
    summary.languages.iter().map(|l| l.code.as_str()).collect()
}
