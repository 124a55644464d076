//! Manifest and front-matter parsing.
//!
//! A manifest is a JSON file declaring one term:
//!
//! ```json
//! {
//!   "id": "scratch",
//!   "title": "Scratch Term 1",
//!   "description": "Introductory Scratch projects",
//!   "language": "en-GB",
//!   "number": 1,
//!   "projects": [
//!     {
//!       "filename": "lessons/Ghostbusters/Ghostbusters.md",
//!       "number": 3,
//!       "materials": ["lessons/Ghostbusters/resources/*"],
//!       "note": "lessons/Ghostbusters/Ghostbusters-notes.md"
//!     }
//!   ],
//!   "extras": [
//!     { "name": "Certificates", "materials": ["extras/certificates/*.pdf"] }
//!   ]
//! }
//! ```
//!
//! Every file reference is a glob relative to the manifest's directory and is
//! expanded while parsing, so a declared term only holds absolute paths to
//! files that exist. `number` fields accept integers or numeric strings.
//!
//! ## Front-matter
//!
//! Markdown lessons can refine their own manifest entry with a YAML block at
//! the top of the file, opened by `---` and closed by `...` or `---`:
//!
//! ```text
//! ---
//! title: Ghostbusters
//! number: 4
//! note: Ghostbusters-notes.md
//! materials: ["resources/*.sb2"]
//! ...
//! ```
//!
//! `title`, `number` and `note` replace the manifest values. `materials` and
//! `embeds` are prepended to the manifest lists. Globs in front-matter are
//! relative to the markdown file. Other keys are left for the renderer.

use crate::model::{DeclaredTerm, Extra, Project, Term, output_name};
use crate::resolve::{self, GlobError};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid {field} {value:?} in {path}")]
    InvalidNumber {
        path: PathBuf,
        field: &'static str,
        value: String,
    },
    #[error("bad file reference in {path}: {source}")]
    Glob { path: PathBuf, source: GlobError },
    #[error("duplicate project number {number} in {path}")]
    DuplicateProject { path: PathBuf, number: u32 },
    #[error("term number {number} already used by another {language} term: {path}")]
    DuplicateTerm {
        path: PathBuf,
        language: String,
        number: u32,
    },
    #[error("{name} would be written twice in the term directory of {path}")]
    OutputClash { path: PathBuf, name: String },
    #[error("front-matter block is never closed in {path}")]
    UnclosedFrontMatter { path: PathBuf },
    #[error("malformed front-matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    id: String,
    title: String,
    description: String,
    language: String,
    number: Number,
    projects: Vec<ProjectEntry>,
    #[serde(default)]
    extras: Vec<ExtraEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    filename: String,
    number: Number,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "nullable_patterns")]
    materials: Patterns,
    #[serde(default, deserialize_with = "nullable_patterns")]
    embeds: Patterns,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtraEntry {
    name: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default, deserialize_with = "nullable_patterns")]
    materials: Patterns,
}

/// Front-matter keys this tool understands.
#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    number: Option<Number>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default, deserialize_with = "nullable_patterns")]
    materials: Patterns,
    #[serde(default, deserialize_with = "nullable_patterns")]
    embeds: Patterns,
}

/// An integer that may also be written as a string (`3` or `"3"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Text(String),
}

impl Number {
    fn to_u32(&self, path: &Path, field: &'static str) -> Result<u32, ManifestError> {
        let parsed = match self {
            Number::Int(n) => u32::try_from(*n).ok(),
            Number::Text(s) => s.trim().parse::<u32>().ok(),
        };
        parsed.ok_or_else(|| ManifestError::InvalidNumber {
            path: path.to_path_buf(),
            field,
            value: match self {
                Number::Int(n) => n.to_string(),
                Number::Text(s) => s.clone(),
            },
        })
    }
}

/// One glob or a list of globs.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Patterns {
    One(String),
    Many(Vec<String>),
}

impl Default for Patterns {
    fn default() -> Self {
        Patterns::Many(Vec::new())
    }
}

/// A key with no value (`materials:`) reads as no patterns.
fn nullable_patterns<'de, D>(deserializer: D) -> Result<Patterns, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Patterns>::deserialize(deserializer)?.unwrap_or_default())
}

impl Patterns {
    fn to_vec(&self) -> Vec<String> {
        match self {
            Patterns::One(p) => vec![p.clone()],
            Patterns::Many(ps) => ps.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Patterns::One(_) => false,
            Patterns::Many(ps) => ps.is_empty(),
        }
    }
}

/// Parse a manifest file into a declared term.
///
/// The path should be absolute: all expanded file references are built from
/// its parent directory.
pub fn parse_manifest(path: &Path) -> Result<DeclaredTerm, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest_str(&content, path)
}

/// Parse manifest JSON as if it had been read from `path`.
pub fn parse_manifest_str(content: &str, path: &Path) -> Result<DeclaredTerm, ManifestError> {
    let manifest: ManifestFile =
        serde_json::from_str(content).map_err(|source| ManifestError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let glob_err = |source| ManifestError::Glob {
        path: path.to_path_buf(),
        source,
    };

    let mut projects = Vec::with_capacity(manifest.projects.len());
    for entry in &manifest.projects {
        let note = match &entry.note {
            Some(pattern) => Some(resolve::expand_one(base_dir, pattern).map_err(glob_err)?),
            None => None,
        };
        projects.push(Project {
            filename: resolve::expand_one(base_dir, &entry.filename).map_err(glob_err)?,
            number: entry.number.to_u32(path, "project number")?,
            title: entry.title.clone(),
            materials: resolve::expand_many(base_dir, &entry.materials.to_vec())
                .map_err(glob_err)?,
            note,
            embeds: resolve::expand_many(base_dir, &entry.embeds.to_vec()).map_err(glob_err)?,
        });
    }
    check_unique_numbers(&projects, path)?;

    let mut extras = Vec::with_capacity(manifest.extras.len());
    for entry in &manifest.extras {
        let note = match &entry.note {
            Some(pattern) => Some(resolve::expand_one(base_dir, pattern).map_err(glob_err)?),
            None => None,
        };
        extras.push(Extra {
            name: entry.name.clone(),
            note,
            materials: resolve::expand_many(base_dir, &entry.materials.to_vec())
                .map_err(glob_err)?,
        });
    }
    check_extra_outputs(&extras, path)?;

    Ok(Term {
        id: manifest.id,
        title: manifest.title,
        description: manifest.description,
        language: manifest.language,
        number: manifest.number.to_u32(path, "term number")?,
        projects,
        extras,
    })
}

/// Every project number must be unique within its term: it names the
/// project's output directory.
pub fn check_unique_numbers(projects: &[Project], path: &Path) -> Result<(), ManifestError> {
    let mut seen = BTreeSet::new();
    for project in projects {
        if !seen.insert(project.number) {
            return Err(ManifestError::DuplicateProject {
                path: path.to_path_buf(),
                number: project.number,
            });
        }
    }
    Ok(())
}

/// Extras share the term directory with the term index: no two extras may
/// use one name, and no extra note may produce the same file as another note
/// or as `index.html`.
pub fn check_extra_outputs(extras: &[Extra], path: &Path) -> Result<(), ManifestError> {
    let clash = |name: String| ManifestError::OutputClash {
        path: path.to_path_buf(),
        name,
    };
    let mut names = BTreeSet::new();
    let mut outputs = BTreeSet::from(["index.html".to_string()]);
    for extra in extras {
        if !names.insert(extra.name.as_str()) {
            return Err(clash(extra.name.clone()));
        }
        if let Some(note) = &extra.note {
            let output = output_name(note);
            if !outputs.insert(output.clone()) {
                return Err(clash(output));
            }
        }
    }
    Ok(())
}

/// Merge a markdown project's front-matter into its manifest declaration.
///
/// Non-markdown projects and markdown files without a header block come back
/// unchanged.
pub fn resolve_project(project: &Project) -> Result<Project, ManifestError> {
    if !project.is_markdown() {
        return Ok(project.clone());
    }
    let path = &project.filename;
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.clone(),
        source,
    })?;
    let Some(header) = front_matter_block(&content, path)? else {
        return Ok(project.clone());
    };
    let front_matter = parse_front_matter(header, path)?;
    apply_front_matter(project, front_matter)
}

fn parse_front_matter(header: &str, path: &Path) -> Result<FrontMatter, ManifestError> {
    if header.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    let parsed: Option<FrontMatter> =
        serde_yaml::from_str(header).map_err(|source| ManifestError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parsed.unwrap_or_default())
}

fn apply_front_matter(project: &Project, header: FrontMatter) -> Result<Project, ManifestError> {
    let path = &project.filename;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let glob_err = |source| ManifestError::Glob {
        path: path.clone(),
        source,
    };

    let number = match &header.number {
        Some(n) => n.to_u32(path, "front-matter number")?,
        None => project.number,
    };
    let note = match &header.note {
        Some(pattern) => Some(resolve::expand_one(base_dir, pattern).map_err(glob_err)?),
        None => project.note.clone(),
    };
    let materials = prepend(&header.materials, base_dir, &project.materials).map_err(glob_err)?;
    let embeds = prepend(&header.embeds, base_dir, &project.embeds).map_err(glob_err)?;

    Ok(Project {
        filename: project.filename.clone(),
        number,
        title: header.title.or_else(|| project.title.clone()),
        materials,
        note,
        embeds,
    })
}

fn prepend(
    patterns: &Patterns,
    base_dir: &Path,
    declared: &[PathBuf],
) -> Result<Vec<PathBuf>, GlobError> {
    if patterns.is_empty() {
        return Ok(declared.to_vec());
    }
    let mut files = resolve::expand_many(base_dir, &patterns.to_vec())?;
    files.extend_from_slice(declared);
    Ok(files)
}

/// Find the YAML header at the top of a markdown document.
///
/// Leading blank lines are skipped; the first other line must be `---`.
/// Returns the text between the sentinels, `None` when there is no block.
fn front_matter_block<'a>(
    content: &'a str,
    path: &Path,
) -> Result<Option<&'a str>, ManifestError> {
    let mut offset = 0;
    let mut lines = content.split_inclusive('\n');

    let opened = loop {
        let Some(line) = lines.next() else {
            break false;
        };
        offset += line.len();
        match line.trim() {
            "" => continue,
            "---" => break true,
            _ => break false,
        }
    };
    if !opened {
        return Ok(None);
    }

    let start = offset;
    for line in lines {
        if matches!(line.trim(), "..." | "---") {
            return Ok(Some(&content[start..offset]));
        }
        offset += line.len();
    }
    Err(ManifestError::UnclosedFrontMatter {
        path: path.to_path_buf(),
    })
}
