//! Glob expansion for manifest and front-matter file references.
//!
//! Patterns are relative to a base directory (the manifest's directory, or
//! the markdown file's directory for front-matter). Expansion is eager and
//! only returns existing regular files, sorted by path. The base directory is
//! escaped so that brackets or asterisks in repository paths are taken
//! literally.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlobError {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),
    #[error("failed to read match: {0}")]
    Read(#[from] glob::GlobError),
    #[error("{pattern:?} matched no file in {base}")]
    NoMatch { pattern: String, base: PathBuf },
    #[error("{pattern:?} matched {} files in {base}, expected exactly one", .matches.len())]
    Ambiguous {
        pattern: String,
        base: PathBuf,
        matches: Vec<PathBuf>,
    },
}

/// How many files a reference must expand to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one file, e.g. a project's primary file or a note.
    One,
    /// Any number of files, e.g. materials and embeds.
    Many,
}

/// Expand `patterns` against `base_dir`, enforcing `arity`.
///
/// With [`Arity::One`] each pattern must match exactly one file; with
/// [`Arity::Many`] the matches of all patterns are concatenated in pattern
/// order.
pub fn expand(
    base_dir: &Path,
    patterns: &[String],
    arity: Arity,
) -> Result<Vec<PathBuf>, GlobError> {
    let mut output = Vec::new();
    for pattern in patterns {
        let matches = matching_files(base_dir, pattern)?;
        if arity == Arity::One {
            match matches.len() {
                0 => {
                    return Err(GlobError::NoMatch {
                        pattern: pattern.clone(),
                        base: base_dir.to_path_buf(),
                    });
                }
                1 => {}
                _ => {
                    return Err(GlobError::Ambiguous {
                        pattern: pattern.clone(),
                        base: base_dir.to_path_buf(),
                        matches,
                    });
                }
            }
        }
        output.extend(matches);
    }
    Ok(output)
}

/// Expand a single pattern that must name exactly one file.
pub fn expand_one(base_dir: &Path, pattern: &str) -> Result<PathBuf, GlobError> {
    let mut files = expand(base_dir, &[pattern.to_string()], Arity::One)?;
    // expand() with Arity::One yields exactly one path per pattern
    Ok(files.remove(0))
}

/// Expand a list of patterns, each matching zero or more files.
pub fn expand_many(base_dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, GlobError> {
    expand(base_dir, patterns, Arity::Many)
}

fn matching_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, GlobError> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let base = base_dir
            .to_str()
            .ok_or_else(|| GlobError::NonUtf8(base_dir.to_path_buf()))?;
        format!(
            "{}/{}",
            glob::Pattern::escape(base.trim_end_matches('/')),
            pattern
        )
    };

    let paths = glob::glob(&full).map_err(|source| GlobError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
