//! File packaging: material archives, verbatim copies, static assets and
//! theme CSS.
//!
//! Everything here is plain filesystem work. Archives are written in-process
//! with the `zip` crate; entries are stored under their file names with a
//! fixed timestamp so rebuilding unchanged inputs produces identical archives.

use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to write archive {path}: {source}")]
    Zip {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    #[error("stylesheet {path} uses undefined variable ${name}")]
    MissingVariable { path: PathBuf, name: String },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\\/?|;:!#@$%^&*<>, ]").expect("static regex"));

/// `$name`, `${name}` and `$$` placeholders in CSS templates.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\})")
        .expect("static regex")
});

/// Replace every character that is unsafe in a file name with `_`.
pub fn safe_filename(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "_").into_owned()
}

/// Create (or clear and recreate) a directory.
pub fn prepare_dir(path: &Path, clear: bool) -> Result<(), PackageError> {
    if clear && path.exists() {
        fs::remove_dir_all(path).map_err(io_err(path))?;
    }
    fs::create_dir_all(path).map_err(io_err(path))
}

/// Zip `files` into `output_dir/safe_filename(name)`.
///
/// Entries are stored under their file names. When two files share a name,
/// every entry is stored under its path relative to the files' common
/// ancestor instead. A file listed twice is archived once.
///
/// Returns `None` without writing anything when there are no files.
pub fn zip_files(
    files: &[PathBuf],
    output_dir: &Path,
    name: &str,
) -> Result<Option<PathBuf>, PackageError> {
    if files.is_empty() {
        return Ok(None);
    }
    let archive = output_dir.join(safe_filename(name));
    let zip_err = |source| PackageError::Zip {
        path: archive.clone(),
        source,
    };

    let file = File::create(&archive).map_err(io_err(&archive))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut seen = BTreeSet::new();
    let files: Vec<&PathBuf> = files.iter().filter(|p| seen.insert(*p)).collect();
    for (path, entry) in files.iter().zip(entry_names(&files)) {
        writer.start_file(entry, options).map_err(zip_err)?;
        let mut source = File::open(path).map_err(io_err(path))?;
        io::copy(&mut source, &mut writer).map_err(io_err(path))?;
    }
    writer.finish().map_err(zip_err)?.flush().map_err(io_err(&archive))?;

    tracing::debug!("archived {} files into {}", files.len(), archive.display());
    Ok(Some(archive))
}

/// Archive entry names for distinct `files`, `/`-separated.
fn entry_names(files: &[&PathBuf]) -> Vec<String> {
    let basenames: Vec<String> = files
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();
    let unique: BTreeSet<&String> = basenames.iter().collect();
    if unique.len() == basenames.len() {
        return basenames;
    }

    let root = common_ancestor(files);
    files
        .iter()
        .map(|p| {
            p.strip_prefix(&root)
                .unwrap_or(p)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}

fn common_ancestor(files: &[&PathBuf]) -> PathBuf {
    let mut root = files
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    for path in files {
        while !path.starts_with(&root) && root.pop() {}
    }
    root
}

/// Copy a file into `output_dir`, keeping its file name.
pub fn copy_file(input: &Path, output_dir: &Path) -> Result<PathBuf, PackageError> {
    let name = input.file_name().ok_or_else(|| PackageError::Io {
        path: input.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let output = output_dir.join(name);
    fs::copy(input, &output).map_err(io_err(input))?;
    Ok(output)
}

/// Copy asset files and directories into `output_dir`.
///
/// Hidden entries are skipped. An existing destination is removed first so
/// repeated runs never leave stale files behind. Missing sources are skipped
/// with a warning.
pub fn copy_assets(sources: &[PathBuf], output_dir: &Path) -> Result<(), PackageError> {
    fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;
    for src in sources {
        let Some(name) = src.file_name() else {
            continue;
        };
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if !src.exists() {
            tracing::warn!("asset {} does not exist, skipping", src.display());
            continue;
        }
        let dst = output_dir.join(name);
        remove_existing(&dst)?;
        if src.is_dir() {
            copy_dir_recursive(src, &dst)?;
        } else {
            fs::copy(src, &dst).map_err(io_err(src))?;
        }
        tracing::debug!("copied {} -> {}", src.display(), dst.display());
    }
    Ok(())
}

/// Generate theme CSS: every `.css` file under `src_dir` has its
/// placeholders substituted from `variables`; other files are copied
/// verbatim; directories are recreated from scratch.
pub fn make_css(
    src_dir: &Path,
    variables: &BTreeMap<String, String>,
    dst_dir: &Path,
) -> Result<(), PackageError> {
    fs::create_dir_all(dst_dir).map_err(io_err(dst_dir))?;
    let mut entries: Vec<PathBuf> = fs::read_dir(src_dir)
        .map_err(io_err(src_dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| !n.to_string_lossy().starts_with('.'))
        })
        .collect();
    entries.sort();

    for src in entries {
        let Some(name) = src.file_name() else {
            continue;
        };
        let dst = dst_dir.join(name);
        remove_existing(&dst)?;

        if src.is_dir() {
            make_css(&src, variables, &dst)?;
        } else if src.extension().is_some_and(|e| e == "css") {
            let template = fs::read_to_string(&src).map_err(io_err(&src))?;
            let css = substitute(&template, variables, &src)?;
            fs::write(&dst, css).map_err(io_err(&dst))?;
        } else {
            fs::copy(&src, &dst).map_err(io_err(&src))?;
        }
    }
    Ok(())
}

/// Substitute `$name` / `${name}` placeholders; `$$` yields a literal `$`.
///
/// Every referenced variable must be defined. A `$` not followed by a
/// placeholder is left as is.
pub fn substitute(
    template: &str,
    variables: &BTreeMap<String, String>,
    path: &Path,
) -> Result<String, PackageError> {
    let mut output = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("group 0 always matches");
        output.push_str(&template[last..whole.start()]);
        output.push_str(replacement(&caps, variables, path)?);
        last = whole.end();
    }
    output.push_str(&template[last..]);
    Ok(output)
}

fn replacement<'a>(
    caps: &Captures<'_>,
    variables: &'a BTreeMap<String, String>,
    path: &Path,
) -> Result<&'a str, PackageError> {
    if caps.name("escaped").is_some() {
        return Ok("$");
    }
    let name = caps
        .name("named")
        .or_else(|| caps.name("braced"))
        .map(|m| m.as_str())
        .unwrap_or_default();
    variables
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| PackageError::MissingVariable {
            path: path.to_path_buf(),
            name: name.to_string(),
        })
}

fn remove_existing(path: &Path) -> Result<(), PackageError> {
    if path.is_dir() {
        fs::remove_dir_all(path).map_err(io_err(path))
    } else if path.exists() {
        fs::remove_file(path).map_err(io_err(path))
    } else {
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), PackageError> {
    fs::create_dir_all(dst).map_err(io_err(dst))?;
    for entry in fs::read_dir(src).map_err(io_err(src))? {
        let entry = entry.map_err(io_err(src))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(io_err(&src_path))?;
        }
    }
    Ok(())
}
