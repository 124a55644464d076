//! Content model shared by every build stage.
//!
//! Every entity is a plain value. Moving a term through the pipeline never
//! mutates it: each stage produces a new value and the previous one stays
//! valid for anyone still holding it.
//!
//! ```text
//! declared   Term<Project, Extra>            (manifest parsed, globs expanded)
//! resolved   Term<Project, Extra>            (front-matter merged per project)
//! built      Term<BuiltProject, BuiltExtra>  (sources replaced by output resources)
//! ```

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Code of the language every theme falls back to.
pub const DEFAULT_LANGUAGE: &str = "en-GB";

/// A visual/branding variant of the generated site.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub id: String,
    pub name: String,
    /// Language used for the root index page.
    pub language: String,
    /// Legal footer used when the language has no override for this theme.
    pub legal: String,
    /// Extra stylesheets appended after the page style's own stylesheets.
    pub stylesheets: Vec<String>,
    pub logo: String,
    /// Values substituted into the CSS templates (`$header_text`, ...).
    pub css_variables: BTreeMap<String, String>,
}

/// Output language: display name, legal overrides and UI translations.
#[derive(Debug, Clone, PartialEq)]
pub struct Language {
    pub code: String,
    pub name: String,
    /// Legal text keyed by theme id.
    pub legal: BTreeMap<String, String>,
    pub translations: BTreeMap<String, String>,
}

impl Language {
    /// Minimal record for a code nobody configured: the code doubles as the
    /// display name and nothing is translated.
    pub fn fallback(code: &str) -> Self {
        Self {
            code: code.to_string(),
            name: code.to_string(),
            legal: BTreeMap::new(),
            translations: BTreeMap::new(),
        }
    }

    /// Look up a UI string. Unknown strings come back unchanged.
    pub fn translate<'a>(&'a self, text: &'a str) -> &'a str {
        self.translations
            .get(text)
            .map(String::as_str)
            .unwrap_or(text)
    }

    /// Legal text for a theme: this language's override, else the theme's own.
    pub fn legal_for<'a>(&'a self, theme: &'a Theme) -> &'a str {
        self.legal
            .get(&theme.id)
            .map(String::as_str)
            .unwrap_or(&theme.legal)
    }
}

/// The languages known to one build run.
///
/// Built once from configuration and passed down explicitly. Codes that show
/// up in manifests without being configured resolve to
/// [`Language::fallback`] without touching the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Languages {
    known: BTreeMap<String, Language>,
}

impl Languages {
    pub fn new(languages: impl IntoIterator<Item = Language>) -> Self {
        let mut known = BTreeMap::new();
        known.insert(
            DEFAULT_LANGUAGE.to_string(),
            Language {
                name: "English".to_string(),
                ..Language::fallback(DEFAULT_LANGUAGE)
            },
        );
        for language in languages {
            known.insert(language.code.clone(), language);
        }
        Self { known }
    }

    pub fn resolve(&self, code: &str) -> Language {
        self.known
            .get(code)
            .cloned()
            .unwrap_or_else(|| Language::fallback(code))
    }

    pub fn is_known(&self, code: &str) -> bool {
        self.known.contains_key(code)
    }
}

impl Default for Languages {
    fn default() -> Self {
        Self::new([])
    }
}

/// Template and stylesheet bundle for one class of rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub name: &'static str,
    pub template: &'static str,
    pub stylesheets: &'static [&'static str],
}

pub const LESSON_STYLE: Style = Style {
    name: "lesson",
    template: "template.html",
    stylesheets: &["/css/main.css", "/css/lesson.css"],
};

pub const NOTE_STYLE: Style = Style {
    name: "note",
    template: "template.html",
    stylesheets: &["/css/main.css", "/css/notes.css"],
};

pub const INDEX_STYLE: Style = Style {
    name: "index",
    template: "template.html",
    stylesheets: &["/css/main.css", "/css/index.css"],
};

/// One term of lessons, generic over the lifecycle stage of its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Term<P, E> {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Language code as declared by the manifest.
    pub language: String,
    pub number: u32,
    pub projects: Vec<P>,
    pub extras: Vec<E>,
}

pub type DeclaredTerm = Term<Project, Extra>;
pub type BuiltTerm = Term<BuiltProject, BuiltExtra>;

impl<P, E> Term<P, E> {
    /// Output directory name, `{id}.{number}`.
    pub fn dir_name(&self) -> String {
        format!("{}.{}", self.id, self.number)
    }

    /// Same term metadata around a new set of children.
    pub fn rebuild<P2, E2>(&self, projects: Vec<P2>, extras: Vec<E2>) -> Term<P2, E2> {
        Term {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            number: self.number,
            projects,
            extras,
        }
    }
}

/// A lesson as declared by a manifest, possibly refined by front-matter.
///
/// All paths are absolute and point at existing files.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub filename: PathBuf,
    pub number: u32,
    pub title: Option<String>,
    pub materials: Vec<PathBuf>,
    pub note: Option<PathBuf>,
    pub embeds: Vec<PathBuf>,
}

impl Project {
    /// Stem of the primary file, used in archive names.
    pub fn name(&self) -> String {
        file_stem(&self.filename)
    }

    /// Output subdirectory inside the term directory, zero-padded to 2 digits.
    pub fn dir_name(&self) -> String {
        format!("{:02}", self.number)
    }

    pub fn is_markdown(&self) -> bool {
        is_markdown(&self.filename)
    }
}

/// A project after building: sources replaced by what was written.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltProject {
    pub files: Vec<Resource>,
    pub number: u32,
    pub title: Option<String>,
    /// Zip archive of the project's materials, if it had any.
    pub materials: Option<PathBuf>,
    pub notes: Vec<Resource>,
    pub embeds: Vec<PathBuf>,
}

/// Supplementary, unnumbered content attached to a term.
#[derive(Debug, Clone, PartialEq)]
pub struct Extra {
    pub name: String,
    pub note: Option<PathBuf>,
    pub materials: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltExtra {
    pub name: String,
    pub notes: Vec<Resource>,
    pub materials: Option<PathBuf>,
}

/// One rendered or copied output file and its format tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub format: String,
    pub filename: PathBuf,
}

impl Resource {
    pub fn new(format: impl Into<String>, filename: impl Into<PathBuf>) -> Self {
        Self {
            format: format.into(),
            filename: filename.into(),
        }
    }

    /// html beats pdf beats everything else.
    pub fn precedence(&self) -> u8 {
        match self.format.as_str() {
            "html" => 2,
            "pdf" => 1,
            _ => 0,
        }
    }
}

/// Highest precedence first; equal formats keep their input order.
pub fn sort_by_precedence(resources: &[Resource]) -> Vec<Resource> {
    let mut sorted = resources.to_vec();
    sorted.sort_by_key(|r| Reverse(r.precedence()));
    sorted
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Name of the file a source produces in its output directory: markdown
/// becomes `{stem}.html`, anything else keeps its file name.
pub fn output_name(path: &Path) -> String {
    if is_markdown(path) {
        format!("{}.html", file_stem(path))
    } else {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
