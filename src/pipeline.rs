//! Build orchestration: discovery through the root index.
//!
//! ```text
//! 1. Discover   input roots  →  *.manifest files (sorted, hidden dirs skipped)
//! 2. Load       manifests    →  declared terms   (failures recorded, not fatal)
//! 3. Group      terms        →  languages        (first-seen order)
//! 4. Assets     fonts/, img/, css/ (theme variables substituted)
//! 5. Build      per language, per term: projects (parallel), extras, term index
//! 6. Index      language indexes, then the root index (most projects first)
//! ```
//!
//! Progress is reported as [`BuildEvent`]s over an optional channel, the same
//! way for `build` and `check`, so the CLI can print while work is running.
//! Diagnostics go through `tracing`.
//!
//! A failing manifest only removes its own term from the site. Anything that
//! fails after a term has been accepted (front-matter, rendering, archiving)
//! aborts the build.

use crate::builder;
use crate::config::{BuildConfig, ConfigError, Region};
use crate::index::{self, TermIndex};
use crate::manifest::{self, ManifestError};
use crate::model::{DeclaredTerm, Language, Theme};
use crate::package::{self, PackageError};
use crate::render::{Adapter, RenderError, Renderer};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to search for manifests: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("build cancelled")]
    Cancelled,
}

/// What to build and where.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub region: Region,
    /// Lesson repositories searched for manifests.
    pub inputs: Vec<PathBuf>,
    /// Site root; created if missing.
    pub output: PathBuf,
}

/// Progress events emitted while building or checking.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    ManifestFound {
        path: PathBuf,
    },
    ManifestFailed {
        path: PathBuf,
        error: String,
    },
    AssetsCopied {
        output: PathBuf,
    },
    LanguageStarted {
        code: String,
        name: String,
        terms: usize,
    },
    TermStarted {
        title: String,
        number: u32,
        projects: usize,
    },
    ProjectBuilt {
        number: u32,
        title: Option<String>,
        source: PathBuf,
    },
    ExtraBuilt {
        name: String,
    },
    TermFinished {
        title: String,
        index: PathBuf,
    },
    LanguageFinished {
        name: String,
        projects: usize,
        index: PathBuf,
    },
    RootIndexWritten {
        path: PathBuf,
        languages: usize,
    },
}

/// Shared cancellation flag, checked between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BuildError> {
        if self.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A manifest that did not make it into the site.
#[derive(Debug)]
pub struct FailedManifest {
    pub path: PathBuf,
    pub error: ManifestError,
}

/// A parsed manifest and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedTerm {
    pub manifest: PathBuf,
    pub term: DeclaredTerm,
}

/// Terms sharing one language code, in discovery order.
#[derive(Debug, Clone)]
pub struct LanguageGroup {
    pub code: String,
    pub terms: Vec<LoadedTerm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageSummary {
    pub code: String,
    pub name: String,
    pub terms: usize,
    pub projects: usize,
    pub index: PathBuf,
}

#[derive(Debug)]
pub struct BuildSummary {
    /// Built languages, in root index order.
    pub languages: Vec<LanguageSummary>,
    pub failed: Vec<FailedManifest>,
    pub root_index: PathBuf,
}

impl BuildSummary {
    pub fn total_projects(&self) -> usize {
        self.languages.iter().map(|l| l.projects).sum()
    }
}

/// Result of validating manifests without rendering anything.
#[derive(Debug)]
pub struct CheckReport {
    /// Valid terms with front-matter already merged into their projects.
    pub groups: Vec<LanguageGroup>,
    pub failed: Vec<FailedManifest>,
}

fn emit(events: Option<&Sender<BuildEvent>>, event: BuildEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

fn record_failure(
    failed: &mut Vec<FailedManifest>,
    events: Option<&Sender<BuildEvent>>,
    path: &Path,
    error: ManifestError,
) {
    tracing::warn!("skipping {}: {}", path.display(), error);
    emit(
        events,
        BuildEvent::ManifestFailed {
            path: path.to_path_buf(),
            error: error.to_string(),
        },
    );
    failed.push(FailedManifest {
        path: path.to_path_buf(),
        error,
    });
}

/// Find manifest files under every root, in sorted walk order.
///
/// Hidden directories (and hidden files) are skipped.
pub fn discover_manifests(roots: &[PathBuf], extension: &str) -> Result<Vec<PathBuf>, BuildError> {
    let mut manifests = Vec::new();
    for root in roots {
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|e| e == extension)
            {
                manifests.push(entry.into_path());
            }
        }
    }
    Ok(manifests)
}

/// Parse every manifest, keeping the failures apart.
pub fn load_terms(
    manifests: &[PathBuf],
    events: Option<&Sender<BuildEvent>>,
    cancel: &CancelFlag,
) -> Result<(Vec<LoadedTerm>, Vec<FailedManifest>), BuildError> {
    let mut terms = Vec::new();
    let mut failed = Vec::new();
    for path in manifests {
        cancel.check()?;
        emit(events, BuildEvent::ManifestFound { path: path.clone() });
        match manifest::parse_manifest(path) {
            Ok(term) => terms.push(LoadedTerm {
                manifest: path.clone(),
                term,
            }),
            Err(e) => record_failure(&mut failed, events, path, e),
        }
    }
    Ok((terms, failed))
}

/// Group terms by language code in first-seen order.
///
/// A term reusing a number already taken in its language is rejected, the
/// first one wins.
pub fn group_by_language(
    terms: Vec<LoadedTerm>,
    events: Option<&Sender<BuildEvent>>,
) -> (Vec<LanguageGroup>, Vec<FailedManifest>) {
    let mut groups: Vec<LanguageGroup> = Vec::new();
    let mut taken = BTreeSet::new();
    let mut failed = Vec::new();

    for loaded in terms {
        let term = &loaded.term;
        if !taken.insert((term.language.clone(), term.number)) {
            let error = ManifestError::DuplicateTerm {
                path: loaded.manifest.clone(),
                language: term.language.clone(),
                number: term.number,
            };
            record_failure(&mut failed, events, &loaded.manifest, error);
            continue;
        }
        match groups.iter_mut().find(|g| g.code == term.language) {
            Some(group) => group.terms.push(loaded),
            None => groups.push(LanguageGroup {
                code: term.language.clone(),
                terms: vec![loaded],
            }),
        }
    }
    (groups, failed)
}

/// Merge front-matter into every project of a term and re-check numbering.
fn resolve_term(loaded: &LoadedTerm) -> Result<DeclaredTerm, ManifestError> {
    let projects = loaded
        .term
        .projects
        .iter()
        .map(manifest::resolve_project)
        .collect::<Result<Vec<_>, _>>()?;
    manifest::check_unique_numbers(&projects, &loaded.manifest)?;
    Ok(loaded.term.rebuild(projects, loaded.term.extras.clone()))
}

/// Validate every manifest under `inputs` without rendering anything.
pub fn check(
    inputs: &[PathBuf],
    config: &BuildConfig,
    events: Option<&Sender<BuildEvent>>,
    cancel: &CancelFlag,
) -> Result<CheckReport, BuildError> {
    let manifests = discover_manifests(inputs, &config.manifest_extension)?;
    let (terms, mut failed) = load_terms(&manifests, events, cancel)?;
    let (groups, duplicates) = group_by_language(terms, events);
    failed.extend(duplicates);

    let mut resolved = Vec::with_capacity(groups.len());
    for group in groups {
        let mut terms = Vec::with_capacity(group.terms.len());
        for loaded in group.terms {
            cancel.check()?;
            match resolve_term(&loaded) {
                Ok(term) => terms.push(LoadedTerm {
                    manifest: loaded.manifest,
                    term,
                }),
                Err(e) => record_failure(&mut failed, events, &loaded.manifest, e),
            }
        }
        if !terms.is_empty() {
            resolved.push(LanguageGroup {
                code: group.code,
                terms,
            });
        }
    }

    Ok(CheckReport {
        groups: resolved,
        failed,
    })
}

/// Build the whole site.
pub fn build(
    request: &BuildRequest,
    config: &BuildConfig,
    renderer: &dyn Renderer,
    events: Option<&Sender<BuildEvent>>,
    cancel: &CancelFlag,
) -> Result<BuildSummary, BuildError> {
    let theme = request.region.theme(config)?;
    let languages = config.languages();

    let manifests = discover_manifests(&request.inputs, &config.manifest_extension)?;
    let (terms, mut failed) = load_terms(&manifests, events, cancel)?;
    let (groups, duplicates) = group_by_language(terms, events);
    failed.extend(duplicates);

    copy_site_assets(config, &theme, &request.output)?;
    emit(
        events,
        BuildEvent::AssetsCopied {
            output: request.output.clone(),
        },
    );

    let mut summaries = Vec::with_capacity(groups.len());
    for group in &groups {
        let language = languages.resolve(&group.code);
        let adapter = Adapter {
            renderer,
            theme: &theme,
            language: &language,
            templates_dir: &config.templates_dir,
        };
        summaries.push(build_language(group, &adapter, &request.output, events, cancel)?);
    }

    // stable: equal counts keep discovery order
    summaries.sort_by_key(|s| Reverse(s.projects));

    let root_language = languages.resolve(&theme.language);
    let adapter = Adapter {
        renderer,
        theme: &theme,
        language: &root_language,
        templates_dir: &config.templates_dir,
    };
    let links: Vec<(String, PathBuf)> = summaries
        .iter()
        .map(|s| (s.name.clone(), s.index.clone()))
        .collect();
    let root_index = index::make_root_index(&adapter, &links, &request.output)?;
    emit(
        events,
        BuildEvent::RootIndexWritten {
            path: root_index.clone(),
            languages: summaries.len(),
        },
    );

    Ok(BuildSummary {
        languages: summaries,
        failed,
        root_index,
    })
}

/// Copy fonts and images, and generate theme CSS, into the output root.
fn copy_site_assets(config: &BuildConfig, theme: &Theme, output: &Path) -> Result<(), BuildError> {
    package::prepare_dir(output, false)?;
    let sources = [config.assets_dir.join("fonts"), config.assets_dir.join("img")];
    package::copy_assets(&sources, output)?;
    package::make_css(
        &config.templates_dir.join("css"),
        &theme.css_variables,
        &output.join("css"),
    )?;
    Ok(())
}

fn build_language(
    group: &LanguageGroup,
    adapter: &Adapter<'_>,
    output: &Path,
    events: Option<&Sender<BuildEvent>>,
    cancel: &CancelFlag,
) -> Result<LanguageSummary, BuildError> {
    let language: &Language = adapter.language;
    let lang_dir = output.join(&language.code);
    package::prepare_dir(&lang_dir, false)?;
    emit(
        events,
        BuildEvent::LanguageStarted {
            code: language.code.clone(),
            name: language.name.clone(),
            terms: group.terms.len(),
        },
    );

    let mut term_indexes = Vec::with_capacity(group.terms.len());
    for loaded in &group.terms {
        cancel.check()?;
        term_indexes.push(build_term(loaded, adapter, &lang_dir, events, cancel)?);
    }

    let index = index::make_language_index(adapter, &term_indexes, &lang_dir)?;
    let projects = term_indexes.iter().map(|t| t.projects).sum();
    emit(
        events,
        BuildEvent::LanguageFinished {
            name: language.name.clone(),
            projects,
            index: index.clone(),
        },
    );

    Ok(LanguageSummary {
        code: language.code.clone(),
        name: language.name.clone(),
        terms: term_indexes.len(),
        projects,
        index,
    })
}

fn build_term(
    loaded: &LoadedTerm,
    adapter: &Adapter<'_>,
    lang_dir: &Path,
    events: Option<&Sender<BuildEvent>>,
    cancel: &CancelFlag,
) -> Result<TermIndex, BuildError> {
    let declared = &loaded.term;
    let term_dir = lang_dir.join(declared.dir_name());
    package::prepare_dir(&term_dir, true)?;
    emit(
        events,
        BuildEvent::TermStarted {
            title: declared.title.clone(),
            number: declared.number,
            projects: declared.projects.len(),
        },
    );

    let term = resolve_term(loaded)?;

    let projects = term
        .projects
        .par_iter()
        .map(|project| -> Result<_, BuildError> {
            cancel.check()?;
            let built =
                builder::build_project(&term, project, adapter, &term_dir.join(project.dir_name()))?;
            emit(
                events,
                BuildEvent::ProjectBuilt {
                    number: project.number,
                    title: project.title.clone(),
                    source: project.filename.clone(),
                },
            );
            Ok(built)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut extras = Vec::with_capacity(term.extras.len());
    for extra in &term.extras {
        extras.push(builder::build_extra(&term, extra, adapter, &term_dir)?);
        emit(
            events,
            BuildEvent::ExtraBuilt {
                name: extra.name.clone(),
            },
        );
    }

    let built = term.rebuild(projects, extras);
    let index = index::make_term_index(&built, adapter, &term_dir)?;
    emit(
        events,
        BuildEvent::TermFinished {
            title: built.title.clone(),
            index: index.path.clone(),
        },
    );
    Ok(index)
}
