//! # lesson-build
//!
//! Builds a themed, multi-language static lesson site from lesson
//! repositories. Each repository holds term manifests; each manifest lists the
//! projects of one term, their notes, downloadable materials and embedded
//! files. Markdown is rendered through an external renderer (pandoc), index
//! pages are generated here.
//!
//! # Architecture: Discover, Build, Index
//!
//! ```text
//! 1. Discover  repos/     →  manifests       (walk, parse, validate, group by language)
//! 2. Build     terms      →  site/{lang}/{id}.{n}/{NN}/   (projects, notes, archives)
//! 3. Index     built terms →  term, language and root index.html
//! ```
//!
//! Manifests are validated before anything is written: a manifest whose file
//! patterns do not resolve, or whose project numbers collide, is reported and
//! left out. Everything after that point is fatal, because a half-built term
//! is worse than a failed build.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | Terms, projects, extras, themes, languages, styles and resources |
//! | [`resolve`] | Glob expansion with arity checks (`exactly one`, `any number`) |
//! | [`manifest`] | Manifest parsing and validation, front-matter reading |
//! | [`render`] | The [`render::Renderer`] seam, its pandoc implementation and the page adapter |
//! | [`package`] | Directory preparation, file copies, zip archives and CSS variable substitution |
//! | [`builder`] | Builds one project or extra into its output directory |
//! | [`index`] | Term, language and root index pages, written with Maud |
//! | [`pipeline`] | Orchestration, progress events and cancellation |
//! | [`config`] | `lesson-build.toml` loading, validation, merging, regions and themes |
//! | [`output`] | CLI output formatting for build progress, summaries and checks |
//!
//! # Design Decisions
//!
//! ## Pandoc Behind a Trait
//!
//! Lesson pages are rendered by pandoc with the site template, so authors get
//! the same output they get locally. The pipeline only knows the
//! [`render::Renderer`] trait: a [`render::RenderJob`] describes input,
//! template, stylesheets, metadata and output, and the pandoc implementation
//! turns it into a command line. Tests swap in a recording renderer and never
//! spawn a process.
//!
//! ## Index Bodies in Maud
//!
//! Index pages are built as HTML fragments with
//! [Maud](https://maud.lambda.xyz/) and then passed through the same renderer
//! as lessons, so indexes and lessons share one template. Interpolation is
//! escaped, which matters because titles and descriptions come from manifests.
//!
//! ## Stable Output Layout
//!
//! ```text
//! site/
//! ├── index.html                     # languages, most projects first
//! ├── css/  fonts/  img/             # theme assets
//! └── en-GB/
//!     ├── index.html                 # terms of this language
//!     └── scratch.1/
//!         ├── index.html             # projects and extras of the term
//!         ├── scratch_1_Certificates_resources.zip
//!         └── 03/
//!             ├── Ghostbusters.html
//!             ├── Ghostbusters-notes.html
//!             └── scratch_1-03_Ghostbusters_resources.zip
//! ```
//!
//! Term directories are cleared before they are rebuilt so a removed project
//! does not linger. Archives use fixed timestamps so identical inputs produce
//! identical zips.

pub mod builder;
pub mod config;
pub mod index;
pub mod manifest;
pub mod model;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod render;
pub mod resolve;

#[cfg(test)]
pub(crate) mod test_helpers;
