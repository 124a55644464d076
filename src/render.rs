//! Renderer trait and the pandoc implementation.
//!
//! Every HTML page of the site goes through a [`Renderer`]. A page is either
//! a markdown document rendered as is, or a generated body (index pages)
//! handed to the template as the `body` variable with an empty input
//! document. Both shapes are described by one [`RenderJob`].
//!
//! The production implementation is [`PandocRenderer`], which shells out to
//! the configured pandoc binary. Tests use the recording `MockRenderer` from
//! this module's test submodule.
//!
//! [`Adapter`] binds a renderer to the theme and language of the build in
//! progress, so callers only say *what* to render and *where*.

use crate::config::RendererConfig;
use crate::model::{Language, Style, Theme};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to run {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("{program} {status} rendering {output}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        output: PathBuf,
        stderr: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What the renderer reads.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderInput {
    /// A markdown file on disk.
    Markdown(PathBuf),
    /// An already generated HTML body; the input document is empty.
    Tree(String),
}

/// One page to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub input: RenderInput,
    pub template: PathBuf,
    /// Style stylesheets first, then the theme's.
    pub stylesheets: Vec<String>,
    /// Template variables in the order they are passed.
    pub metadata: Vec<(String, String)>,
    pub output: PathBuf,
}

/// Turns a [`RenderJob`] into a file at `job.output`.
pub trait Renderer: Sync {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError>;
}

/// Renders through an external pandoc process.
#[derive(Debug, Clone, PartialEq)]
pub struct PandocRenderer {
    pub program: String,
    pub highlight_style: String,
    pub markdown_format: String,
    pub filter: Option<PathBuf>,
}

impl PandocRenderer {
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            program: config.program.clone(),
            highlight_style: config.highlight_style.clone(),
            markdown_format: config.markdown_format.clone(),
            filter: config.filter.clone(),
        }
    }

    /// Command line for `job`, without the program name.
    pub fn command_args(&self, job: &RenderJob) -> Vec<String> {
        let mut args = Vec::new();
        match &job.input {
            RenderInput::Markdown(path) => {
                args.push(path.display().to_string());
                args.extend(["-f".to_string(), self.markdown_format.clone()]);
            }
            RenderInput::Tree(_) => {
                args.extend(["-f".to_string(), "html+raw_html".to_string()]);
            }
        }
        args.extend([
            "-o".to_string(),
            job.output.display().to_string(),
            "-t".to_string(),
            "html5".to_string(),
            "-s".to_string(),
            "--highlight-style".to_string(),
            self.highlight_style.clone(),
            "--section-divs".to_string(),
            format!("--template={}", job.template.display()),
        ]);
        if let Some(filter) = &self.filter {
            args.extend(["--filter".to_string(), filter.display().to_string()]);
        }

        let mut metadata = job.metadata.iter();
        // legal, theme and logo lead, stylesheets follow, then the page variables
        for (key, value) in metadata.by_ref().take(3) {
            args.extend(["-M".to_string(), format!("{key}={value}")]);
        }
        for stylesheet in &job.stylesheets {
            args.extend(["-c".to_string(), stylesheet.clone()]);
        }
        for (key, value) in metadata {
            args.extend(["-M".to_string(), format!("{key}={value}")]);
        }
        if let RenderInput::Tree(body) = &job.input {
            args.extend(["-M".to_string(), format!("body={body}")]);
        }
        args
    }
}

impl Renderer for PandocRenderer {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        let args = self.command_args(job);
        let working_dir = job.output.parent().unwrap_or(Path::new("."));
        tracing::debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                program: self.program.clone(),
                status: output.status,
                output: job.output.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// A renderer bound to the theme and language of one build.
#[derive(Clone, Copy)]
pub struct Adapter<'a> {
    pub renderer: &'a dyn Renderer,
    pub theme: &'a Theme,
    pub language: &'a Language,
    pub templates_dir: &'a Path,
}

impl<'a> Adapter<'a> {
    /// Render a markdown file to `output`.
    pub fn markdown_to_html(
        &self,
        file: &Path,
        style: &Style,
        output: &Path,
    ) -> Result<(), RenderError> {
        let job = self.job(RenderInput::Markdown(file.to_path_buf()), style, &[], output);
        self.renderer.render(&job)
    }

    /// Render a generated body with extra template variables to `output`.
    pub fn tree_to_html(
        &self,
        variables: &[(&str, String)],
        body: String,
        style: &Style,
        output: &Path,
    ) -> Result<(), RenderError> {
        let job = self.job(RenderInput::Tree(body), style, variables, output);
        self.renderer.render(&job)
    }

    pub fn translate(&self, text: &'a str) -> &'a str {
        self.language.translate(text)
    }

    fn job(
        &self,
        input: RenderInput,
        style: &Style,
        variables: &[(&str, String)],
        output: &Path,
    ) -> RenderJob {
        let mut metadata = vec![
            (
                "legal".to_string(),
                self.language.legal_for(self.theme).to_string(),
            ),
            ("theme".to_string(), self.theme.name.clone()),
            ("logo".to_string(), self.theme.logo.clone()),
        ];
        metadata.extend(variables.iter().map(|(k, v)| (k.to_string(), v.clone())));

        RenderJob {
            input,
            template: self.templates_dir.join(style.template),
            stylesheets: style
                .stylesheets
                .iter()
                .map(|s| s.to_string())
                .chain(self.theme.stylesheets.iter().cloned())
                .collect(),
            metadata,
            output: output.to_path_buf(),
        }
    }
}
