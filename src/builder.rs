//! Builds the projects and extras of one term.
//!
//! Each project writes into its own directory: the rendered (or copied)
//! primary file, its rendered notes, the materials archive and copies of the
//! embedded files. Extras write next to the term index.

use crate::model::{
    BuiltExtra, BuiltProject, Extra, LESSON_STYLE, NOTE_STYLE, Project, Resource, Style, Term,
    is_markdown, output_name,
};
use crate::package;
use crate::pipeline::BuildError;
use crate::render::Adapter;
use std::path::{Path, PathBuf};

/// Produce the output resources for one input file.
///
/// Markdown is rendered to `{stem}.html` in `output_dir`; any other file is
/// copied verbatim and tagged with its extension.
pub fn process_file(
    adapter: &Adapter<'_>,
    file: &Path,
    style: &Style,
    output_dir: &Path,
) -> Result<Vec<Resource>, BuildError> {
    if is_markdown(file) {
        let output = output_dir.join(output_name(file));
        adapter.markdown_to_html(file, style, &output)?;
        return Ok(vec![Resource::new("html", output)]);
    }
    let output = package::copy_file(file, output_dir)?;
    let format = file
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(vec![Resource::new(format, output)])
}

/// Build one (front-matter resolved) project into `output_dir`.
pub fn build_project<P, E>(
    term: &Term<P, E>,
    project: &Project,
    adapter: &Adapter<'_>,
    output_dir: &Path,
) -> Result<BuiltProject, BuildError> {
    package::prepare_dir(output_dir, false)?;

    let files = process_file(adapter, &project.filename, &LESSON_STYLE, output_dir)?;
    let notes = match &project.note {
        Some(note) => process_file(adapter, note, &NOTE_STYLE, output_dir)?,
        None => Vec::new(),
    };

    let archive = format!(
        "{}_{}-{:02}_{}_{}.zip",
        term.id,
        term.number,
        project.number,
        project.name(),
        adapter.translate("resources")
    );
    let materials = package::zip_files(&project.materials, output_dir, &archive)?;

    let embeds = project
        .embeds
        .iter()
        .map(|file| package::copy_file(file, output_dir))
        .collect::<Result<Vec<PathBuf>, _>>()?;

    Ok(BuiltProject {
        files,
        number: project.number,
        title: project.title.clone(),
        materials,
        notes,
        embeds,
    })
}

/// Build one extra into `output_dir` (the term directory).
pub fn build_extra<P, E>(
    term: &Term<P, E>,
    extra: &Extra,
    adapter: &Adapter<'_>,
    output_dir: &Path,
) -> Result<BuiltExtra, BuildError> {
    let notes = match &extra.note {
        Some(note) => process_file(adapter, note, &NOTE_STYLE, output_dir)?,
        None => Vec::new(),
    };
    let archive = format!(
        "{}_{}_{}_{}.zip",
        term.id,
        term.number,
        extra.name,
        adapter.translate("resources")
    );
    let materials = package::zip_files(&extra.materials, output_dir, &archive)?;

    Ok(BuiltExtra {
        name: extra.name.clone(),
        notes,
        materials,
    })
}
