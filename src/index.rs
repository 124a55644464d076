//! Index pages: one per term, one per language and the site root.
//!
//! Bodies are built with [maud](https://maud.lambda.xyz/) and handed to the
//! renderer as the `body` template variable, so index pages share the lesson
//! template and theme. Every link is relative to the directory of the page
//! that contains it.
//!
//! ```text
//! {out}/index.html                     languages, most projects first
//! {out}/{lang}/index.html              terms, ascending by number
//! {out}/{lang}/{id}.{number}/index.html  projects and extras of one term
//! ```

use crate::model::{BuiltTerm, INDEX_STYLE, sort_by_precedence};
use crate::pipeline::BuildError;
use crate::render::Adapter;
use maud::{Markup, html};
use std::path::{Component, Path, PathBuf};

/// A rendered term index, as the language index needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct TermIndex {
    pub path: PathBuf,
    pub number: u32,
    pub title: String,
    pub projects: usize,
}

/// Render `{term_dir}/index.html` listing the term's projects and extras.
pub fn make_term_index(
    term: &BuiltTerm,
    adapter: &Adapter<'_>,
    term_dir: &Path,
) -> Result<TermIndex, BuildError> {
    let output = term_dir.join("index.html");
    let body = term_body(term, adapter, term_dir).into_string();
    adapter.tree_to_html(
        &[
            ("title", term.title.clone()),
            ("level", format!("T{}", term.number)),
        ],
        body,
        &INDEX_STYLE,
        &output,
    )?;

    Ok(TermIndex {
        path: output,
        number: term.number,
        title: term.title.clone(),
        projects: term.projects.len(),
    })
}

fn term_body(term: &BuiltTerm, adapter: &Adapter<'_>, term_dir: &Path) -> Markup {
    let mut projects: Vec<_> = term.projects.iter().collect();
    projects.sort_by_key(|p| p.number);

    html! {
        @if !term.description.is_empty() {
            section.description {
                p { (term.description) }
            }
        }
        section.projects {
            h1 { (adapter.translate("Projects")) }
        }
        ol.projectlist {
            @for project in projects {
                @let files = sort_by_precedence(&project.files);
                li {
                    ul.projectfiles {
                        @if let Some((first, others)) = files.split_first() {
                            @let url = relative_url(&first.filename, term_dir);
                            li {
                                a.worksheet href=(url) {
                                    (project.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(&url))
                                }
                            }
                            @for file in others {
                                li {
                                    a.alternate href=(relative_url(&file.filename, term_dir)) {
                                        (file.format)
                                    }
                                }
                            }
                        }
                        @for note in sort_by_precedence(&project.notes) {
                            li {
                                a.notes href=(relative_url(&note.filename, term_dir)) {
                                    @if note.format == "html" {
                                        (adapter.translate("Notes"))
                                    } @else {
                                        (adapter.translate("Notes")) " (" (note.format) ")"
                                    }
                                }
                            }
                        }
                        @if let Some(archive) = &project.materials {
                            li {
                                a.materials href=(relative_url(archive, term_dir)) {
                                    (adapter.translate("Resources"))
                                }
                            }
                        }
                    }
                }
            }
        }
        section.extras {
            h1 { (adapter.translate("Extras")) }
        }
        ol.extralist {
            @for extra in &term.extras {
                @if let Some(note) = sort_by_precedence(&extra.notes).first() {
                    li.extranote {
                        a href=(relative_url(&note.filename, term_dir)) { (extra.name) }
                    }
                }
                @if let Some(archive) = &extra.materials {
                    li.extramaterial {
                        a href=(relative_url(archive, term_dir)) {
                            (archive.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
                        }
                    }
                }
            }
        }
    }
}

/// Render `{lang_dir}/index.html` listing the language's terms by number.
pub fn make_language_index(
    adapter: &Adapter<'_>,
    terms: &[TermIndex],
    lang_dir: &Path,
) -> Result<PathBuf, BuildError> {
    let output = lang_dir.join("index.html");
    let mut terms: Vec<_> = terms.iter().collect();
    terms.sort_by_key(|t| t.number);

    let body = html! {
        section.termlist {
            h1 { (adapter.translate("Terms")) }
            ol {
                @for term in terms {
                    @let url = relative_url(&term.path, lang_dir);
                    li.term {
                        a href=(url) {
                            @if term.title.is_empty() { (url) } @else { (term.title) }
                        }
                    }
                }
            }
        }
    };
    adapter.tree_to_html(
        &[("title", adapter.language.name.clone())],
        body.into_string(),
        &INDEX_STYLE,
        &output,
    )?;
    Ok(output)
}

/// Render `{output_dir}/index.html` listing languages in the given order.
///
/// `languages` pairs each display name with its language index path. The
/// adapter carries the theme's own language.
pub fn make_root_index(
    adapter: &Adapter<'_>,
    languages: &[(String, PathBuf)],
    output_dir: &Path,
) -> Result<PathBuf, BuildError> {
    let output = output_dir.join("index.html");
    let body = html! {
        section {
            h1 { (adapter.translate("Languages")) }
            ol.langs {
                @for (name, index) in languages {
                    li.lang {
                        a href=(relative_url(index, output_dir)) { (name) }
                    }
                }
            }
        }
    };
    adapter.tree_to_html(
        &[("title", adapter.theme.name.clone())],
        body.into_string(),
        &INDEX_STYLE,
        &output,
    )?;
    Ok(output)
}

/// URL of `target` relative to the directory `from_dir`, with `/` separators.
pub fn relative_url(target: &Path, from_dir: &Path) -> String {
    let to: Vec<Component> = target.components().collect();
    let from: Vec<Component> = from_dir.components().collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let ups = from.len() - common;
    let down: Vec<String> = to[common..]
        .iter()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let url = format!("{}{}", "../".repeat(ups), down.join("/"));
    if url.is_empty() { "./".to_string() } else { url }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuiltExtra, BuiltProject, Resource, Term};
    use crate::render::RenderInput;
    use crate::render::tests::MockRenderer;
    use crate::test_helpers::{test_adapter, test_language, test_theme};
    use std::fs;
    use tempfile::TempDir;

    fn built_project(dir: &Path, number: u32, title: Option<&str>) -> BuiltProject {
        let project_dir = dir.join(format!("{number:02}"));
        BuiltProject {
            files: vec![Resource::new("html", project_dir.join("lesson.html"))],
            number,
            title: title.map(str::to_string),
            materials: None,
            notes: vec![],
            embeds: vec![],
        }
    }

    fn built_term(projects: Vec<BuiltProject>, extras: Vec<BuiltExtra>) -> BuiltTerm {
        Term {
            id: "scratch".to_string(),
            title: "Scratch Term 1".to_string(),
            description: String::new(),
            language: "en-GB".to_string(),
            number: 1,
            projects,
            extras,
        }
    }

    fn body_of(renderer: &MockRenderer) -> String {
        match &renderer.get_jobs().last().unwrap().input {
            RenderInput::Tree(body) => body.clone(),
            other => panic!("expected tree input, got {other:?}"),
        }
    }

    #[test]
    fn relative_url_walks_up_and_down() {
        assert_eq!(
            relative_url(
                Path::new("/out/en-GB/scratch.1/03/lesson.html"),
                Path::new("/out/en-GB/scratch.1")
            ),
            "03/lesson.html"
        );
        assert_eq!(
            relative_url(
                Path::new("/out/en-GB/index.html"),
                Path::new("/out/nl-NL/python.2")
            ),
            "../../en-GB/index.html"
        );
        assert_eq!(relative_url(Path::new("/out"), Path::new("/out")), "./");
    }

    #[test]
    fn term_index_lists_projects_by_number() {
        let tmp = TempDir::new().unwrap();
        let term_dir = tmp.path().join("scratch.1");
        fs::create_dir_all(&term_dir).unwrap();
        let term = built_term(
            vec![
                built_project(&term_dir, 2, Some("Second")),
                built_project(&term_dir, 1, Some("First")),
            ],
            vec![],
        );
        let renderer = MockRenderer::new();
        let (theme, language) = (test_theme(), test_language());
        let adapter = test_adapter(&renderer, &theme, &language, tmp.path());

        let index = make_term_index(&term, &adapter, &term_dir).unwrap();
        assert_eq!(index.path, term_dir.join("index.html"));
        assert_eq!(index.projects, 2);

        let body = body_of(&renderer);
        let first = body.find("01/lesson.html").unwrap();
        let second = body.find("02/lesson.html").unwrap();
        assert!(first < second);
        assert!(body.contains(r#"<a class="worksheet" href="01/lesson.html">First</a>"#));
        assert!(!body.contains("section class=\"description\""));

        let job = &renderer.get_jobs()[0];
        assert!(job.metadata.contains(&("title".to_string(), "Scratch Term 1".to_string())));
        assert!(job.metadata.contains(&("level".to_string(), "T1".to_string())));
        assert_eq!(job.stylesheets[1], "/css/index.css");
    }

    #[test]
    fn term_index_links_alternates_notes_and_materials() {
        let tmp = TempDir::new().unwrap();
        let term_dir = tmp.path().join("scratch.1");
        let project_dir = term_dir.join("01");
        let project = BuiltProject {
            files: vec![
                Resource::new("sb2", project_dir.join("game.sb2")),
                Resource::new("html", project_dir.join("game.html")),
            ],
            number: 1,
            title: None,
            materials: Some(project_dir.join("scratch_1-01_game_resources.zip")),
            notes: vec![
                Resource::new("pdf", project_dir.join("notes.pdf")),
                Resource::new("html", project_dir.join("notes.html")),
            ],
            embeds: vec![],
        };
        let term = Term {
            description: "Learn <Scratch>".to_string(),
            ..built_term(vec![project], vec![])
        };
        let renderer = MockRenderer::new();
        let (theme, mut language) = (test_theme(), test_language());
        language
            .translations
            .insert("Notes".to_string(), "Notities".to_string());
        let adapter = test_adapter(&renderer, &theme, &language, tmp.path());
        fs::create_dir_all(&term_dir).unwrap();

        make_term_index(&term, &adapter, &term_dir).unwrap();
        let body = body_of(&renderer);

        assert!(body.contains(r#"<section class="description"><p>Learn &lt;Scratch&gt;</p></section>"#));
        // untitled project falls back to its URL
        assert!(body.contains(r#"<a class="worksheet" href="01/game.html">01/game.html</a>"#));
        assert!(body.contains(r#"<a class="alternate" href="01/game.sb2">sb2</a>"#));
        assert!(body.contains(r#"<a class="notes" href="01/notes.html">Notities</a>"#));
        assert!(body.contains(r#"<a class="notes" href="01/notes.pdf">Notities (pdf)</a>"#));
        assert!(body.find("notes.html").unwrap() < body.find("notes.pdf").unwrap());
        assert!(body.contains(
            r#"<a class="materials" href="01/scratch_1-01_game_resources.zip">Resources</a>"#
        ));
    }

    #[test]
    fn empty_title_falls_back_to_url() {
        let tmp = TempDir::new().unwrap();
        let term_dir = tmp.path().join("scratch.1");
        fs::create_dir_all(&term_dir).unwrap();
        let term = built_term(vec![built_project(&term_dir, 4, Some(""))], vec![]);
        let renderer = MockRenderer::new();
        let (theme, language) = (test_theme(), test_language());
        let adapter = test_adapter(&renderer, &theme, &language, tmp.path());

        make_term_index(&term, &adapter, &term_dir).unwrap();
        assert!(body_of(&renderer).contains(
            r#"<a class="worksheet" href="04/lesson.html">04/lesson.html</a>"#
        ));
    }

    #[test]
    fn term_index_lists_extras_in_declared_order() {
        let tmp = TempDir::new().unwrap();
        let term_dir = tmp.path().join("scratch.1");
        fs::create_dir_all(&term_dir).unwrap();
        let extras = vec![
            BuiltExtra {
                name: "Volunteer guide".to_string(),
                notes: vec![Resource::new("html", term_dir.join("guide.html"))],
                materials: None,
            },
            BuiltExtra {
                name: "Certificates".to_string(),
                notes: vec![],
                materials: Some(term_dir.join("scratch_1_Certificates_resources.zip")),
            },
        ];
        let term = built_term(vec![], extras);
        let renderer = MockRenderer::new();
        let (theme, language) = (test_theme(), test_language());
        let adapter = test_adapter(&renderer, &theme, &language, tmp.path());

        make_term_index(&term, &adapter, &term_dir).unwrap();
        let body = body_of(&renderer);

        assert!(body.contains(r#"<li class="extranote"><a href="guide.html">Volunteer guide</a></li>"#));
        assert!(body.contains(
            r#"<li class="extramaterial"><a href="scratch_1_Certificates_resources.zip">scratch_1_Certificates_resources.zip</a></li>"#
        ));
        assert!(body.find("extranote").unwrap() < body.find("extramaterial").unwrap());
    }

    #[test]
    fn language_index_sorts_terms() {
        let tmp = TempDir::new().unwrap();
        let lang_dir = tmp.path().join("en-GB");
        fs::create_dir_all(&lang_dir).unwrap();
        let terms = vec![
            TermIndex {
                path: lang_dir.join("python.2/index.html"),
                number: 2,
                title: "Python".to_string(),
                projects: 4,
            },
            TermIndex {
                path: lang_dir.join("scratch.1/index.html"),
                number: 1,
                title: String::new(),
                projects: 3,
            },
        ];
        let renderer = MockRenderer::new();
        let (theme, language) = (test_theme(), test_language());
        let adapter = test_adapter(&renderer, &theme, &language, tmp.path());

        let index = make_language_index(&adapter, &terms, &lang_dir).unwrap();
        assert_eq!(index, lang_dir.join("index.html"));

        let body = body_of(&renderer);
        assert_eq!(
            body,
            concat!(
                r#"<section class="termlist"><h1>Terms</h1><ol>"#,
                r#"<li class="term"><a href="scratch.1/index.html">scratch.1/index.html</a></li>"#,
                r#"<li class="term"><a href="python.2/index.html">Python</a></li>"#,
                "</ol></section>"
            )
        );
        let job = &renderer.get_jobs()[0];
        assert!(job.metadata.contains(&("title".to_string(), "English".to_string())));
    }

    #[test]
    fn root_index_keeps_given_order() {
        let tmp = TempDir::new().unwrap();
        let languages = vec![
            ("Nederlands".to_string(), tmp.path().join("nl-NL/index.html")),
            ("English".to_string(), tmp.path().join("en-GB/index.html")),
        ];
        let renderer = MockRenderer::new();
        let (theme, language) = (test_theme(), test_language());
        let adapter = test_adapter(&renderer, &theme, &language, tmp.path());

        make_root_index(&adapter, &languages, tmp.path()).unwrap();
        let body = body_of(&renderer);
        assert_eq!(
            body,
            concat!(
                r#"<section><h1>Languages</h1><ol class="langs">"#,
                r#"<li class="lang"><a href="nl-NL/index.html">Nederlands</a></li>"#,
                r#"<li class="lang"><a href="en-GB/index.html">English</a></li>"#,
                "</ol></section>"
            )
        );
        let job = &renderer.get_jobs()[0];
        assert!(job.metadata.contains(&("title".to_string(), "Code Club".to_string())));
        assert!(tmp.path().join("index.html").exists());
    }
}
