use clap::{Parser, Subcommand};
use lesson_build::config::{self, Region};
use lesson_build::output;
use lesson_build::pipeline::{self, BuildRequest, CancelFlag};
use lesson_build::render::PandocRenderer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lesson-build")]
#[command(about = "Build a static lesson site from term manifests")]
#[command(long_about = "\
Build a static lesson site from term manifests

Every lesson repository is searched for *.manifest files. A manifest is a JSON
document describing one term: its id, number, language and projects.

Repository structure:

  scratch-curriculum/
  ├── term1/
  │   ├── scratch.manifest           # term manifest
  │   ├── Ghostbusters/
  │   │   ├── Ghostbusters.md        # lesson (front-matter: title, materials, note, embeds)
  │   │   ├── Ghostbusters-notes.md  # club leader notes
  │   │   └── resources/*.sb2        # zipped into the project's materials archive
  │   └── extras/certificates.pdf
  └── .git/                          # hidden directories are skipped

Output layout:

  site/index.html                    # languages
  site/{lang}/index.html             # terms
  site/{lang}/{id}.{number}/         # term index, extras
  site/{lang}/{id}.{number}/{NN}/    # one project

Run 'lesson-build gen-config' to generate a documented lesson-build.toml.")]
#[command(version)]
struct Cli {
    /// Config file; missing file means stock defaults
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site: lesson repositories first, output directory last
    Build {
        /// Theme to build with
        #[arg(value_enum)]
        region: Region,

        /// Input repositories followed by the output directory
        #[arg(num_args = 2.., required = true, value_name = "DIR")]
        dirs: Vec<PathBuf>,
    },
    /// Validate manifests without building
    Check {
        /// Input repositories
        #[arg(num_args = 1.., required = true, value_name = "DIR")]
        dirs: Vec<PathBuf>,
    },
    /// Print a stock lesson-build.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Build { region, dirs } => {
            let mut dirs = absolute_all(&dirs)?;
            let Some(output) = dirs.pop() else {
                return Err("missing output directory".into());
            };
            let config = config::load_config(&std::path::absolute(&cli.config)?)?;
            init_thread_pool(&config.processing);
            let cancel = cancel_on_ctrlc()?;

            let request = BuildRequest {
                region,
                inputs: dirs,
                output,
            };
            let renderer = PandocRenderer::from_config(&config.renderer);

            println!(
                "==> Building {} site → {}",
                region.id(),
                request.output.display()
            );
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = spawn_printer(rx);
            let result = pipeline::build(&request, &config, &renderer, Some(&tx), &cancel);
            drop(tx);
            join_printer(printer);

            let summary = result?;
            output::print_build_summary(&summary);
            println!("==> Build complete: {}", summary.root_index.display());
        }
        Command::Check { dirs } => {
            let dirs = absolute_all(&dirs)?;
            let config = config::load_config(&std::path::absolute(&cli.config)?)?;
            let cancel = cancel_on_ctrlc()?;

            let report = pipeline::check(&dirs, &config, None, &cancel)?;
            output::print_check_report(&report);
            if !report.failed.is_empty() {
                return Err(format!("{} manifest(s) failed", report.failed.len()).into());
            }
            println!("==> Manifests are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn absolute_all(dirs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    dirs.iter().map(std::path::absolute).collect()
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores: the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// The first Ctrl-C asks the pipeline to stop at the next unit of work.
fn cancel_on_ctrlc() -> Result<CancelFlag, ctrlc::Error> {
    let cancel = CancelFlag::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("Stopping after the current step...");
        handler.cancel();
    })?;
    Ok(cancel)
}

fn spawn_printer(
    rx: std::sync::mpsc::Receiver<pipeline::BuildEvent>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event) {
                println!("{}", line);
            }
        }
    })
}

fn join_printer(printer: std::thread::JoinHandle<()>) {
    if printer.join().is_err() {
        tracing::error!("progress printer panicked");
    }
}
