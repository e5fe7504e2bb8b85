// ============================================================================
// Strata CLI: headless project tools
// ============================================================================
//
// Usage examples:
//   strata render scene.strata -o flat.png            (CPU compositor)
//   strata render scene.strata -o flat.png --gpu      (wgpu, CPU fallback)
//   strata info scene.strata
//   strata new-from-image photo.png -o photo.strata
//   strata write-brushes brushes/
//
// Everything runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use strata::brush::BrushLibrary;
use strata::compositor;
use strata::config::EditorConfig;
use strata::document::{Document, NodeKind};
use strata::error::PersistenceError;
use strata::gpu::GpuRenderer;
use strata::project::{self, ImportedImage, ImportedLayer};
use strata::surface::unpremultiply;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Strata headless project tools.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Strata layered image editor: headless project tools")]
pub struct CliArgs {
    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Flatten a .strata project into a PNG.
    Render {
        input: PathBuf,
        #[arg(short, long, value_name = "FILE.png")]
        output: PathBuf,
        /// Composite on the GPU when an adapter is available.
        #[arg(long)]
        gpu: bool,
    },
    /// Print a project's layer tree.
    Info { input: PathBuf },
    /// Wrap an image file in a new single-layer project.
    NewFromImage {
        input: PathBuf,
        #[arg(short, long, value_name = "FILE.strata")]
        output: Option<PathBuf>,
    },
    /// Write the built-in brush presets to a directory.
    WriteBrushes { dir: PathBuf },
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one subcommand and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let config = match &args.config {
        Some(path) => match EditorConfig::load_from(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: could not read settings '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EditorConfig::load(),
    };

    let start = Instant::now();
    let result = match args.command {
        Command::Render { input, output, gpu } => render(&input, &output, gpu, &config),
        Command::Info { input } => info(&input),
        Command::NewFromImage { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension(project::PROJECT_EXTENSION));
            new_from_image(&input, &output)
        }
        Command::WriteBrushes { dir } => write_brushes(&dir),
    };

    match result {
        Ok(()) => {
            if args.verbose {
                println!("done in {:.0}ms", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(msg) => {
            log::error!("{}", msg);
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn load_project(path: &Path) -> Result<Document, String> {
    project::load(path).map_err(|e| format!("could not open '{}': {}", path.display(), e))
}

fn render(input: &Path, output: &Path, gpu: bool, config: &EditorConfig) -> Result<(), String> {
    let mut doc = load_project(input)?;

    let renderer = if gpu { GpuRenderer::from_config(config) } else { None };
    let flat = match renderer {
        Some(mut r) => match r.composite(&mut doc) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("[GPU] composite failed, using the CPU: {}", e);
                compositor::composite(&doc)
            }
        },
        None => compositor::composite(&doc),
    };

    unpremultiply(&flat)
        .save(output)
        .map_err(|e| format!("could not write '{}': {}", output.display(), e))?;
    println!("{} -> {} ({}x{})", input.display(), output.display(), doc.width(), doc.height());
    Ok(())
}

fn info(input: &Path) -> Result<(), String> {
    let doc = load_project(input)?;
    println!("{}  {}x{}", input.display(), doc.width(), doc.height());
    for entry in doc.walk().into_iter().skip(1) {
        let Some(node) = doc.get(entry.id) else { continue };
        let indent = "  ".repeat(entry.depth);
        let hidden = if node.visible() { "" } else { " (hidden)" };
        let extra = match node.kind() {
            NodeKind::Text { style, .. } => format!(" \"{}\"", style.text),
            _ => String::new(),
        };
        println!(
            "{}{} [{}] opacity {:.2}{}{}",
            indent,
            node.name(),
            entry.layer_type.as_str(),
            node.opacity(),
            hidden,
            extra
        );
    }
    Ok(())
}

fn new_from_image(input: &Path, output: &Path) -> Result<(), String> {
    let pixels = image::open(input)
        .map_err(|e| format!("could not read '{}': {}", input.display(), e))?
        .to_rgba8();
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Layer".to_string());
    let imported = ImportedImage {
        width: pixels.width(),
        height: pixels.height(),
        layers: vec![ImportedLayer::Paint {
            name,
            visible: true,
            opacity: 1.0,
            offset: (0, 0),
            pixels,
        }],
    };
    let doc = project::adopt(imported).map_err(|e: PersistenceError| e.to_string())?;
    project::save(&doc, output).map_err(|e| format!("could not save '{}': {}", output.display(), e))?;
    println!("{} -> {}", input.display(), output.display());
    Ok(())
}

fn write_brushes(dir: &Path) -> Result<(), String> {
    let count = BrushLibrary::write_defaults(dir)
        .map_err(|e| format!("could not write brushes to '{}': {}", dir.display(), e))?;
    println!("wrote {} brushes to {}", count, dir.display());
    Ok(())
}
