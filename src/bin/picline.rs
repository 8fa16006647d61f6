//! picline CLI
//!
//! Convert line-oriented photo exports to zip archives and back.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use picline::{filename, Base64Source, Branch, CodecConfig, Document, Packer, Unpacker};

#[derive(Parser, Debug)]
#[command(name = "picline")]
#[command(version)]
#[command(about = "Photo export <-> zip archive converter")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file overriding codec settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert text exports into zip archives
    Pack {
        /// Export files, or directories searched for .txt exports
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output archive (single input file only)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Directory for generated archives (default: next to each input)
        #[arg(short = 'C', long)]
        directory: Option<PathBuf>,
    },

    /// Rebuild a text export from a zip archive
    Unpack {
        /// Archive to convert
        input: PathBuf,

        /// Output text file (default: <name>_encoded.txt next to the input)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Write the images of a text export into a directory
    #[command(name = "x", visible_alias = "extract")]
    Extract {
        /// Export file to read
        input: PathBuf,

        /// Directory to extract to
        #[arg(short = 'C', long, default_value = "extracted_images")]
        directory: PathBuf,
    },

    /// Show how an archive would be converted back to text
    #[command(name = "t", visible_alias = "list")]
    List {
        /// Archive to inspect
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Pack { inputs, output, directory } => pack(config, &inputs, output, directory),
        Commands::Unpack { input, output } => unpack(config, &input, output),
        Commands::Extract { input, directory } => extract(config, &input, &directory),
        Commands::List { input } => list(config, &input),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CodecConfig> {
    let Some(path) = path else {
        return Ok(CodecConfig::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read config: {}", path.display()))?;
    CodecConfig::from_json(&json).with_context(|| format!("Invalid config: {}", path.display()))
}

fn pack(config: CodecConfig, inputs: &[PathBuf], output: Option<PathBuf>, directory: Option<PathBuf>) -> Result<()> {
    let files = collect_exports(inputs)?;
    if output.is_some() && (files.len() != 1 || inputs[0].is_dir()) {
        bail!("--output requires exactly one input file; use --directory for batches");
    }

    let packer = Packer::with_config(config);
    let mut failures = 0usize;

    for file in &files {
        let target = match (&output, &directory) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(archive_name(file)),
            (None, None) => file.with_file_name(archive_name(file)),
        };

        match pack_one(&packer, file, &target) {
            Ok(()) => {}
            Err(e) if files.len() > 1 => {
                eprintln!("{}: {e:#}", file.display());
                failures += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if failures > 0 {
        bail!("{failures} of {} exports failed", files.len());
    }
    Ok(())
}

fn pack_one(packer: &Packer, input: &Path, target: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read: {}", input.display()))?;
    let outcome = packer
        .pack_text(&bytes)
        .with_context(|| format!("Failed to convert: {}", input.display()))?;

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, &outcome.archive).with_context(|| format!("Failed to write: {}", target.display()))?;

    for rejection in &outcome.rejections {
        eprintln!("  skipped {rejection}");
    }
    println!(
        "Created: {} ({} images, {} errors)",
        target.display(),
        outcome.record_count,
        outcome.error_count
    );
    Ok(())
}

/// Expand directories into the .txt exports they contain
fn collect_exports(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_extension(p, "txt"))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        bail!("No .txt exports found");
    }
    Ok(files)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string())
}

fn archive_name(input: &Path) -> String {
    format!("{}_images.zip", file_stem(input))
}

fn text_name(input: &Path) -> String {
    format!("{}_encoded.txt", file_stem(input).replace("_images", ""))
}

fn unpack(config: CodecConfig, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read: {}", input.display()))?;
    let reconstruction = Unpacker::with_config(config)
        .reconstruct(&bytes)
        .with_context(|| format!("Failed to convert: {}", input.display()))?;

    if reconstruction.branch == Branch::Filenames {
        eprintln!("No manifest found; records rebuilt from image filenames (order and metadata approximated)");
    }
    for name in &reconstruction.skipped {
        eprintln!("  skipped {name}: image missing from archive");
    }

    let target = output.unwrap_or_else(|| input.with_file_name(text_name(input)));
    let lines = reconstruction.lines.len();
    let re_encoded = reconstruction.re_encoded();
    fs::write(&target, reconstruction.into_bytes())
        .with_context(|| format!("Failed to write: {}", target.display()))?;

    println!("Created: {} ({} records, {} re-encoded)", target.display(), lines, re_encoded);
    Ok(())
}

fn extract(config: CodecConfig, input: &Path, directory: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read: {}", input.display()))?;
    let extraction = Document::extract(&bytes, &config);

    let Some(header) = extraction.document.header.as_deref() else {
        bail!("Empty file: {}", input.display());
    };
    println!("Processing: {header}");

    fs::create_dir_all(directory).with_context(|| format!("Failed to create: {}", directory.display()))?;

    let mut extracted = 0usize;
    let mut errors = extraction.error_count();
    for rejection in &extraction.rejections {
        println!("Skipping {rejection}");
    }

    for record in &extraction.document.records {
        let name = filename::safe_name(&record.filename);
        if name.is_empty() {
            println!("Line {}: Skipping - unusable filename '{}'", record.sequence_index, record.filename);
            errors += 1;
            continue;
        }
        let path = directory.join(&name);
        fs::write(&path, &record.image_bytes).with_context(|| format!("Failed to write: {}", path.display()))?;
        extracted += 1;
        println!("Extracted: {name}");
    }

    println!();
    println!("{}", "=".repeat(50));
    println!("Extraction Complete!");
    println!("Total Extracted: {extracted}");
    println!("Errors: {errors}");
    println!("Output Directory: {}", directory.display());
    Ok(())
}

fn list(config: CodecConfig, input: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read: {}", input.display()))?;
    let reconstruction = Unpacker::with_config(config)
        .reconstruct(&bytes)
        .with_context(|| format!("Failed to read archive: {}", input.display()))?;

    let branch = match reconstruction.branch {
        Branch::Manifest => "manifest",
        Branch::Filenames => "filenames",
    };
    println!("source: {branch}");

    for line in &reconstruction.lines {
        let status = match line.source {
            Base64Source::Reused => "original",
            Base64Source::ReEncoded => "re-encoded",
        };
        println!("{}  {}", line.entry, status);
    }
    for name in &reconstruction.skipped {
        println!("{name}  missing");
    }
    Ok(())
}
