//! PDF Flattener CLI tool
//!
//! A command-line tool for flattening and watermarking PDFs in batches.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use pdf_flattener::batch::{BatchJob, BatchProcessor, DocumentResult, Outcome};
use pdf_flattener::config::{
    Color, ExportConfig, ImageMark, OutputFormat, Padding, Placement, PngCompression, TextMark,
    Tiling, WatermarkConfig, WatermarkSource,
};
use pdf_flattener::export::{encode_jpeg, encode_png, write_atomic};
use pdf_flattener::pdf::extract_metadata;
use pdf_flattener::progress::ProgressObserver;
use pdf_flattener::render::PdfiumRasterizer;

/// Exit status when at least one document failed
const EXIT_DOCUMENT_FAILED: i32 = 2;

/// Exit status for usage and configuration errors
const EXIT_USAGE: i32 = 1;

/// Quality of JPEG previews
const PREVIEW_JPEG_QUALITY: u8 = 70;

/// PDF Flattener - Flatten and watermark PDFs in batches
#[derive(Parser)]
#[command(name = "pdf-flattener")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Flatten every PDF in the folder with the default CONFIDENTIAL watermark
    pdf-flattener flatten \"*.pdf\"

    # Diagonal DRAFT watermark at half opacity, four documents at a time
    pdf-flattener flatten --text DRAFT --opacity 0.5 --rotation 45 --jobs 4 *.pdf

    # One logo in the bottom-right corner, pages exported as PNG
    pdf-flattener flatten --image logo.png --tiling single --placement bottom-right --format png report.pdf

    # Keep text selectable, only stamp the watermark
    pdf-flattener flatten --no-flatten --text INTERNAL contract.pdf

    # Check how page 3 will look
    pdf-flattener preview report.pdf --page 3 -o preview.jpg --open")]
struct Cli {
    /// Directory containing the PDFium shared library (default: system library path)
    #[arg(long, global = true, value_name = "DIR")]
    pdfium_lib: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten and watermark PDF files
    Flatten {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output directory (created if missing)
        #[arg(short, long, default_value = "flattened")]
        output_dir: PathBuf,

        #[command(flatten)]
        watermark: WatermarkArgs,

        /// Keep vector content and stamp the watermark on top (PDF output only)
        #[arg(long)]
        no_flatten: bool,

        /// Output format: pdf, png or jpeg
        #[arg(long, default_value = "pdf")]
        format: OutputFormat,

        /// Rendering resolution
        #[arg(long, default_value_t = 150)]
        dpi: u32,

        /// JPEG quality (1-100), also used for page images inside PDFs
        #[arg(long, default_value_t = 85)]
        quality: u8,

        /// PNG compression: fast, default or best
        #[arg(long, default_value = "default")]
        png_compression: PngCompression,

        /// Replace existing output files instead of picking a new name
        #[arg(long)]
        overwrite: bool,

        /// Documents processed at once (0 = one per CPU)
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Open the output directory when done
        #[arg(long)]
        open: bool,
    },

    /// Render one watermarked page to an image
    Preview {
        /// Input PDF file
        input: PathBuf,

        /// Output image (.png, otherwise JPEG)
        #[arg(short, long, default_value = "preview.jpg")]
        output: PathBuf,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Rendering resolution
        #[arg(long, default_value_t = 150)]
        dpi: u32,

        /// Scale the preview down to at most this width in pixels (0 = no limit)
        #[arg(long, default_value_t = 1000)]
        max_width: u32,

        #[command(flatten)]
        watermark: WatermarkArgs,

        /// Open the preview after creation
        #[arg(long)]
        open: bool,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

/// Watermark options shared by `flatten` and `preview`
#[derive(Args)]
struct WatermarkArgs {
    /// Do not draw a watermark
    #[arg(long)]
    no_watermark: bool,

    /// Watermark text
    #[arg(long, default_value = "CONFIDENTIAL")]
    text: String,

    /// Use an image file (PNG, JPEG, WebP, GIF, BMP) instead of text
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Opacity from 0.0 (invisible) to 1.0 (opaque)
    #[arg(long, default_value_t = 120.0 / 255.0)]
    opacity: f32,

    /// Counter-clockwise rotation in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    rotation: f32,

    /// Layout: single or tiled
    #[arg(long, default_value = "tiled")]
    tiling: Tiling,

    /// Gap between tiles or margin from the edge: pixels ("24px") or percent of mark height ("50%")
    #[arg(long, default_value = "50%")]
    padding: Padding,

    /// Anchor of a single watermark (e.g. center, top-left, bottom-right)
    #[arg(long, default_value = "center")]
    placement: Placement,

    /// Text size in percent of the page width
    #[arg(long, default_value_t = 10.0)]
    size: f32,

    /// Image width in percent of the page width
    #[arg(long, default_value_t = 30.0)]
    scale: f32,

    /// Text colour as #rgb or #rrggbb
    #[arg(long, default_value = "#b4b4b4")]
    color: Color,

    /// Font file for the text (default: a system sans font)
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,
}

impl WatermarkArgs {
    fn to_config(&self) -> WatermarkConfig {
        let source = match &self.image {
            Some(path) => WatermarkSource::Image(ImageMark {
                path: path.clone(),
                scale_pct: self.scale,
            }),
            None => WatermarkSource::Text(TextMark {
                text: self.text.clone(),
                size_pct: self.size,
                color: self.color,
                font: self.font.clone(),
            }),
        };

        WatermarkConfig {
            enabled: !self.no_watermark,
            source,
            opacity: self.opacity,
            rotation: self.rotation,
            tiling: self.tiling,
            padding: self.padding,
            placement: self.placement,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(usage_exit_code(&e));
        }
    };

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        process::exit(EXIT_USAGE);
    }

    let rasterizer = match &cli.pdfium_lib {
        Some(dir) => PdfiumRasterizer::from_dir(dir),
        None => PdfiumRasterizer::system(),
    };

    let result = match cli.command {
        Commands::Flatten {
            inputs, output_dir, watermark, no_flatten, format, dpi, quality,
            png_compression, overwrite, jobs, open,
        } => {
            let export = ExportConfig {
                format,
                dpi,
                quality,
                png_compression,
                flatten: !no_flatten,
                overwrite,
            };
            cmd_flatten(rasterizer, inputs, output_dir, watermark.to_config(), export, jobs, open)
        }
        Commands::Preview {
            input, output, page, dpi, max_width, watermark, open,
        } => {
            cmd_preview(rasterizer, input, output, page, dpi, max_width, watermark.to_config(), open)
                .map(|_| 0)
        }
        Commands::Info { input } => cmd_info(input).map(|_| 0),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(EXIT_USAGE);
        }
    }
}

/// `--help` and `--version` succeed; anything else clap rejects is a usage error
fn usage_exit_code(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        EXIT_USAGE
    } else {
        0
    }
}

/// Set up the tracing subscriber
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

/// Expand glob patterns in input paths
///
/// Pattern order is kept; within a pattern, matches are sorted. A file named
/// more than once is only processed the first time.
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        let mut matches = if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = Vec::new();
            for entry in glob(&pattern).with_context(|| format!("invalid pattern: {}", pattern))? {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => eprintln!("Warning: glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                bail!("No files matched pattern: {}", pattern);
            }
            matched.sort();
            matched
        } else {
            // No glob characters, treat as literal path
            vec![PathBuf::from(pattern)]
        };

        matches.retain(|path| !paths.contains(path));
        paths.extend(matches);
    }

    Ok(paths)
}

/// Open a file or folder with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Progress bar over the documents of a batch, printing one line per file
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(documents: usize) -> Self {
        let bar = ProgressBar::new(documents as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl ProgressObserver for CliProgress {
    fn document_started(&self, _index: usize, path: &Path) {
        self.bar.set_message(display_name(path));
    }

    fn page_done(&self, _index: usize, _page: usize, _total_pages: usize) {
        self.bar.tick();
    }

    fn document_finished(&self, _index: usize, result: &DocumentResult) {
        self.bar.println(status_line(result));
        self.bar.inc(1);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn status_line(result: &DocumentResult) -> String {
    let name = display_name(&result.input);
    match &result.outcome {
        Outcome::Success { outputs, pages } => {
            let target = match outputs.as_slice() {
                [single] => single.display().to_string(),
                many => format!("{} files", many.len()),
            };
            format!("✓ {} ({} pages) -> {}", name, pages, target)
        }
        Outcome::Failure { kind, message } => format!("✗ {} [{}] {}", name, kind, message),
    }
}

/// Flatten and watermark a batch of PDFs
fn cmd_flatten(
    rasterizer: PdfiumRasterizer,
    inputs: Vec<String>,
    output_dir: PathBuf,
    watermark: WatermarkConfig,
    export: ExportConfig,
    jobs: usize,
    open: bool,
) -> Result<i32> {
    // Expand glob patterns
    let inputs = expand_globs(inputs)?;

    let job = BatchJob::new(inputs, watermark, export, &output_dir)?.with_jobs(jobs);

    // Vector stamping never touches PDFium
    if job.export().rasterizes() {
        rasterizer.check()?;
    }

    eprintln!(
        "Processing {} PDF files ({} at a time)...",
        job.documents().len(),
        job.worker_count()
    );

    let progress = CliProgress::new(job.documents().len());
    let results = BatchProcessor::new(rasterizer).process_with(&job, &progress);
    progress.bar.finish_and_clear();

    let failed = results.iter().filter(|r| !r.is_success()).count();
    let succeeded = results.len() - failed;
    eprintln!("Done: {} succeeded, {} failed", succeeded, failed);
    if failed > 0 {
        for result in results.iter().filter(|r| !r.is_success()) {
            eprintln!("  {}", status_line(result));
        }
    }
    eprintln!("Output: {}", output_dir.display());

    if open && succeeded > 0 {
        open_file(&output_dir)?;
    }

    Ok(if failed > 0 { EXIT_DOCUMENT_FAILED } else { 0 })
}

/// Render a watermarked preview of one page
#[allow(clippy::too_many_arguments)]
fn cmd_preview(
    rasterizer: PdfiumRasterizer,
    input: PathBuf,
    output: PathBuf,
    page: usize,
    dpi: u32,
    max_width: u32,
    watermark: WatermarkConfig,
    open: bool,
) -> Result<()> {
    if page == 0 {
        bail!("Page numbers start at 1");
    }

    let processor = BatchProcessor::new(rasterizer);
    let max_width = (max_width > 0).then_some(max_width);
    let image = processor.preview(&input, &watermark, page - 1, dpi, max_width)?;

    let is_png = output
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false);
    let bytes = if is_png {
        encode_png(&image, PngCompression::Fast)?
    } else {
        encode_jpeg(&image, PREVIEW_JPEG_QUALITY)?
    };
    write_atomic(&output, &bytes)?;

    eprintln!("Preview: {} ({}x{})", output.display(), image.width(), image.height());

    if open {
        open_file(&output)?;
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    let metadata = extract_metadata(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }
    if let Some(first) = metadata.page_boxes.first() {
        let uniform = metadata.page_boxes.iter().all(|b| b.width == first.width && b.height == first.height);
        let suffix = if uniform { "" } else { " (first page; sizes vary)" };
        println!("Page size: {} x {} pt{}", first.width, first.height, suffix);
    }

    Ok(())
}
