//! Batch document processing
//!
//! A [`BatchJob`] holds the documents and the shared configuration of one
//! run. [`BatchProcessor`] turns it into one [`DocumentResult`] per document,
//! in input order. A failing document never stops the batch.
//!
//! Documents are processed sequentially by default. With more than one job
//! they run on a bounded rayon pool; output names are planned before any
//! work starts, so both modes produce the same files.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ExportConfig, OutputFormat, WatermarkConfig, MAX_DPI, MIN_DPI};
use crate::error::{Error, FailureKind, Result};
use crate::export::{self, OutputPlan, OutputPlanner};
use crate::pdf::{build_image_pdf, load_document, stamp_overlay};
use crate::progress::{NoProgress, ProgressObserver};
use crate::render::Rasterizer;
use crate::watermark::PreparedWatermark;

/// Documents plus the configuration they are processed with
#[derive(Debug, Clone)]
pub struct BatchJob {
    documents: Vec<PathBuf>,
    watermark: WatermarkConfig,
    export: ExportConfig,
    output_dir: PathBuf,
    jobs: usize,
}

impl BatchJob {
    /// Create a job, validating the configuration
    pub fn new(
        documents: Vec<PathBuf>,
        watermark: WatermarkConfig,
        export: ExportConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        watermark.validate()?;
        export.validate()?;

        Ok(Self {
            documents,
            watermark,
            export,
            output_dir: output_dir.into(),
            jobs: 1,
        })
    }

    /// Number of documents processed at once; `0` uses every CPU
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn documents(&self) -> &[PathBuf] {
        &self.documents
    }

    pub fn watermark(&self) -> &WatermarkConfig {
        &self.watermark
    }

    pub fn export(&self) -> &ExportConfig {
        &self.export
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Worker threads this job will use
    pub fn worker_count(&self) -> usize {
        let jobs = if self.jobs == 0 { num_cpus::get() } else { self.jobs };
        jobs.clamp(1, self.documents.len().max(1))
    }

    /// Output names for every document, in input order
    ///
    /// Names depend only on the input list and the files already on disk,
    /// never on the order in which documents finish.
    pub fn plan_outputs(&self) -> Vec<OutputPlan> {
        let mut planner = OutputPlanner::new(&self.output_dir, self.export.format, self.export.overwrite);
        self.documents.iter().map(|doc| planner.plan(doc)).collect()
    }
}

/// What happened to one document
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        /// Files written, in page order for image output
        outputs: Vec<PathBuf>,
        pages: usize,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

/// Result of processing one document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentResult {
    pub input: PathBuf,
    pub outcome: Outcome,
}

impl DocumentResult {
    pub fn success(input: PathBuf, outputs: Vec<PathBuf>, pages: usize) -> Self {
        Self {
            input,
            outcome: Outcome::Success { outputs, pages },
        }
    }

    pub fn failure(input: PathBuf, error: &Error) -> Self {
        Self {
            input,
            outcome: Outcome::Failure {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Files written for this document (empty on failure)
    pub fn outputs(&self) -> &[PathBuf] {
        match &self.outcome {
            Outcome::Success { outputs, .. } => outputs,
            Outcome::Failure { .. } => &[],
        }
    }

    /// Failure message, if the document failed
    pub fn message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure { message, .. } => Some(message),
        }
    }

    /// Failure category, if the document failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Runs batch jobs against a [`Rasterizer`]
#[derive(Debug, Clone)]
pub struct BatchProcessor<R> {
    rasterizer: R,
}

impl<R: Rasterizer> BatchProcessor<R> {
    pub fn new(rasterizer: R) -> Self {
        Self { rasterizer }
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Process every document of `job`, returning one result per document in
    /// input order
    pub fn process(&self, job: &BatchJob) -> Vec<DocumentResult> {
        self.process_with(job, &NoProgress)
    }

    /// Like [`process`](Self::process), reporting progress to `observer`
    pub fn process_with(&self, job: &BatchJob, observer: &dyn ProgressObserver) -> Vec<DocumentResult> {
        if job.documents.is_empty() {
            return Vec::new();
        }

        let workers = job.worker_count();
        info!(
            documents = job.documents.len(),
            workers,
            format = %job.export.format,
            flatten = job.export.flatten,
            "starting batch"
        );

        if let Err(e) = fs::create_dir_all(&job.output_dir) {
            let error = Error::write(&job.output_dir, e);
            warn!(error = %error, "cannot create output directory");
            return fail_all(job, &error, observer);
        }

        // Assets are loaded once; a bad asset fails every document the same way
        let watermark = match PreparedWatermark::prepare(&job.watermark) {
            Ok(prepared) => prepared,
            Err(error) => {
                warn!(error = %error, "cannot prepare watermark");
                return fail_all(job, &error, observer);
            }
        };
        if let Some(prepared) = &watermark {
            debug!(watermark = ?prepared, "watermark prepared");
        }

        let plans = job.plan_outputs();

        let run = |index: usize| -> DocumentResult {
            let input = &job.documents[index];
            observer.document_started(index, input);

            let result = match self.process_document(index, input, &plans[index], job, watermark.as_ref(), observer) {
                Ok((outputs, pages)) => {
                    info!(input = %input.display(), pages, files = outputs.len(), "document done");
                    DocumentResult::success(input.clone(), outputs, pages)
                }
                Err(error) => {
                    warn!(input = %input.display(), kind = %error.kind(), error = %error, "document failed");
                    DocumentResult::failure(input.clone(), &error)
                }
            };

            observer.document_finished(index, &result);
            result
        };

        let count = job.documents.len();
        if workers <= 1 {
            return (0..count).map(&run).collect();
        }

        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| (0..count).into_par_iter().map(&run).collect()),
            Err(e) => {
                warn!(error = %e, "cannot start worker pool, processing sequentially");
                (0..count).map(&run).collect()
            }
        }
    }

    /// Render one page with the watermark applied, for display only
    ///
    /// The source document is only read. With `max_width`, wider pages are
    /// scaled down keeping their aspect ratio.
    pub fn preview(
        &self,
        document: &Path,
        watermark: &WatermarkConfig,
        page_index: usize,
        dpi: u32,
        max_width: Option<u32>,
    ) -> Result<RgbaImage> {
        watermark.validate()?;
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(Error::InvalidConfig(format!(
                "dpi must be between {} and {}, got {}",
                MIN_DPI, MAX_DPI, dpi
            )));
        }
        if !document.exists() {
            return Err(Error::not_found(document));
        }

        let mut page = self.rasterizer.render_page(document, page_index, dpi)?;
        if let Some(prepared) = PreparedWatermark::prepare(watermark)? {
            prepared.apply(&mut page.image);
        }

        let image = match max_width {
            Some(max) if max > 0 && page.image.width() > max => {
                let height = ((page.image.height() as f64 * max as f64 / page.image.width() as f64)
                    .round() as u32)
                    .max(1);
                image::imageops::resize(&page.image, max, height, FilterType::Triangle)
            }
            _ => page.image,
        };

        debug!(
            document = %document.display(),
            page = page_index + 1,
            width = image.width(),
            height = image.height(),
            "rendered preview"
        );
        Ok(image)
    }

    fn process_document(
        &self,
        index: usize,
        input: &Path,
        plan: &OutputPlan,
        job: &BatchJob,
        watermark: Option<&PreparedWatermark>,
        observer: &dyn ProgressObserver,
    ) -> Result<(Vec<PathBuf>, usize)> {
        if !input.exists() {
            return Err(Error::not_found(input));
        }

        if job.export.rasterizes() {
            self.export_raster(index, input, plan, &job.export, watermark, observer)
        } else {
            export_vector(index, input, plan, &job.export, watermark, observer)
        }
    }

    /// Rasterize, watermark and encode every page
    fn export_raster(
        &self,
        index: usize,
        input: &Path,
        plan: &OutputPlan,
        settings: &ExportConfig,
        watermark: Option<&PreparedWatermark>,
        observer: &dyn ProgressObserver,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let mut outputs = Vec::new();
        let mut pdf_pages = Vec::new();
        let mut page_total = 0;

        let rendered = self.rasterizer.render_pages(input, settings.dpi, &mut |mut page, total| {
            page_total = total;
            if let Some(prepared) = watermark {
                prepared.apply(&mut page.image);
            }

            match settings.format {
                OutputFormat::Pdf => {
                    pdf_pages.push(export::jpeg_page(&page.image, settings.dpi, settings.quality)?);
                }
                OutputFormat::Png | OutputFormat::Jpeg => {
                    let bytes = export::encode_image(&page.image, settings)?;
                    let path = plan.page_path(page.index);
                    export::write_atomic(&path, &bytes)?;
                    outputs.push(path);
                }
            }

            observer.page_done(index, page.index, total);
            Ok(())
        });

        if let Err(error) = rendered {
            export::discard(&outputs);
            return Err(error);
        }
        if page_total == 0 {
            return Err(Error::open(input, "document has no pages"));
        }

        if settings.format == OutputFormat::Pdf {
            let path = plan.document_path();
            let mut doc = build_image_pdf(&pdf_pages);
            export::save_document(&mut doc, &path)?;
            outputs.push(path);
        }

        Ok((outputs, page_total))
    }
}

/// Keep vector content and stamp the watermark over each page
fn export_vector(
    index: usize,
    input: &Path,
    plan: &OutputPlan,
    settings: &ExportConfig,
    watermark: Option<&PreparedWatermark>,
    observer: &dyn ProgressObserver,
) -> Result<(Vec<PathBuf>, usize)> {
    let mut doc = load_document(input)?;
    let pages = doc.get_pages().len();
    if pages == 0 {
        return Err(Error::open(input, "document has no pages"));
    }

    if let Some(prepared) = watermark {
        stamp_overlay(&mut doc, settings.dpi, |width, height| prepared.overlay(width, height))?;
    }
    for page in 0..pages {
        observer.page_done(index, page, pages);
    }

    doc.compress();
    let path = plan.document_path();
    export::save_document(&mut doc, &path)?;
    Ok((vec![path], pages))
}

fn fail_all(job: &BatchJob, error: &Error, observer: &dyn ProgressObserver) -> Vec<DocumentResult> {
    job.documents
        .iter()
        .enumerate()
        .map(|(index, input)| {
            observer.document_started(index, input);
            let result = DocumentResult::failure(input.clone(), error);
            observer.document_finished(index, &result);
            result
        })
        .collect()
}
