//! Integration tests for the PDF flattener library

mod common;

use std::fs;
use std::path::PathBuf;

use lopdf::Document;
use tempfile::TempDir;

use common::{logo_watermark, sample_pdf, write_logo, write_pdf, TestRasterizer};
use pdf_flattener::batch::{BatchJob, BatchProcessor, DocumentResult};
use pdf_flattener::config::{
    ExportConfig, OutputFormat, TextMark, WatermarkConfig, WatermarkSource,
};
use pdf_flattener::pdf::{count_pages, extract_metadata, page_box, stamp::STAMP_NAME};
use pdf_flattener::watermark::find_system_font;
use pdf_flattener::FailureKind;

fn export(format: OutputFormat) -> ExportConfig {
    ExportConfig {
        format,
        dpi: 72,
        ..ExportConfig::default()
    }
}

fn run(job: &BatchJob) -> Vec<DocumentResult> {
    BatchProcessor::new(TestRasterizer::default()).process(job)
}

fn read_outputs(result: &DocumentResult) -> Vec<Vec<u8>> {
    result
        .outputs()
        .iter()
        .map(|p| fs::read(p).expect("output missing"))
        .collect()
}

#[test]
fn test_missing_document_between_good_ones() {
    let dir = TempDir::new().unwrap();
    let a = sample_pdf(&dir, "A.pdf", 2);
    let b = sample_pdf(&dir, "B.pdf", 1);
    let missing = dir.path().join("missing.pdf");
    let out = dir.path().join("out");

    let watermark = logo_watermark(write_logo(&dir), 0.5);
    let job = BatchJob::new(vec![a.clone(), missing.clone(), b.clone()], watermark, export(OutputFormat::Pdf), &out).unwrap();
    let results = run(&job);

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].input, a);
    assert_eq!(results[1].input, missing);
    assert_eq!(results[2].input, b);

    assert_eq!(results[0].outputs(), &[out.join("A_flattened.pdf")]);
    assert_eq!(count_pages(&out.join("A_flattened.pdf")).unwrap(), 2);

    assert_eq!(results[1].failure_kind(), Some(FailureKind::FileOpen));
    assert!(results[1].message().unwrap().contains("file not found"));

    assert_eq!(results[2].outputs(), &[out.join("B_flattened.pdf")]);
    assert_eq!(count_pages(&out.join("B_flattened.pdf")).unwrap(), 1);
}

#[test]
fn test_draft_text_watermark() {
    if find_system_font().is_none() {
        eprintln!("Skipping text watermark test: no system font installed");
        return;
    }

    let dir = TempDir::new().unwrap();
    let a = sample_pdf(&dir, "A.pdf", 1);
    let missing = dir.path().join("missing.pdf");
    let b = sample_pdf(&dir, "B.pdf", 1);
    let out = dir.path().join("out");

    let watermark = WatermarkConfig {
        source: WatermarkSource::Text(TextMark {
            text: "DRAFT".to_string(),
            size_pct: 20.0,
            color: pdf_flattener::config::Color::new(255, 0, 0),
            font: None,
        }),
        opacity: 0.5,
        ..WatermarkConfig::default()
    };
    let job = BatchJob::new(vec![a, missing, b], watermark, export(OutputFormat::Png), &out).unwrap();
    let results = run(&job);

    assert!(results[0].is_success());
    assert!(!results[1].is_success());
    assert!(results[1].message().unwrap().contains("file not found"));
    assert!(results[2].is_success());

    // Some pixel of the white page area picked up the red mark
    let page = image::open(out.join("A_001.png")).unwrap().to_rgb8();
    assert!(page.pixels().any(|p| p[0] > 200 && p[1] < 200 && p[2] < 200));
}

#[test]
fn test_zero_opacity_matches_unwatermarked_output() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "doc.pdf", 2);
    let logo = write_logo(&dir);

    for format in [OutputFormat::Pdf, OutputFormat::Png, OutputFormat::Jpeg] {
        let plain = BatchJob::new(vec![doc.clone()], WatermarkConfig::disabled(), export(format), dir.path().join(format!("plain-{}", format))).unwrap();
        let invisible = BatchJob::new(vec![doc.clone()], logo_watermark(logo.clone(), 0.0), export(format), dir.path().join(format!("zero-{}", format))).unwrap();

        let plain = run(&plain);
        let invisible = run(&invisible);
        assert!(plain[0].is_success() && invisible[0].is_success());
        assert_eq!(read_outputs(&plain[0]), read_outputs(&invisible[0]), "format {}", format);
    }
}

#[test]
fn test_visible_watermark_changes_output() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "doc.pdf", 1);

    let plain = BatchJob::new(vec![doc.clone()], WatermarkConfig::disabled(), export(OutputFormat::Png), dir.path().join("plain")).unwrap();
    let marked = BatchJob::new(vec![doc], logo_watermark(write_logo(&dir), 1.0), export(OutputFormat::Png), dir.path().join("marked")).unwrap();

    assert_ne!(read_outputs(&run(&plain)[0]), read_outputs(&run(&marked)[0]));
}

#[test]
fn test_repeated_runs_are_identical() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "doc.pdf", 3);
    let logo = write_logo(&dir);

    let mut watermark = logo_watermark(logo, 0.6);
    watermark.rotation = 30.0;

    let first = BatchJob::new(vec![doc.clone()], watermark.clone(), export(OutputFormat::Pdf), dir.path().join("first")).unwrap();
    let second = BatchJob::new(vec![doc], watermark, export(OutputFormat::Pdf), dir.path().join("second")).unwrap();

    assert_eq!(read_outputs(&run(&first)[0]), read_outputs(&run(&second)[0]));
}

#[test]
fn test_flattened_pdf_keeps_page_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.pdf");
    write_pdf(&path, &[(612, 792), (842, 595)]);
    let out = dir.path().join("out");

    let job = BatchJob::new(vec![path], WatermarkConfig::disabled(), export(OutputFormat::Pdf), &out).unwrap();
    let results = run(&job);
    assert!(results[0].is_success());

    let doc = Document::load(out.join("mixed_flattened.pdf")).unwrap();
    let sizes: Vec<(f32, f32)> = doc
        .get_pages()
        .values()
        .map(|id| {
            let page = page_box(&doc, *id);
            (page.width, page.height)
        })
        .collect();
    assert_eq!(sizes, vec![(612.0, 792.0), (842.0, 595.0)]);
}

#[test]
fn test_parallel_matches_sequential() {
    let dir = TempDir::new().unwrap();
    let mut docs: Vec<PathBuf> = (0..6)
        .map(|i| sample_pdf(&dir, &format!("doc{}.pdf", i), 1 + i % 3))
        .collect();
    docs.insert(3, dir.path().join("gone.pdf"));
    let logo = write_logo(&dir);

    let sequential = BatchJob::new(docs.clone(), logo_watermark(logo.clone(), 0.4), export(OutputFormat::Png), dir.path().join("seq")).unwrap();
    let parallel = BatchJob::new(docs.clone(), logo_watermark(logo, 0.4), export(OutputFormat::Png), dir.path().join("par"))
        .unwrap()
        .with_jobs(3);
    assert_eq!(parallel.worker_count(), 3);

    let sequential = run(&sequential);
    let parallel = run(&parallel);

    assert_eq!(parallel.len(), docs.len());
    for (index, (seq, par)) in sequential.iter().zip(&parallel).enumerate() {
        assert_eq!(par.input, docs[index]);
        assert_eq!(seq.is_success(), par.is_success());
        assert_eq!(read_outputs(seq), read_outputs(par));
        let names = |r: &DocumentResult| -> Vec<_> {
            r.outputs().iter().map(|p| p.file_name().unwrap().to_owned()).collect()
        };
        assert_eq!(names(seq), names(par));
    }
    assert_eq!(parallel[3].failure_kind(), Some(FailureKind::FileOpen));
}

#[test]
fn test_output_collisions_get_suffixes() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("x")).unwrap();
    fs::create_dir(dir.path().join("y")).unwrap();
    let first = dir.path().join("x").join("report.pdf");
    let second = dir.path().join("y").join("report.pdf");
    write_pdf(&first, &[(100, 100)]);
    write_pdf(&second, &[(100, 100)]);

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    fs::write(out.join("report_flattened.pdf"), b"keep me").unwrap();

    let job = BatchJob::new(vec![first.clone(), second.clone()], WatermarkConfig::disabled(), export(OutputFormat::Pdf), &out).unwrap();
    let results = run(&job);

    assert_eq!(results[0].outputs(), &[out.join("report_flattened_2.pdf")]);
    assert_eq!(results[1].outputs(), &[out.join("report_flattened_3.pdf")]);
    assert_eq!(fs::read(out.join("report_flattened.pdf")).unwrap(), b"keep me");

    // With overwrite the existing file is replaced, batch names stay unique
    let overwrite = ExportConfig {
        overwrite: true,
        ..export(OutputFormat::Pdf)
    };
    let job = BatchJob::new(vec![first, second], WatermarkConfig::disabled(), overwrite, &out).unwrap();
    let results = run(&job);
    assert_eq!(results[0].outputs(), &[out.join("report_flattened.pdf")]);
    assert_eq!(results[1].outputs(), &[out.join("report_flattened_2.pdf")]);
    assert_eq!(count_pages(&out.join("report_flattened.pdf")).unwrap(), 1);
}

#[test]
fn test_jpeg_pages_of_transparent_render_are_white() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "clear.pdf", 2);
    let out = dir.path().join("out");

    let job = BatchJob::new(vec![doc], WatermarkConfig::disabled(), export(OutputFormat::Jpeg), &out).unwrap();
    let results = BatchProcessor::new(TestRasterizer { transparent: true }).process(&job);

    assert_eq!(
        results[0].outputs(),
        &[out.join("clear_001.jpeg"), out.join("clear_002.jpeg")]
    );
    let page = image::open(out.join("clear_002.jpeg")).unwrap().to_rgb8();
    let (width, height) = page.dimensions();
    let bottom = page.get_pixel(width / 2, height - 2);
    assert!(bottom.0.iter().all(|c| *c > 245), "expected white, got {:?}", bottom);
}

#[test]
fn test_preview_leaves_source_untouched() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "doc.pdf", 3);
    let before = fs::read(&doc).unwrap();

    let processor = BatchProcessor::new(TestRasterizer::default());
    let watermark = logo_watermark(write_logo(&dir), 0.8);
    let image = processor.preview(&doc, &watermark, 2, 144, Some(200)).unwrap();

    assert_eq!(image.dimensions(), (200, 133));
    assert_eq!(fs::read(&doc).unwrap(), before);

    let err = processor.preview(&doc, &watermark, 7, 144, None).unwrap_err();
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn test_no_flatten_stamps_vector_pages() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "vector.pdf", 2);
    let before = fs::read(&doc).unwrap();
    let out = dir.path().join("out");

    let settings = ExportConfig {
        flatten: false,
        ..export(OutputFormat::Pdf)
    };
    let job = BatchJob::new(vec![doc.clone()], logo_watermark(write_logo(&dir), 0.5), settings, &out).unwrap();
    let results = run(&job);
    assert!(results[0].is_success(), "{:?}", results[0]);
    assert_eq!(fs::read(&doc).unwrap(), before);

    let stamped = Document::load(out.join("vector_flattened.pdf")).unwrap();
    assert_eq!(stamped.get_pages().len(), 2);
    for page_id in stamped.get_pages().values() {
        let page = stamped.get_dictionary(*page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.get(b"Font").is_ok(), "fonts lost");
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert!(xobjects.has(STAMP_NAME.as_bytes()));
    }
}

#[test]
fn test_no_flatten_without_watermark_copies_pages() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "vector.pdf", 3);
    let out = dir.path().join("out");

    let settings = ExportConfig {
        flatten: false,
        ..export(OutputFormat::Pdf)
    };
    let job = BatchJob::new(vec![doc], WatermarkConfig::disabled(), settings, &out).unwrap();
    let results = run(&job);
    assert!(results[0].is_success());

    let meta = extract_metadata(&out.join("vector_flattened.pdf")).unwrap();
    assert_eq!(meta.page_count, 3);
}

#[test]
fn test_corrupt_and_empty_documents_fail_alone() {
    let dir = TempDir::new().unwrap();
    let corrupt = dir.path().join("corrupt.pdf");
    fs::write(&corrupt, b"%PDF-1.4\ngarbage").unwrap();
    let empty = dir.path().join("empty.pdf");
    write_pdf(&empty, &[]);
    let good = sample_pdf(&dir, "good.pdf", 1);

    let job = BatchJob::new(vec![corrupt, empty, good], WatermarkConfig::disabled(), export(OutputFormat::Pdf), dir.path().join("out")).unwrap();
    let results = run(&job);

    assert_eq!(results[0].failure_kind(), Some(FailureKind::FileOpen));
    assert_eq!(results[1].failure_kind(), Some(FailureKind::FileOpen));
    assert!(results[2].is_success());
}

#[test]
fn test_unwritable_output_directory() {
    let dir = TempDir::new().unwrap();
    let doc = sample_pdf(&dir, "doc.pdf", 1);
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"file").unwrap();

    let job = BatchJob::new(vec![doc.clone(), doc], WatermarkConfig::disabled(), export(OutputFormat::Pdf), &blocker).unwrap();
    let results = run(&job);

    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.failure_kind() == Some(FailureKind::Write)));
}

#[test]
fn test_metadata_of_generated_pdf() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.pdf");
    write_pdf(&path, &[(595, 842), (595, 842)]);

    let meta = extract_metadata(&path).unwrap();
    assert_eq!(meta.page_count, 2);
    assert_eq!(meta.title, None);
    assert_eq!(meta.page_boxes.len(), 2);
    assert_eq!(meta.page_boxes[0].width, 595.0);
}
