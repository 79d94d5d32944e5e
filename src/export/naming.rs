//! Output file naming and collision handling

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::OutputFormat;

/// Suffix added to the stem of flattened PDF output
const PDF_SUFFIX: &str = "_flattened";

/// Where one document's output goes
///
/// PDF output is a single file named `<base>.pdf`. Image output is one file
/// per page named `<base>_<NNN>.<ext>`, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    dir: PathBuf,
    base: String,
    format: OutputFormat,
}

impl OutputPlan {
    /// Name shared by every file of this document, without extension
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path of the single output file (PDF output)
    pub fn document_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.base, self.format.extension()))
    }

    /// Path of the file for zero-based `page_index` (image output)
    pub fn page_path(&self, page_index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}_{:03}.{}",
            self.base,
            page_index + 1,
            self.format.extension()
        ))
    }

    /// Whether `file_name` is one of the files this plan would write
    fn owns(&self, file_name: &str) -> bool {
        let ext = self.format.extension();
        if !self.format.is_per_page() {
            return file_name
                .strip_prefix(self.base.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                == Some(ext);
        }

        let number = file_name
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix(ext))
            .and_then(|rest| rest.strip_suffix('.'));
        match number {
            Some(digits) => digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }
}

/// Hands out output names for the documents of one batch, in input order
///
/// A name is taken if an earlier document of the batch already got it, or
/// (unless overwriting) if any file it would write exists on disk: for page
/// images that is any `<base>_<NNN>.<ext>`, not only the first page. Taken
/// names get `_2`, `_3`, ... appended to the base.
#[derive(Debug)]
pub struct OutputPlanner {
    dir: PathBuf,
    format: OutputFormat,
    reserved: HashSet<String>,
    /// File names already in the output directory; empty when overwriting
    existing: Vec<String>,
}

impl OutputPlanner {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat, overwrite: bool) -> Self {
        let dir = dir.into();
        let existing = if overwrite { Vec::new() } else { list_files(&dir) };
        Self {
            dir,
            format,
            reserved: HashSet::new(),
            existing,
        }
    }

    /// Reserve the output name for `input`
    pub fn plan(&mut self, input: &Path) -> OutputPlan {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string());

        let base = match self.format {
            OutputFormat::Pdf => format!("{}{}", stem, PDF_SUFFIX),
            _ => stem,
        };

        let mut counter = 1;
        loop {
            let candidate = if counter == 1 {
                base.clone()
            } else {
                format!("{}_{}", base, counter)
            };
            let plan = OutputPlan {
                dir: self.dir.clone(),
                base: candidate,
                format: self.format,
            };

            let on_disk = self.existing.iter().any(|name| plan.owns(name));
            if !on_disk && self.reserved.insert(plan.base.clone()) {
                return plan;
            }
            counter += 1;
        }
    }
}

/// Names of the entries in `dir`; a missing directory has none
fn list_files(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
