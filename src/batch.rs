//! Batch thumbnailing of a directory tree.
//!
//! Walks an input directory for decodable images and runs one independent
//! transform per file. Every job gets its own source bitmap and canvas, so
//! jobs run in parallel on the [rayon](https://docs.rs/rayon) pool with no
//! shared image state; the only shared piece is the [`Thumbnailer`].
//!
//! ## Output Structure
//!
//! ```text
//! thumbs/
//! ├── report.json            # BatchReport: outputs and failures
//! ├── cat.png                # input/cat.jpg
//! └── holidays/
//!     └── beach.png          # input/holidays/beach.tiff
//! ```
//!
//! The relative directory of each source is kept; the extension becomes the
//! output format's canonical extension. A failing file is recorded in the
//! report and does not stop the others.

use crate::acquire::SourceDescriptor;
use crate::imaging::{ImageFormat, Quality};
use crate::transform::{SizeMode, Thumbnailer, TransformRequest};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// File name of the JSON report written next to the outputs.
pub const REPORT_FILENAME: &str = "report.json";

/// Extensions picked up from the input directory.
const SOURCE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "ico",
];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to walk input directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// What to produce for every file.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
    pub quality: Option<Quality>,
    pub mode: SizeMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub error: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outputs: Vec<BatchOutput>,
    pub errors: Vec<BatchFailure>,
}

/// Progress events, sent as each file finishes.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    Rendered { index: usize, output: BatchOutput },
    Failed { index: usize, failure: BatchFailure },
}

/// All decodable images under `dir`, sorted by path.
///
/// Anything under `exclude` (typically the output directory) is skipped.
pub fn find_images(dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>, BatchError> {
    if !dir.is_dir() {
        return Err(BatchError::NotADirectory(dir.to_path_buf()));
    }
    let mut found = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| exclude.is_none_or(|ex| e.path() != ex));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && has_source_extension(entry.path()) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Output path for `source`: same relative directory, new extension.
pub fn output_path_for(
    source: &Path,
    input_dir: &Path,
    output_dir: &Path,
    format: ImageFormat,
) -> PathBuf {
    let relative = source.strip_prefix(input_dir).unwrap_or(source);
    output_dir
        .join(relative)
        .with_extension(&format.canonical_extension()[1..])
}

/// Thumbnail every image under `input_dir` into `output_dir`.
pub fn run_batch(
    thumbnailer: &Thumbnailer,
    input_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchReport, BatchError> {
    let sources = find_images(input_dir, Some(output_dir))?;
    std::fs::create_dir_all(output_dir)?;
    info!(count = sources.len(), input = %input_dir.display(), "batch started");
    if let Some(tx) = &events {
        tx.send(BatchEvent::Started {
            total: sources.len(),
        })
        .ok();
    }

    let results: Vec<Result<BatchOutput, BatchFailure>> = sources
        .par_iter()
        .enumerate()
        .map(|(index, source)| {
            let result = render_one(thumbnailer, source, input_dir, output_dir, options);
            if let Some(tx) = &events {
                let event = match &result {
                    Ok(output) => BatchEvent::Rendered {
                        index: index + 1,
                        output: output.clone(),
                    },
                    Err(failure) => BatchEvent::Failed {
                        index: index + 1,
                        failure: failure.clone(),
                    },
                };
                tx.send(event).ok();
            }
            result
        })
        .collect();

    let mut report = BatchReport::default();
    for result in results {
        match result {
            Ok(output) => report.outputs.push(output),
            Err(failure) => report.errors.push(failure),
        }
    }
    info!(
        rendered = report.outputs.len(),
        failed = report.errors.len(),
        "batch finished"
    );
    Ok(report)
}

fn render_one(
    thumbnailer: &Thumbnailer,
    source: &Path,
    input_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
) -> Result<BatchOutput, BatchFailure> {
    let fail = |error: String| {
        warn!(source = %source.display(), %error, "batch item failed");
        BatchFailure {
            source: source.to_path_buf(),
            error,
        }
    };

    let mut request = TransformRequest::new(
        SourceDescriptor::LocalFile(source.to_path_buf()),
        options.width,
        options.height,
    )
    .with_mode(options.mode);
    request.format = options.format;
    request.quality = options.quality;

    let rendered = thumbnailer
        .transform(&request)
        .map_err(|e| fail(e.to_string()))?
        .value;
    let output = output_path_for(source, input_dir, output_dir, rendered.format);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
    }
    std::fs::write(&output, &rendered.bytes).map_err(|e| fail(e.to_string()))?;

    Ok(BatchOutput {
        source: source.to_path_buf(),
        output,
        width: rendered.width,
        height: rendered.height,
        bytes: rendered.bytes.len(),
    })
}

/// Write the report as pretty JSON to `<output_dir>/report.json`.
pub fn write_report(report: &BatchReport, output_dir: &Path) -> Result<PathBuf, BatchError> {
    let path = output_dir.join(REPORT_FILENAME);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
