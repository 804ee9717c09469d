//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Transform / capture
//!
//! ```text
//! thumb.png 400x300 png (18.2 KB)
//!     Source: https://example.com/photo.jpg
//!     Warning: Image was not found
//! ```
//!
//! ## Batch
//!
//! ```text
//! Batch (3 images)
//! 001 photos/cat.jpg → thumbs/cat.png 120x90
//! 002 photos/broken.jpg
//!     Error: Failed to decode image: ...
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::batch::{BatchEvent, BatchReport};
use crate::imaging::Rendered;
use crate::types::Warning;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count.
fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

// ============================================================================
// Single transform
// ============================================================================

/// Format the result of one transform written to `output`.
pub fn format_rendered(
    output: &Path,
    source: &str,
    rendered: &Rendered,
    warning: Option<&Warning>,
) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} {}x{} {} ({})",
            output.display(),
            rendered.width,
            rendered.height,
            rendered.format,
            format_size(rendered.bytes.len())
        ),
        format!("    Source: {source}"),
    ];
    if let Some(w) = warning {
        lines.push(format!("    Warning: {w}"));
    }
    lines
}

pub fn print_rendered(output: &Path, source: &str, rendered: &Rendered, warning: Option<&Warning>) {
    for line in format_rendered(output, source, rendered, warning) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started { total } => vec![format!("Batch ({total} images)")],
        BatchEvent::Rendered { index, output } => vec![format!(
            "{} {} \u{2192} {} {}x{}",
            format_index(*index),
            output.source.display(),
            output.output.display(),
            output.width,
            output.height
        )],
        BatchEvent::Failed { index, failure } => vec![
            format!("{} {}", format_index(*index), failure.source.display()),
            format!("    Error: {}", failure.error),
        ],
    }
}

/// One-line summary of a finished batch.
pub fn format_batch_summary(report: &BatchReport) -> String {
    if report.errors.is_empty() {
        format!("Rendered {} images", report.outputs.len())
    } else {
        format!(
            "Rendered {} images, {} failed",
            report.outputs.len(),
            report.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchFailure, BatchOutput};
    use crate::imaging::ImageFormat;
    use std::path::PathBuf;

    fn rendered(bytes: usize) -> Rendered {
        Rendered {
            bytes: vec![0; bytes],
            format: ImageFormat::Png,
            width: 400,
            height: 300,
        }
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn rendered_without_warning() {
        let lines = format_rendered(Path::new("out.png"), "in.jpg", &rendered(100), None);
        assert_eq!(lines, vec!["out.png 400x300 png (100 B)", "    Source: in.jpg"]);
    }

    #[test]
    fn rendered_with_warning() {
        let warning = Warning::ImageNotFound {
            url: "http://x.test/a.png".into(),
            reason: "server answered with status 404".into(),
        };
        let url = "http://x.test/a.png";
        let lines = format_rendered(Path::new("out.png"), url, &rendered(10), Some(&warning));
        assert_eq!(lines[2], "    Warning: Image was not found");
    }

    #[test]
    fn batch_events() {
        assert_eq!(
            format_batch_event(&BatchEvent::Started { total: 3 }),
            vec!["Batch (3 images)"]
        );
        let ok = BatchEvent::Rendered {
            index: 1,
            output: BatchOutput {
                source: PathBuf::from("in/cat.jpg"),
                output: PathBuf::from("out/cat.png"),
                width: 120,
                height: 90,
                bytes: 1000,
            },
        };
        assert_eq!(
            format_batch_event(&ok),
            vec!["001 in/cat.jpg \u{2192} out/cat.png 120x90"]
        );
        let failed = BatchEvent::Failed {
            index: 12,
            failure: BatchFailure {
                source: PathBuf::from("in/bad.jpg"),
                error: "boom".into(),
            },
        };
        assert_eq!(
            format_batch_event(&failed),
            vec!["012 in/bad.jpg", "    Error: boom"]
        );
    }

    #[test]
    fn batch_summary() {
        let mut report = BatchReport::default();
        assert_eq!(format_batch_summary(&report), "Rendered 0 images");
        report.errors.push(BatchFailure {
            source: PathBuf::from("x"),
            error: "e".into(),
        });
        assert_eq!(format_batch_summary(&report), "Rendered 0 images, 1 failed");
    }
}
