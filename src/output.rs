//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Manipulate
//!
//! ```text
//! upload.jpg → /tmp/out.jpg
//!     Original: 800x400
//!     Action: square 400x400
//!     Effects: blur, modulate
//!     Watermark: applied
//!     Size: 48213 bytes
//! ```
//!
//! On failure the header is followed by the stage and the error chain:
//!
//! ```text
//! upload.jpg → /tmp/out.jpg
//!     Failed: watermark applied
//!     Error: failed to read assets/watermark.png (watermark applied): ...
//! ```
//!
//! ## Identify
//!
//! ```text
//! photo.jpg: 800x400
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::imaging::Dimensions;
use crate::manipulate::ManipulateError;
use crate::request::{ImageRequest, Options};
use std::error::Error;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_dims(dims: Dimensions) -> String {
    format!("{}x{}", dims.width, dims.height)
}

fn header(img: &ImageRequest) -> String {
    format!("{} → {}", img.filename(), img.tmp_file.display())
}

/// Action name with whichever target sides were requested.
///
/// ```text
/// square 400x400
/// resize 300w
/// none
/// ```
fn action_line(options: &Options) -> String {
    let Some(action) = options.action else {
        return "none".to_string();
    };
    match (options.width, options.height) {
        (Some(w), Some(h)) => format!("{action} {w}x{h}"),
        (Some(w), None) => format!("{action} {w}w"),
        (None, Some(h)) => format!("{action} {h}h"),
        (None, None) => action.to_string(),
    }
}

fn effects_line(options: &Options) -> Option<String> {
    let effects: Vec<&str> = [("blur", options.blur), ("modulate", options.modulate)]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
    (!effects.is_empty()).then(|| effects.join(", "))
}

/// Format a settled request.
pub fn format_result(img: &ImageRequest) -> Vec<String> {
    let mut lines = vec![header(img)];
    let pad = indent(1);
    lines.push(format!("{pad}Original: {}", format_dims(img.orig_dims)));
    lines.push(format!("{pad}Action: {}", action_line(&img.options)));
    if let Some(effects) = effects_line(&img.options) {
        lines.push(format!("{pad}Effects: {effects}"));
    }
    if img.options.watermark {
        lines.push(format!("{pad}Watermark: applied"));
    }
    match img.size {
        Some(size) => lines.push(format!("{pad}Size: {size} bytes")),
        None => lines.push(format!("{pad}Size: pending")),
    }
    lines
}

pub fn print_result(img: &ImageRequest) {
    for line in format_result(img) {
        println!("{}", line);
    }
}

/// Format a rejected request with the full error chain.
pub fn format_failure(img: &ImageRequest, err: &ManipulateError) -> Vec<String> {
    let pad = indent(1);
    let mut lines = vec![header(img)];
    match err.stage() {
        Some(stage) => lines.push(format!("{pad}Failed: {stage}")),
        None => lines.push(format!("{pad}Failed: abandoned")),
    }
    lines.push(format!("{pad}Error: {err}"));
    let mut cause = err.source();
    while let Some(e) = cause {
        lines.push(format!("{}Caused by: {e}", indent(2)));
        cause = e.source();
    }
    lines
}

pub fn print_failure(img: &ImageRequest, err: &ManipulateError) {
    for line in format_failure(img, err) {
        eprintln!("{}", line);
    }
}

pub fn format_identify(path: &Path, dims: Dimensions) -> String {
    format!("{}: {}", path.display(), format_dims(dims))
}

pub fn print_identify(path: &Path, dims: Dimensions) {
    println!("{}", format_identify(path, dims));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::BackendError;
    use crate::manipulate::Stage;
    use crate::request::Action;
    use std::path::PathBuf;

    fn request(options: Options) -> ImageRequest {
        ImageRequest::new(
            "/tmp/out.jpg",
            "upload.jpg",
            Dimensions {
                width: 800,
                height: 400,
            },
            options,
        )
    }

    #[test]
    fn indent_four_spaces_per_level() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn result_lists_action_and_size() {
        let mut img = request(Options {
            action: Some(Action::Square),
            width: Some(400),
            height: Some(400),
            ..Options::default()
        });
        img.size = Some(48213);

        let lines = format_result(&img);
        assert_eq!(
            lines,
            vec![
                "upload.jpg → /tmp/out.jpg",
                "    Original: 800x400",
                "    Action: square 400x400",
                "    Size: 48213 bytes",
            ]
        );
    }

    #[test]
    fn result_shows_effects_and_watermark() {
        let img = request(Options {
            action: Some(Action::Resize),
            width: Some(300),
            blur: true,
            modulate: true,
            watermark: true,
            ..Options::default()
        });

        let lines = format_result(&img);
        assert!(lines.contains(&"    Action: resize 300w".to_string()));
        assert!(lines.contains(&"    Effects: blur, modulate".to_string()));
        assert!(lines.contains(&"    Watermark: applied".to_string()));
        assert_eq!(lines.last().unwrap(), "    Size: pending");
    }

    #[test]
    fn result_without_action() {
        let lines = format_result(&request(Options::default()));
        assert_eq!(lines[2], "    Action: none");
    }

    #[test]
    fn failure_shows_stage_and_cause() {
        let img = request(Options::default());
        let err = ManipulateError::Write {
            stage: Stage::Written,
            path: PathBuf::from("/tmp/out.jpg"),
            source: BackendError::ProcessingFailed("disk full".into()),
        };

        let lines = format_failure(&img, &err);
        assert_eq!(lines[1], "    Failed: written");
        assert!(lines[2].starts_with("    Error: failed to write /tmp/out.jpg"));
        assert_eq!(lines[3], "        Caused by: Processing failed: disk full");
    }

    #[test]
    fn failure_abandoned() {
        let lines = format_failure(&request(Options::default()), &ManipulateError::Abandoned);
        assert_eq!(lines[1], "    Failed: abandoned");
    }

    #[test]
    fn identify_line() {
        let line = format_identify(
            Path::new("photo.jpg"),
            Dimensions {
                width: 640,
                height: 480,
            },
        );
        assert_eq!(line, "photo.jpg: 640x480");
    }
}
