//! File read policy.
//!
//! A file is read only when its mime class can be exported as text and
//! its reported size is within [`MAX_READ_BYTES`]. Exported text above
//! [`PREVIEW_BYTES`] is cut to a preview.

use crate::integrations::{FileContent, FileDescriptor, MimeClass};
use crate::utils::{human_size, truncate_str};

/// Files larger than this are rejected before any export is attempted.
pub const MAX_READ_BYTES: u64 = 10 * 1024 * 1024;

/// Exported text longer than this is returned as a preview.
pub const PREVIEW_BYTES: usize = 2 * 1024;

/// Outcome of checking a file against the read policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCheck {
    Allowed,
    TooLarge { size_bytes: u64 },
    Unsupported { label: &'static str },
}

/// Decide whether `file` may be read. Size is checked first.
pub fn check_readable(file: &FileDescriptor) -> ReadCheck {
    if file.size_bytes > MAX_READ_BYTES {
        return ReadCheck::TooLarge {
            size_bytes: file.size_bytes,
        };
    }
    if file.mime_class == MimeClass::UnsupportedBinary {
        return ReadCheck::Unsupported {
            label: file.type_label(),
        };
    }
    ReadCheck::Allowed
}

/// Wrap exported text, truncating to [`PREVIEW_BYTES`] on a char boundary.
pub fn preview(file: FileDescriptor, text: &str) -> FileContent {
    let original_size = text.len();
    let truncated = original_size > PREVIEW_BYTES;
    FileContent {
        file,
        text: truncate_str(text, PREVIEW_BYTES).to_string(),
        original_size,
        truncated,
    }
}

/// "Unsupported type" message naming the type and where to open the file.
pub fn unsupported_message(file: &FileDescriptor, label: &str) -> String {
    let open = match &file.web_link {
        Some(link) => format!("Open it in the Google Drive web interface: {}", link),
        None => "Open it in the Google Drive web interface instead.".to_string(),
    };
    format!(
        "Cannot read '{}': {} files cannot be exported as text. {}",
        file.name, label, open
    )
}

pub fn too_large_message(file: &FileDescriptor, size_bytes: u64) -> String {
    format!(
        "Cannot read '{}': file is {} which exceeds the {} read limit.",
        file.name,
        human_size(size_bytes),
        human_size(MAX_READ_BYTES)
    )
}

/// Display form of read content: the text plus a truncation marker.
pub fn render_content(content: &FileContent) -> String {
    if content.truncated {
        format!(
            "📄 {}\n\n{}\n\n[... truncated: showing first {} of {}]",
            content.file.name,
            content.text,
            human_size(content.text.len() as u64),
            human_size(content.original_size as u64)
        )
    } else {
        format!("📄 {}\n\n{}", content.file.name, content.text)
    }
}
