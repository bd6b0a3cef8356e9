//! File-name helpers for uploaded documents.

use std::path::Path;

/// Lowercased extension of a document path, if any.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Check if extension indicates a binary format we have no text extractor for.
pub fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "doc"
            | "odt"
            | "rtf"
            | "xls"
            | "xlsx"
            | "ppt"
            | "pptx"
            | "epub"
            | "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "bmp"
            | "webp"
            | "tiff"
            | "mp3"
            | "mp4"
            | "wav"
            | "zip"
            | "tar"
            | "gz"
            | "7z"
            | "rar"
            | "exe"
            | "dll"
            | "so"
            | "bin"
    )
}

pub fn is_markdown_extension(ext: &str) -> bool {
    matches!(ext, "md" | "markdown" | "mdown" | "mkd")
}

/// Reject absolute paths and parent-directory components.
pub fn is_safe_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
}
