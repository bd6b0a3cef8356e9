//! Utility modules.

pub mod file;
pub mod vector;

pub use file::{file_extension, is_binary_extension, is_markdown_extension, is_safe_relative_path};
pub use vector::{l2_normalize, l2_normalized};
