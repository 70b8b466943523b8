//! Output rendering: pretty JSON, minijinja Markdown, and report artifacts.

pub mod json;
pub mod markdown;
pub mod report;
