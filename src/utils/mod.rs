//! Internal helpers for query escaping, serde shapes, report files, and timestamps.

pub(crate) mod date;
pub(crate) mod fs;
pub(crate) mod query;
pub(crate) mod serde;
