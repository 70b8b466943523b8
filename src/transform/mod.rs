//! Transformations from upstream API payloads into domain records.

pub mod interaction;
pub mod molecular;
pub mod trial;
