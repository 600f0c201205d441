//! Result output
//!
//! Text for the console, JSON for files.

pub mod json;
pub mod text;
