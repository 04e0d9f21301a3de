//! Output formats for compiled items.
pub mod json;
pub mod text;
