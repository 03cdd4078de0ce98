//! Reef HTML - HTML5 parsing
//!
//! Uses html5ever's built-in RcDom and converts to the Reef DOM format.
//! Text is kept verbatim and comments/processing instructions are
//! preserved: normalization belongs to the translator, which schedules
//! their removal after its walk.

mod parser;

pub use parser::parse_document;
