// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod cmd;
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod input;
pub mod parser;
pub mod progress;
pub mod schema;
pub mod writer;

pub use convert::{translate_document, TranslateOptions, TranslateOutcome};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{Result, TranslateError};
pub use parser::DumpDocument;
