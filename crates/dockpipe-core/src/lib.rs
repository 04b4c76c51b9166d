//! dockpipe Dockerfile model
//!
//! This crate turns Dockerfile text into an explicit, validated instruction
//! model: an ordered list of keyword-tagged instructions, a keyword index and
//! the stage boundaries opened by each `FROM`. The model renders back into
//! canonical Dockerfile text, which re-parses into an equivalent model.

pub mod error;
pub mod model;
pub mod parser;

pub use error::{DockerfileError, ParseError, ParseErrorKind, Result};
pub use model::{ArgumentForm, DockerfileModel, Instruction, Keyword, LineRange, Stage};
pub use parser::{parse, parse_file};
