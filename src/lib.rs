//! Cross-run consensus alignment of chromatographic peaks.
//!
//! Peaks of every sample pair are scored in parallel ([`engine`]), then a
//! single greedy pass groups them into cliques holding at most one peak per
//! sample ([`alignment`]).

pub mod alignment;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod matrix;
pub mod peaks;
pub mod similarity;
pub mod utils;

pub use crate::alignment::{
    align,
    CliqueTable,
    ConsensusBuilder,
    ConsensusResult,
};
pub use crate::config::{
    AlignmentConfig,
    Config,
};
pub use crate::error::{
    AlignmentError,
    Result,
};
