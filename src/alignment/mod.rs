pub mod builder;
pub mod clique;
pub mod criterion;
pub mod table;

use std::sync::Arc;

use log::info;
use rayon::ThreadPool;

pub use self::builder::{
    CliqueConfig,
    ConsensusBuilder,
    ConsensusResult,
    CoverageStats,
};
pub use self::clique::{
    AddOutcome,
    Clique,
    CliqueId,
    CliqueState,
};
pub use self::criterion::{
    AssignmentContext,
    BidirectionalBestHit,
    JoinDecision,
    MembershipCriterion,
    RejectReason,
};
pub use self::table::CliqueTable;
use crate::config::AlignmentConfig;
use crate::engine::{
    CancellationToken,
    SimilarityEngine,
};
use crate::error::Result;
use crate::peaks::{
    PeakArena,
    PeakList,
};
use crate::similarity::ScalarArraySimilarity;

/// Scores all sample pairs on `pool` and assembles the cliques.
pub fn align(
    samples: Vec<PeakList>,
    config: &AlignmentConfig,
    similarity: Arc<dyn ScalarArraySimilarity>,
    pool: Arc<ThreadPool>,
    cancel: Option<CancellationToken>,
) -> Result<ConsensusResult> {
    config.validate()?;
    let arena = PeakArena::new(samples)?;
    info!(
        "Aligning {} peaks from {} samples",
        arena.len(),
        arena.num_samples()
    );

    let mut engine = SimilarityEngine::new(config.engine, similarity, pool)?;
    if let Some(token) = cancel {
        engine = engine.with_cancellation(token);
    }
    let similarities = engine.compute_all(&arena)?;
    let index = similarities.to_index(&arena);

    let builder = ConsensusBuilder::from_config(config.clique)?;
    Ok(builder.build(arena, &index))
}
