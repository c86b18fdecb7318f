use std::collections::BTreeMap;

use log::{
    info,
    trace,
    Level,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::clique::{
    AddOutcome,
    Clique,
    CliqueId,
};
use super::criterion::{
    AssignmentContext,
    BidirectionalBestHit,
    MembershipCriterion,
};
use crate::engine::SimilarityIndex;
use crate::error::ConfigError;
use crate::peaks::{
    PeakArena,
    PeakKey,
    SampleId,
};
use crate::utils::{
    get_stats,
    ContextTimer,
    Stats,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct CliqueConfig {
    pub min_similarity: f64,
    pub mutual_best_hit: bool,
    /// Cliques smaller than this are dissolved after assembly.
    pub min_clique_size: usize,
}

impl Default for CliqueConfig {
    fn default() -> Self {
        CliqueConfig {
            min_similarity: 0.9,
            mutual_best_hit: true,
            min_clique_size: 2,
        }
    }
}

impl CliqueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_similarity.is_nan() {
            return Err(ConfigError::InvalidParameter {
                name: "min_similarity",
                value: self.min_similarity,
                reason: "must be a number",
            });
        }
        if self.min_clique_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "min_clique_size",
                value: 0.,
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    pub fn criterion(&self) -> BidirectionalBestHit {
        BidirectionalBestHit {
            min_similarity: self.min_similarity,
            mutual_best_hit: self.mutual_best_hit,
        }
    }
}

/// Greedy single pass assembly of cliques.
///
/// Peaks are visited in sample order and, within a sample, in peak list
/// order. Each peak joins the first existing clique (in creation order)
/// that accepts it, or starts a new one. Nothing is revisited.
pub struct ConsensusBuilder<C: MembershipCriterion> {
    config: CliqueConfig,
    criterion: C,
}

impl ConsensusBuilder<BidirectionalBestHit> {
    pub fn from_config(config: CliqueConfig) -> Result<Self, ConfigError> {
        Self::new(config, config.criterion())
    }
}

impl<C: MembershipCriterion> ConsensusBuilder<C> {
    pub fn new(
        config: CliqueConfig,
        criterion: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ConsensusBuilder { config, criterion })
    }

    pub fn config(&self) -> &CliqueConfig {
        &self.config
    }

    pub fn build(
        &self,
        arena: PeakArena,
        index: &SimilarityIndex,
    ) -> ConsensusResult {
        assert_eq!(
            arena.len(),
            index.len(),
            "Similarity index does not match the peak arena"
        );
        let mut timer = ContextTimer::new("consensus_builder", true, Level::Info);

        let mut cliques: Vec<Clique> = Vec::new();
        let mut assignments: Vec<Option<CliqueId>> = vec![None; arena.len()];

        for key in arena.keys() {
            if assignments[key.0].is_some() {
                continue;
            }

            let mut joined = None;
            for clique in cliques.iter_mut() {
                let ctx = AssignmentContext {
                    arena: &arena,
                    index,
                    assignments: &assignments,
                };
                match clique.add(key, &self.criterion, &ctx) {
                    AddOutcome::Added | AddOutcome::AlreadyMember => {
                        joined = Some(clique.id());
                        break;
                    },
                    AddOutcome::Rejected(reason) => {
                        trace!(
                            "Peak {} of '{}' rejected by clique {}: {:?}",
                            arena.peak(key).id,
                            arena.peak(key).sample,
                            clique.id(),
                            reason
                        );
                    },
                }
            }

            let id = match joined {
                Some(id) => id,
                None => {
                    let id = CliqueId(cliques.len() as u64);
                    cliques.push(Clique::seed(id, key, &arena));
                    trace!(
                        "Peak {} of '{}' starts clique {}",
                        arena.peak(key).id,
                        arena.peak(key).sample,
                        id
                    );
                    id
                },
            };
            assignments[key.0] = Some(id);
        }

        let num_assembled = cliques.len();
        let (kept, dissolved): (Vec<Clique>, Vec<Clique>) = cliques
            .into_iter()
            .partition(|c| c.len() >= self.config.min_clique_size);

        let mut unmatched = dissolved
            .iter()
            .flat_map(|c| c.members().iter().copied())
            .collect::<Vec<_>>();
        unmatched.sort();

        let mut positions = vec![None; arena.len()];
        for (pos, clique) in kept.iter().enumerate() {
            for member in clique.members() {
                positions[member.0] = Some(pos);
            }
        }

        info!(
            "Assembled {} cliques, kept {} with at least {} members, {} peaks unmatched",
            num_assembled,
            kept.len(),
            self.config.min_clique_size,
            unmatched.len()
        );
        timer.stop(true);

        let stats = CoverageStats::new(&arena, &kept, unmatched.len());
        ConsensusResult {
            arena,
            cliques: kept,
            unmatched,
            positions,
            stats,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageStats {
    pub num_samples: usize,
    pub num_peaks: usize,
    pub num_cliques: usize,
    pub matched_peaks: usize,
    pub unmatched_peaks: usize,
    pub mean_clique_size: f64,
    pub clique_size: Stats,
    /// Number of cliques per clique size.
    pub size_histogram: BTreeMap<usize, usize>,
    pub matched_per_sample: BTreeMap<SampleId, usize>,
}

impl CoverageStats {
    fn new(
        arena: &PeakArena,
        cliques: &[Clique],
        unmatched_peaks: usize,
    ) -> Self {
        let sizes = cliques.iter().map(|c| c.len() as f64).collect::<Vec<_>>();
        let clique_size = get_stats(&sizes);

        let mut size_histogram = BTreeMap::new();
        for clique in cliques {
            *size_histogram.entry(clique.len()).or_insert(0) += 1;
        }

        let mut matched_per_sample: BTreeMap<SampleId, usize> = arena
            .sample_ids()
            .into_iter()
            .map(|s| (s, 0))
            .collect();
        for clique in cliques {
            for member in clique.members() {
                let sample = arena.sample(arena.sample_of(*member)).sample_id();
                if let Some(count) = matched_per_sample.get_mut(sample) {
                    *count += 1;
                }
            }
        }

        let matched_peaks = cliques.iter().map(|c| c.len()).sum();
        CoverageStats {
            num_samples: arena.num_samples(),
            num_peaks: arena.len(),
            num_cliques: cliques.len(),
            matched_peaks,
            unmatched_peaks,
            mean_clique_size: if cliques.is_empty() {
                0.
            } else {
                clique_size.mean
            },
            clique_size,
            size_histogram,
            matched_per_sample,
        }
    }
}

/// Cliques that survived the size filter, plus the peaks left over.
#[derive(Debug, Clone)]
pub struct ConsensusResult {
    arena: PeakArena,
    cliques: Vec<Clique>,
    unmatched: Vec<PeakKey>,
    positions: Vec<Option<usize>>,
    stats: CoverageStats,
}

impl ConsensusResult {
    /// Retained cliques in creation order. Ids are not contiguous once
    /// small cliques were dissolved.
    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    /// Peaks outside every retained clique, in visiting order.
    pub fn unmatched(&self) -> &[PeakKey] {
        &self.unmatched
    }

    pub fn stats(&self) -> &CoverageStats {
        &self.stats
    }

    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.arena.sample_ids()
    }

    pub fn arena(&self) -> &PeakArena {
        &self.arena
    }

    pub fn clique_of(
        &self,
        key: PeakKey,
    ) -> Option<&Clique> {
        self.positions
            .get(key.0)
            .copied()
            .flatten()
            .map(|pos| &self.cliques[pos])
    }
}

#[cfg(test)]
mod test_builder {
    use super::*;
    use crate::alignment::criterion::JoinDecision;
    use crate::peaks::{
        Peak,
        PeakList,
        RetentionTime,
        Spectrum,
    };

    fn arena(samples: &[(&str, &[f64])]) -> PeakArena {
        let lists = samples
            .iter()
            .map(|(name, rts)| {
                let peaks = rts
                    .iter()
                    .enumerate()
                    .map(|(i, rt)| Peak::new(i as u64, RetentionTime::one(*rt), Spectrum::default()))
                    .collect();
                PeakList::new((*name).into(), peaks).unwrap()
            })
            .collect();
        PeakArena::new(lists).unwrap()
    }

    #[test]
    fn test_three_way_clique() {
        let arena = arena(&[("a", &[10.0]), ("b", &[10.1]), ("c", &[10.3])]);
        let mut index = SimilarityIndex::new(arena.len());
        for a in 0..3 {
            for b in (a + 1)..3 {
                index.set_symmetric(PeakKey(a), PeakKey(b), 0.95);
            }
        }
        let builder = ConsensusBuilder::from_config(CliqueConfig::default()).unwrap();
        let result = builder.build(arena, &index);

        assert_eq!(result.cliques().len(), 1);
        let clique = &result.cliques()[0];
        assert_eq!(clique.len(), 3);
        assert_eq!(clique.centroid(), Some(PeakKey(1)));
        assert!(result.unmatched().is_empty());
        assert_eq!(result.stats().matched_peaks, 3);
        assert_eq!(result.stats().size_histogram.get(&3), Some(&1));
        assert_eq!(result.clique_of(PeakKey(2)).map(|c| c.id()), Some(CliqueId(0)));
    }

    #[test]
    fn test_incomparable_pair_is_unmatched() {
        let arena = arena(&[("a", &[10.0]), ("b", &[50.0])]);
        let index = SimilarityIndex::new(arena.len());
        let builder = ConsensusBuilder::from_config(CliqueConfig::default()).unwrap();
        let result = builder.build(arena, &index);

        assert!(result.cliques().is_empty());
        assert_eq!(result.unmatched(), &[PeakKey(0), PeakKey(1)]);
        assert_eq!(result.stats().unmatched_peaks, 2);
        assert_eq!(result.stats().mean_clique_size, 0.);
        assert!(result.clique_of(PeakKey(0)).is_none());
    }

    #[test]
    fn test_min_clique_size_one_keeps_singletons() {
        let arena = arena(&[("a", &[10.0]), ("b", &[50.0]), ("empty", &[])]);
        let index = SimilarityIndex::new(arena.len());
        let config = CliqueConfig {
            min_clique_size: 1,
            ..Default::default()
        };
        let result = ConsensusBuilder::from_config(config)
            .unwrap()
            .build(arena, &index);
        assert_eq!(result.cliques().len(), 2);
        assert_eq!(
            result.stats().matched_per_sample.get(&SampleId::from("empty")),
            Some(&0)
        );
    }

    #[test]
    fn test_first_accepting_clique_wins() {
        // b0 scores equally well against a0 and a1, without the mutual
        // check it goes to the earlier clique.
        let arena = arena(&[("a", &[10.0, 10.2]), ("b", &[10.1])]);
        let mut index = SimilarityIndex::new(arena.len());
        index.set_symmetric(PeakKey(0), PeakKey(2), 0.95);
        index.set_symmetric(PeakKey(1), PeakKey(2), 0.95);
        let config = CliqueConfig {
            mutual_best_hit: false,
            ..Default::default()
        };
        let result = ConsensusBuilder::from_config(config)
            .unwrap()
            .build(arena, &index);
        assert_eq!(result.cliques().len(), 1);
        assert_eq!(result.cliques()[0].id(), CliqueId(0));
        assert_eq!(result.cliques()[0].members(), &[PeakKey(0), PeakKey(2)]);
        assert_eq!(result.unmatched(), &[PeakKey(1)]);
    }

    #[test]
    fn test_custom_criterion() {
        let arena = arena(&[("a", &[10.0]), ("b", &[10.1]), ("c", &[99.])]);
        let index = SimilarityIndex::new(arena.len());
        let everything = |_: &Clique, _: PeakKey, _: &AssignmentContext| JoinDecision::Accept;
        let builder = ConsensusBuilder::new(CliqueConfig::default(), everything).unwrap();
        let result = builder.build(arena, &index);
        assert_eq!(result.cliques().len(), 1);
        assert_eq!(result.cliques()[0].len(), 3);
    }

    #[test]
    fn test_invalid_config() {
        let config = CliqueConfig {
            min_clique_size: 0,
            ..Default::default()
        };
        assert!(ConsensusBuilder::from_config(config).is_err());
    }
}
