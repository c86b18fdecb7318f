use serde::Serialize;

use super::clique::{
    Clique,
    CliqueId,
};
use crate::engine::{
    SimilarityIndex,
    INCOMPARABLE,
};
use crate::peaks::{
    PeakArena,
    PeakKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    /// The clique already holds a peak of the candidate's sample.
    SampleOccupied,
    /// No score exists between the candidate and the clique reference.
    Incomparable,
    BelowThreshold,
    /// A still unclaimed peak is a better partner on either side.
    NotMutualBest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Accept,
    AlreadyMember,
    Reject(RejectReason),
}

/// Read-only view of an assembly in progress.
pub struct AssignmentContext<'a> {
    pub arena: &'a PeakArena,
    pub index: &'a SimilarityIndex,
    pub assignments: &'a [Option<CliqueId>],
}

impl<'a> AssignmentContext<'a> {
    pub fn is_claimed(
        &self,
        key: PeakKey,
    ) -> bool {
        self.assignments[key.0].is_some()
    }

    pub fn score(
        &self,
        from: PeakKey,
        to: PeakKey,
    ) -> f64 {
        self.index.get(from, to)
    }

    /// Whether an unclaimed peak of `sample`, other than `except`, scores
    /// strictly higher than `bar` in the similarity map of `from`.
    fn has_better_unclaimed(
        &self,
        from: PeakKey,
        sample: usize,
        except: PeakKey,
        bar: f64,
    ) -> bool {
        let range = self.arena.key_range(sample);
        self.index
            .map(from)
            .range(PeakKey(range.start)..PeakKey(range.end))
            .any(|(other, score)| *other != except && !self.is_claimed(*other) && *score > bar)
    }
}

/// Decides whether a candidate peak may join a clique.
pub trait MembershipCriterion {
    fn should_join(
        &self,
        clique: &Clique,
        candidate: PeakKey,
        ctx: &AssignmentContext,
    ) -> JoinDecision;
}

impl<F> MembershipCriterion for F
where
    F: Fn(&Clique, PeakKey, &AssignmentContext) -> JoinDecision,
{
    fn should_join(
        &self,
        clique: &Clique,
        candidate: PeakKey,
        ctx: &AssignmentContext,
    ) -> JoinDecision {
        self(clique, candidate, ctx)
    }
}

/// Threshold against the clique reference plus a mutual best hit check
/// against every member.
///
/// The mutual check is what keeps A-B and B-C matches from pulling a weak
/// A-C pair into one clique. It is skipped when `mutual_best_hit` is off or
/// `min_similarity <= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidirectionalBestHit {
    pub min_similarity: f64,
    pub mutual_best_hit: bool,
}

impl BidirectionalBestHit {
    pub fn new(min_similarity: f64) -> Self {
        BidirectionalBestHit {
            min_similarity,
            mutual_best_hit: true,
        }
    }

    fn is_mutual_best(
        &self,
        clique: &Clique,
        candidate: PeakKey,
        ctx: &AssignmentContext,
    ) -> bool {
        let candidate_sample = ctx.arena.sample_of(candidate);
        clique.members().iter().all(|member| {
            let member_sample = ctx.arena.sample_of(*member);
            let forward = ctx.score(candidate, *member);
            let backward = ctx.score(*member, candidate);

            !ctx.has_better_unclaimed(candidate, member_sample, *member, forward)
                && !ctx.has_better_unclaimed(*member, candidate_sample, candidate, backward)
        })
    }
}

impl MembershipCriterion for BidirectionalBestHit {
    fn should_join(
        &self,
        clique: &Clique,
        candidate: PeakKey,
        ctx: &AssignmentContext,
    ) -> JoinDecision {
        if clique.contains(candidate) {
            return JoinDecision::AlreadyMember;
        }
        if clique
            .member_from_sample(ctx.arena.sample_of(candidate))
            .is_some()
        {
            return JoinDecision::Reject(RejectReason::SampleOccupied);
        }

        let reference = match clique.reference_member() {
            Some(r) => r,
            None => return JoinDecision::Accept,
        };

        let score = ctx.score(candidate, reference);
        if score.is_nan() || score == INCOMPARABLE {
            return JoinDecision::Reject(RejectReason::Incomparable);
        }
        if score < self.min_similarity {
            return JoinDecision::Reject(RejectReason::BelowThreshold);
        }

        if !self.mutual_best_hit || self.min_similarity <= 0. {
            return JoinDecision::Accept;
        }
        if self.is_mutual_best(clique, candidate, ctx) {
            JoinDecision::Accept
        } else {
            JoinDecision::Reject(RejectReason::NotMutualBest)
        }
    }
}
