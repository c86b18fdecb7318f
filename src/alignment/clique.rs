use std::collections::BTreeMap;
use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

use super::criterion::{
    AssignmentContext,
    JoinDecision,
    MembershipCriterion,
    RejectReason,
};
use crate::peaks::{
    PeakArena,
    PeakKey,
};
use crate::utils::RunningStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CliqueId(pub u64);

impl fmt::Display for CliqueId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliqueState {
    Empty,
    /// One member, no statistics to pick a centroid from yet.
    Single,
    Established,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyMember,
    Rejected(RejectReason),
}

/// Peaks from different samples believed to be the same analyte.
///
/// Holds at most one peak per sample. Running mean and variance are kept
/// per retention time dimension.
#[derive(Debug, Clone)]
pub struct Clique {
    id: CliqueId,
    members: Vec<PeakKey>,
    by_sample: BTreeMap<usize, PeakKey>,
    stats: Vec<RunningStats<f64>>,
    centroid: Option<PeakKey>,
}

impl Clique {
    pub fn new(id: CliqueId) -> Self {
        Clique {
            id,
            members: Vec::new(),
            by_sample: BTreeMap::new(),
            stats: Vec::new(),
            centroid: None,
        }
    }

    /// A clique holding just `key`.
    pub fn seed(
        id: CliqueId,
        key: PeakKey,
        arena: &PeakArena,
    ) -> Self {
        let mut out = Clique::new(id);
        out.insert(key, arena);
        out
    }

    pub fn id(&self) -> CliqueId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn state(&self) -> CliqueState {
        match self.members.len() {
            0 => CliqueState::Empty,
            1 => CliqueState::Single,
            _ => CliqueState::Established,
        }
    }

    /// Members in the order they joined.
    pub fn members(&self) -> &[PeakKey] {
        &self.members
    }

    pub fn contains(
        &self,
        key: PeakKey,
    ) -> bool {
        self.members.contains(&key)
    }

    pub fn member_from_sample(
        &self,
        sample_index: usize,
    ) -> Option<PeakKey> {
        self.by_sample.get(&sample_index).copied()
    }

    /// Sample indices with a member, ascending.
    pub fn samples(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_sample.keys().copied()
    }

    pub fn mean(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.mean()).collect()
    }

    pub fn variance(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.variance()).collect()
    }

    /// Member closest to the running mean, once there are two members.
    pub fn centroid(&self) -> Option<PeakKey> {
        match self.state() {
            CliqueState::Established => self.centroid,
            _ => None,
        }
    }

    /// Peak new candidates are compared to: the centroid, or the sole member.
    pub fn reference_member(&self) -> Option<PeakKey> {
        self.centroid().or_else(|| self.members.first().copied())
    }

    /// Runs `criterion` and takes the candidate in on acceptance.
    ///
    /// The one-peak-per-sample rule is enforced here regardless of what the
    /// criterion decides.
    pub fn add<C: MembershipCriterion + ?Sized>(
        &mut self,
        candidate: PeakKey,
        criterion: &C,
        ctx: &AssignmentContext,
    ) -> AddOutcome {
        if self.contains(candidate) {
            return AddOutcome::AlreadyMember;
        }
        if self
            .member_from_sample(ctx.arena.sample_of(candidate))
            .is_some()
        {
            return AddOutcome::Rejected(RejectReason::SampleOccupied);
        }

        match criterion.should_join(self, candidate, ctx) {
            JoinDecision::Accept => {
                self.insert(candidate, ctx.arena);
                AddOutcome::Added
            },
            JoinDecision::AlreadyMember => AddOutcome::AlreadyMember,
            JoinDecision::Reject(reason) => AddOutcome::Rejected(reason),
        }
    }

    fn insert(
        &mut self,
        key: PeakKey,
        arena: &PeakArena,
    ) {
        let sample = arena.sample_of(key);
        debug_assert!(!self.by_sample.contains_key(&sample));

        let rt = arena.peak(key).rt;
        if self.stats.is_empty() {
            self.stats = vec![RunningStats::default(); rt.dims()];
        }
        for (stat, value) in self.stats.iter_mut().zip(rt.as_slice()) {
            stat.add(*value);
        }

        self.members.push(key);
        self.by_sample.insert(sample, key);
        self.update_centroid(arena);
    }

    fn update_centroid(
        &mut self,
        arena: &PeakArena,
    ) {
        let mean = self.mean();
        let mut best: Option<(PeakKey, f64)> = None;
        for member in self.members.iter() {
            let dist = arena
                .peak(*member)
                .rt
                .as_slice()
                .iter()
                .zip(mean.iter())
                .map(|(x, m)| (x - m) * (x - m))
                .sum::<f64>();
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((*member, dist));
            }
        }
        self.centroid = best.map(|(key, _)| key);
    }
}
