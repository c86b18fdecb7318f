use super::builder::ConsensusResult;
use super::clique::Clique;
use crate::error::TableError;
use crate::peaks::SampleId;

/// Clique by sample membership table of a finished alignment.
pub struct CliqueTable<'a> {
    result: &'a ConsensusResult,
    sample_ids: Vec<SampleId>,
    // rows are cliques, columns samples
    membership: Vec<Vec<bool>>,
}

impl<'a> CliqueTable<'a> {
    pub fn new(result: &'a ConsensusResult) -> Self {
        let num_samples = result.arena().num_samples();
        let membership = result
            .cliques()
            .iter()
            .map(|clique| {
                let mut row = vec![false; num_samples];
                for sample in clique.samples() {
                    row[sample] = true;
                }
                row
            })
            .collect();

        CliqueTable {
            result,
            sample_ids: result.sample_ids(),
            membership,
        }
    }

    pub fn num_cliques(&self) -> usize {
        self.membership.len()
    }

    pub fn sample_ids(&self) -> &[SampleId] {
        &self.sample_ids
    }

    fn column(
        &self,
        sample: &SampleId,
    ) -> Result<usize, TableError> {
        self.result
            .arena()
            .sample_index(sample)
            .ok_or_else(|| TableError::UnknownSample(sample.clone()))
    }

    pub fn is_member(
        &self,
        clique_row: usize,
        sample: &SampleId,
    ) -> Result<bool, TableError> {
        let col = self.column(sample)?;
        let row = self
            .membership
            .get(clique_row)
            .ok_or(TableError::UnknownClique(clique_row))?;
        Ok(row[col])
    }

    pub fn count_members_from_sample(
        &self,
        sample: &SampleId,
    ) -> Result<usize, TableError> {
        let col = self.column(sample)?;
        Ok(self.membership.iter().filter(|row| row[col]).count())
    }

    /// Cliques holding a peak of both samples, in creation order.
    pub fn common_cliques(
        &self,
        a: &SampleId,
        b: &SampleId,
    ) -> Result<Vec<&'a Clique>, TableError> {
        let col_a = self.column(a)?;
        let col_b = self.column(b)?;
        Ok(self
            .membership
            .iter()
            .zip(self.result.cliques())
            .filter(|(row, _)| row[col_a] && row[col_b])
            .map(|(_, clique)| clique)
            .collect())
    }

    /// Cliques with a member in every sample.
    pub fn complete_cliques(&self) -> Vec<&'a Clique> {
        self.membership
            .iter()
            .zip(self.result.cliques())
            .filter(|(row, _)| !row.is_empty() && row.iter().all(|x| *x))
            .map(|(_, clique)| clique)
            .collect()
    }

    /// `out[a][b]` is the number of cliques shared by samples `a` and `b`.
    /// The diagonal holds the per-sample member counts.
    pub fn shared_counts(&self) -> Vec<Vec<usize>> {
        let n = self.sample_ids.len();
        let mut out = vec![vec![0; n]; n];
        for row in self.membership.iter() {
            for a in 0..n {
                if !row[a] {
                    continue;
                }
                for b in 0..n {
                    if row[b] {
                        out[a][b] += 1;
                    }
                }
            }
        }
        out
    }
}
