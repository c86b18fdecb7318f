use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use serde::{
    Deserialize,
    Serialize,
};

use crate::error::DataError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub String);

impl fmt::Display for SampleId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SampleId {
    fn from(value: &str) -> Self {
        SampleId(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeakId(pub u64);

impl fmt::Display for PeakId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dense index of a peak inside a [`PeakArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeakKey(pub usize);

/// One (1-D chromatography) or two (2-D, comprehensive chromatography)
/// retention time coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionTime {
    values: [f64; 2],
    dims: usize,
}

impl RetentionTime {
    pub fn one(rt1: f64) -> Self {
        RetentionTime {
            values: [rt1, 0.],
            dims: 1,
        }
    }

    pub fn two(
        rt1: f64,
        rt2: f64,
    ) -> Self {
        RetentionTime {
            values: [rt1, rt2],
            dims: 2,
        }
    }

    pub fn rt1(&self) -> f64 {
        self.values[0]
    }

    pub fn rt2(&self) -> Option<f64> {
        if self.dims == 2 {
            Some(self.values[1])
        } else {
            None
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.dims]
    }
}

/// Mass spectrum as parallel mass / intensity arrays, sorted by mass.
/// `PeakList::new` rejects spectra whose masses are out of order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    pub masses: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl Spectrum {
    /// Arrays of unequal length are kept as given; [`PeakList::new`] rejects them.
    pub fn new(
        masses: Vec<f64>,
        intensities: Vec<f64>,
    ) -> Self {
        if masses.len() != intensities.len() || masses.windows(2).all(|w| w[0] <= w[1]) {
            return Spectrum {
                masses,
                intensities,
            };
        }

        let mut pairs = masses.into_iter().zip(intensities).collect::<Vec<_>>();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (masses, intensities) = pairs.into_iter().unzip();
        Spectrum {
            masses,
            intensities,
        }
    }

    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.masses
            .iter()
            .copied()
            .zip(self.intensities.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    pub id: PeakId,
    pub sample: SampleId,
    pub rt: RetentionTime,
    pub spectrum: Spectrum,
}

impl Peak {
    /// The owning sample is assigned when the peak is placed in a [`PeakList`].
    pub fn new(
        id: u64,
        rt: RetentionTime,
        spectrum: Spectrum,
    ) -> Self {
        Peak {
            id: PeakId(id),
            sample: SampleId(String::new()),
            rt,
            spectrum,
        }
    }
}

/// The ordered peaks detected in one run.
#[derive(Debug, Clone)]
pub struct PeakList {
    sample_id: SampleId,
    peaks: Vec<Peak>,
}

impl PeakList {
    pub fn new(
        sample_id: SampleId,
        mut peaks: Vec<Peak>,
    ) -> Result<Self, DataError> {
        let mut seen = BTreeSet::new();
        for peak in peaks.iter_mut() {
            if !seen.insert(peak.id) {
                return Err(DataError::DuplicatePeakId {
                    sample: sample_id,
                    peak: peak.id,
                });
            }
            if peak.spectrum.masses.len() != peak.spectrum.intensities.len() {
                return Err(DataError::SpectrumLength {
                    sample: sample_id,
                    peak: peak.id,
                    masses: peak.spectrum.masses.len(),
                    intensities: peak.spectrum.intensities.len(),
                });
            }
            if !peak.spectrum.masses.windows(2).all(|w| w[0] <= w[1]) {
                return Err(DataError::UnsortedSpectrum {
                    sample: sample_id,
                    peak: peak.id,
                });
            }
            if !peak.rt.as_slice().iter().all(|v| v.is_finite()) {
                return Err(DataError::InvalidRetentionTime {
                    sample: sample_id,
                    peak: peak.id,
                });
            }
            peak.sample = sample_id.clone();
        }

        Ok(PeakList { sample_id, peaks })
    }

    pub fn sample_id(&self) -> &SampleId {
        &self.sample_id
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// Indices of the peaks sorted by their first retention time.
    pub fn rt_sorted_indices(&self) -> Vec<usize> {
        let mut order = (0..self.peaks.len()).collect::<Vec<_>>();
        order.sort_by(|a, b| {
            self.peaks[*a]
                .rt
                .rt1()
                .total_cmp(&self.peaks[*b].rt.rt1())
                .then(a.cmp(b))
        });
        order
    }
}

/// Flattens all samples of an alignment into one index space.
///
/// Sample `s` owns the keys `offsets[s]..offsets[s + 1]`, in the same order
/// as its peak list.
#[derive(Debug, Clone)]
pub struct PeakArena {
    samples: Vec<PeakList>,
    offsets: Vec<usize>,
    key_samples: Vec<usize>,
}

impl PeakArena {
    pub fn new(samples: Vec<PeakList>) -> Result<Self, DataError> {
        let mut seen = BTreeSet::new();
        let mut rt_dims: Option<usize> = None;
        let mut offsets = Vec::with_capacity(samples.len() + 1);
        let mut key_samples = Vec::new();

        offsets.push(0);
        for (sample_index, sample) in samples.iter().enumerate() {
            if !seen.insert(sample.sample_id().clone()) {
                return Err(DataError::DuplicateSampleId(sample.sample_id().clone()));
            }

            for peak in sample.peaks() {
                let dims = peak.rt.dims();
                match rt_dims {
                    None => rt_dims = Some(dims),
                    Some(expected) if expected != dims => {
                        return Err(DataError::DimensionMismatch {
                            sample: sample.sample_id().clone(),
                            peak: peak.id,
                            expected,
                            found: dims,
                        });
                    },
                    _ => {},
                }
                key_samples.push(sample_index);
            }
            offsets.push(key_samples.len());
        }

        Ok(PeakArena {
            samples,
            offsets,
            key_samples,
        })
    }

    pub fn len(&self) -> usize {
        self.key_samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_samples.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[PeakList] {
        &self.samples
    }

    pub fn sample(
        &self,
        sample_index: usize,
    ) -> &PeakList {
        &self.samples[sample_index]
    }

    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.samples.iter().map(|s| s.sample_id().clone()).collect()
    }

    pub fn sample_index(
        &self,
        sample_id: &SampleId,
    ) -> Option<usize> {
        self.samples.iter().position(|s| s.sample_id() == sample_id)
    }

    pub fn key(
        &self,
        sample_index: usize,
        peak_index: usize,
    ) -> PeakKey {
        debug_assert!(peak_index < self.samples[sample_index].len());
        PeakKey(self.offsets[sample_index] + peak_index)
    }

    pub fn keys_of_sample(
        &self,
        sample_index: usize,
    ) -> impl Iterator<Item = PeakKey> {
        self.key_range(sample_index).map(PeakKey)
    }

    pub fn key_range(
        &self,
        sample_index: usize,
    ) -> Range<usize> {
        self.offsets[sample_index]..self.offsets[sample_index + 1]
    }

    pub fn keys(&self) -> impl Iterator<Item = PeakKey> {
        (0..self.len()).map(PeakKey)
    }

    pub fn sample_of(
        &self,
        key: PeakKey,
    ) -> usize {
        self.key_samples[key.0]
    }

    /// Position of the peak inside its own sample.
    pub fn local_index(
        &self,
        key: PeakKey,
    ) -> usize {
        key.0 - self.offsets[self.sample_of(key)]
    }

    pub fn peak(
        &self,
        key: PeakKey,
    ) -> &Peak {
        let sample = self.sample_of(key);
        &self.samples[sample].peaks()[self.local_index(key)]
    }
}
