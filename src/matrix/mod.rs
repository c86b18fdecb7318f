pub mod dense;
pub mod row_compressed;
pub mod sparse;

use std::fmt;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

pub use self::dense::DenseValueMap;
pub use self::row_compressed::RowCompressedValueMap;
pub use self::sparse::SparseValueMap;
use crate::error::ConfigError;

/// Fill ratio at or above which a dense layout is used.
pub const DENSE_FILL_RATIO: f64 = 0.5;
/// Fill ratio at or above which a row compressed layout is used.
pub const ROW_COMPRESSED_FILL_RATIO: f64 = 0.05;

/// A rows x cols container of pairwise values.
///
/// Every implementation must return the same values for the same sequence
/// of `set` calls; they only differ in memory layout. Indexing outside of
/// the shape is a programming error and panics.
pub trait PairwiseValueMap: Send + Sync {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    fn default_value(&self) -> f64;
    fn get(
        &self,
        row: usize,
        col: usize,
    ) -> f64;
    fn set(
        &mut self,
        row: usize,
        col: usize,
        value: f64,
    );
    /// Number of cells currently holding a non-default value.
    fn num_stored(&self) -> usize;

    fn checked_get(
        &self,
        row: usize,
        col: usize,
    ) -> Option<f64> {
        if row < self.rows() && col < self.cols() {
            Some(self.get(row, col))
        } else {
            None
        }
    }

    /// Row holding the largest value in `col`. Ties go to the lowest row,
    /// NaN cells are skipped. `None` only for matrices without rows.
    fn index_of_max_in_column(
        &self,
        col: usize,
    ) -> Option<usize> {
        extreme_in_column(self, col, |candidate, best| candidate > best)
    }

    /// Row holding the smallest value in `col`, same tie rules as the max.
    fn index_of_min_in_column(
        &self,
        col: usize,
    ) -> Option<usize> {
        extreme_in_column(self, col, |candidate, best| candidate < best)
    }
}

fn extreme_in_column<M: PairwiseValueMap + ?Sized>(
    map: &M,
    col: usize,
    better: impl Fn(f64, f64) -> bool,
) -> Option<usize> {
    check_bounds(map.rows(), map.cols(), 0, col, true);
    if map.rows() == 0 {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for row in 0..map.rows() {
        let value = map.get(row, col);
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, best_value)) if !better(value, best_value) => {},
            _ => best = Some((row, value)),
        }
    }

    Some(best.map_or(0, |(row, _)| row))
}

/// Panics when `(row, col)` is outside of a `rows x cols` shape.
/// `col_only` skips the row check, for column queries.
#[inline]
pub(crate) fn check_bounds(
    rows: usize,
    cols: usize,
    row: usize,
    col: usize,
    col_only: bool,
) {
    if (!col_only && row >= rows) || col >= cols {
        panic!(
            "Index ({}, {}) out of bounds for a {}x{} similarity matrix",
            row, col, rows, cols
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Dense,
    Sparse,
    RowCompressed,
}

impl StorageKind {
    pub fn for_fill_ratio(ratio: f64) -> StorageKind {
        if ratio >= DENSE_FILL_RATIO {
            StorageKind::Dense
        } else if ratio >= ROW_COMPRESSED_FILL_RATIO {
            StorageKind::RowCompressed
        } else {
            StorageKind::Sparse
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Dense => "dense",
            StorageKind::Sparse => "sparse",
            StorageKind::RowCompressed => "row_compressed",
        }
    }
}

/// Storage requested by configuration. `Auto` defers the choice until the
/// fill ratio of a pair is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageChoice {
    Auto,
    Fixed(StorageKind),
}

impl StorageChoice {
    pub fn resolve(
        &self,
        fill_ratio: f64,
    ) -> StorageKind {
        match self {
            StorageChoice::Auto => StorageKind::for_fill_ratio(fill_ratio),
            StorageChoice::Fixed(kind) => *kind,
        }
    }
}

impl Default for StorageChoice {
    fn default() -> Self {
        StorageChoice::Auto
    }
}

impl FromStr for StorageChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(StorageChoice::Auto),
            "dense" => Ok(StorageChoice::Fixed(StorageKind::Dense)),
            "sparse" => Ok(StorageChoice::Fixed(StorageKind::Sparse)),
            "row_compressed" => Ok(StorageChoice::Fixed(StorageKind::RowCompressed)),
            other => Err(ConfigError::UnknownStorageKind(other.to_string())),
        }
    }
}

impl TryFrom<String> for StorageChoice {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StorageChoice> for String {
    fn from(value: StorageChoice) -> Self {
        value.to_string()
    }
}

impl fmt::Display for StorageChoice {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            StorageChoice::Auto => write!(f, "auto"),
            StorageChoice::Fixed(kind) => write!(f, "{}", kind.as_str()),
        }
    }
}

/// Similarity scores between the peaks of two samples, in one of the
/// interchangeable layouts.
#[derive(Debug, Clone)]
pub enum SimilarityMatrix {
    Dense(DenseValueMap),
    Sparse(SparseValueMap),
    RowCompressed(RowCompressedValueMap),
}

impl SimilarityMatrix {
    pub fn new(
        rows: usize,
        cols: usize,
        kind: StorageKind,
        default_value: f64,
    ) -> SimilarityMatrix {
        match kind {
            StorageKind::Dense => {
                SimilarityMatrix::Dense(DenseValueMap::new(rows, cols, default_value))
            },
            StorageKind::Sparse => {
                SimilarityMatrix::Sparse(SparseValueMap::new(rows, cols, default_value))
            },
            StorageKind::RowCompressed => SimilarityMatrix::RowCompressed(
                RowCompressedValueMap::new(rows, cols, default_value),
            ),
        }
    }

    /// Builds a matrix from `(row, col, value)` triples.
    pub fn from_cells(
        rows: usize,
        cols: usize,
        kind: StorageKind,
        default_value: f64,
        cells: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> SimilarityMatrix {
        let mut out = SimilarityMatrix::new(rows, cols, kind, default_value);
        for (row, col, value) in cells {
            out.set(row, col, value);
        }
        out
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            SimilarityMatrix::Dense(_) => StorageKind::Dense,
            SimilarityMatrix::Sparse(_) => StorageKind::Sparse,
            SimilarityMatrix::RowCompressed(_) => StorageKind::RowCompressed,
        }
    }

    fn inner(&self) -> &dyn PairwiseValueMap {
        match self {
            SimilarityMatrix::Dense(m) => m,
            SimilarityMatrix::Sparse(m) => m,
            SimilarityMatrix::RowCompressed(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PairwiseValueMap {
        match self {
            SimilarityMatrix::Dense(m) => m,
            SimilarityMatrix::Sparse(m) => m,
            SimilarityMatrix::RowCompressed(m) => m,
        }
    }

    /// Non-default cells in row major order.
    pub fn iter_stored(&self) -> Vec<(usize, usize, f64)> {
        match self {
            SimilarityMatrix::Dense(m) => m.iter_stored().collect(),
            SimilarityMatrix::Sparse(m) => m.iter_stored(),
            SimilarityMatrix::RowCompressed(m) => m.iter_stored().collect(),
        }
    }
}

impl PairwiseValueMap for SimilarityMatrix {
    fn rows(&self) -> usize {
        self.inner().rows()
    }

    fn cols(&self) -> usize {
        self.inner().cols()
    }

    fn default_value(&self) -> f64 {
        self.inner().default_value()
    }

    fn get(
        &self,
        row: usize,
        col: usize,
    ) -> f64 {
        self.inner().get(row, col)
    }

    fn set(
        &mut self,
        row: usize,
        col: usize,
        value: f64,
    ) {
        self.inner_mut().set(row, col, value)
    }

    fn num_stored(&self) -> usize {
        self.inner().num_stored()
    }
}

/// Compares as equal when both are the same bits or both are the default,
/// so `-inf` defaults and NaN values are handled by the sparse layouts.
#[inline]
pub(crate) fn is_default(
    value: f64,
    default_value: f64,
) -> bool {
    value.to_bits() == default_value.to_bits()
}

#[cfg(test)]
mod test_matrix {
    use super::*;

    const KINDS: [StorageKind; 3] = [
        StorageKind::Dense,
        StorageKind::Sparse,
        StorageKind::RowCompressed,
    ];

    #[test]
    fn test_column_queries_agree() {
        let ops = [
            (0, 0, 0.5),
            (1, 0, 0.9),
            (2, 0, 0.9),
            (3, 1, -2.0),
            (0, 1, 4.0),
            (2, 2, f64::NAN),
            (1, 2, 0.1),
            (1, 0, 0.2),
        ];

        let mut results = Vec::new();
        for kind in KINDS {
            let mut m = SimilarityMatrix::new(4, 3, kind, 0.0);
            for (r, c, v) in ops {
                m.set(r, c, v);
            }
            let maxes = (0..3)
                .map(|c| m.index_of_max_in_column(c))
                .collect::<Vec<_>>();
            let mins = (0..3)
                .map(|c| m.index_of_min_in_column(c))
                .collect::<Vec<_>>();
            results.push((maxes, mins));
        }

        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
        // Column 0 is [0.5, 0.2, 0.9, 0.0]
        assert_eq!(results[0].0[0], Some(2));
        assert_eq!(results[0].1[0], Some(3));
        // Column 1 is [4.0, 0.0, 0.0, -2.0]
        assert_eq!(results[0].0[1], Some(0));
        assert_eq!(results[0].1[1], Some(3));
        // Column 2 is [0.0, 0.1, NaN, 0.0], NaN is skipped and the 0.0 tie goes to row 0
        assert_eq!(results[0].0[2], Some(1));
        assert_eq!(results[0].1[2], Some(0));
    }

    #[test]
    fn test_default_cells_are_not_stored() {
        for kind in KINDS {
            let mut m = SimilarityMatrix::new(3, 3, kind, f64::NEG_INFINITY);
            m.set(1, 1, 0.5);
            m.set(2, 0, 0.25);
            assert_eq!(m.num_stored(), 2);
            m.set(1, 1, f64::NEG_INFINITY);
            assert_eq!(m.num_stored(), 1);
            assert_eq!(m.get(1, 1), f64::NEG_INFINITY);
            assert_eq!(m.iter_stored(), vec![(2, 0, 0.25)]);
        }
    }

    #[test]
    fn test_empty_matrix_column_query() {
        for kind in KINDS {
            let m = SimilarityMatrix::new(0, 2, kind, 0.0);
            assert_eq!(m.index_of_max_in_column(1), None);
        }
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_get_panics_dense() {
        let m = SimilarityMatrix::new(2, 2, StorageKind::Dense, 0.0);
        m.get(2, 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_set_panics_sparse() {
        let mut m = SimilarityMatrix::new(2, 2, StorageKind::Sparse, 0.0);
        m.set(0, 5, 1.0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_column_panics_row_compressed() {
        let m = SimilarityMatrix::new(2, 2, StorageKind::RowCompressed, 0.0);
        m.index_of_max_in_column(2);
    }

    #[test]
    fn test_checked_get() {
        let m = SimilarityMatrix::new(2, 2, StorageKind::Sparse, 1.0);
        assert_eq!(m.checked_get(1, 1), Some(1.0));
        assert_eq!(m.checked_get(2, 1), None);
    }

    #[test]
    fn test_storage_choice_parsing() {
        assert_eq!("auto".parse::<StorageChoice>().unwrap(), StorageChoice::Auto);
        assert_eq!(
            "row_compressed".parse::<StorageChoice>().unwrap(),
            StorageChoice::Fixed(StorageKind::RowCompressed)
        );
        assert!(matches!(
            "banded".parse::<StorageChoice>(),
            Err(ConfigError::UnknownStorageKind(_))
        ));
        assert_eq!(StorageChoice::Auto.resolve(0.9), StorageKind::Dense);
        assert_eq!(StorageChoice::Auto.resolve(0.1), StorageKind::RowCompressed);
        assert_eq!(StorageChoice::Auto.resolve(0.001), StorageKind::Sparse);
        assert_eq!(
            StorageChoice::Fixed(StorageKind::Sparse).resolve(1.0),
            StorageKind::Sparse
        );
    }
}
