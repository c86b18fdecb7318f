use super::{
    check_bounds,
    is_default,
    PairwiseValueMap,
};

/// Row major `rows * cols` array. O(1) access, memory for every cell.
#[derive(Debug, Clone)]
pub struct DenseValueMap {
    rows: usize,
    cols: usize,
    default_value: f64,
    values: Vec<f64>,
}

impl DenseValueMap {
    pub fn new(
        rows: usize,
        cols: usize,
        default_value: f64,
    ) -> Self {
        DenseValueMap {
            rows,
            cols,
            default_value,
            values: vec![default_value; rows * cols],
        }
    }

    pub fn iter_stored(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let cols = self.cols.max(1);
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| !is_default(**v, self.default_value))
            .map(move |(i, v)| (i / cols, i % cols, *v))
    }
}

impl PairwiseValueMap for DenseValueMap {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    #[inline]
    fn get(
        &self,
        row: usize,
        col: usize,
    ) -> f64 {
        check_bounds(self.rows, self.cols, row, col, false);
        self.values[row * self.cols + col]
    }

    #[inline]
    fn set(
        &mut self,
        row: usize,
        col: usize,
        value: f64,
    ) {
        check_bounds(self.rows, self.cols, row, col, false);
        self.values[row * self.cols + col] = value;
    }

    fn num_stored(&self) -> usize {
        self.values
            .iter()
            .filter(|v| !is_default(**v, self.default_value))
            .count()
    }
}
