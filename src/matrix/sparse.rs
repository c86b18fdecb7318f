use std::collections::HashMap;

use super::{
    check_bounds,
    is_default,
    PairwiseValueMap,
};

/// Hash backed storage of the non-default cells only.
#[derive(Debug, Clone)]
pub struct SparseValueMap {
    rows: usize,
    cols: usize,
    default_value: f64,
    values: HashMap<(usize, usize), f64>,
}

impl SparseValueMap {
    pub fn new(
        rows: usize,
        cols: usize,
        default_value: f64,
    ) -> Self {
        SparseValueMap {
            rows,
            cols,
            default_value,
            values: HashMap::new(),
        }
    }

    pub fn iter_stored(&self) -> Vec<(usize, usize, f64)> {
        let mut out = self
            .values
            .iter()
            .map(|((r, c), v)| (*r, *c, *v))
            .collect::<Vec<_>>();
        out.sort_unstable_by_key(|(r, c, _)| (*r, *c));
        out
    }
}

impl PairwiseValueMap for SparseValueMap {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn default_value(&self) -> f64 {
        self.default_value
    }

    fn get(
        &self,
        row: usize,
        col: usize,
    ) -> f64 {
        check_bounds(self.rows, self.cols, row, col, false);
        *self.values.get(&(row, col)).unwrap_or(&self.default_value)
    }

    fn set(
        &mut self,
        row: usize,
        col: usize,
        value: f64,
    ) {
        check_bounds(self.rows, self.cols, row, col, false);
        if is_default(value, self.default_value) {
            self.values.remove(&(row, col));
        } else {
            self.values.insert((row, col), value);
        }
    }

    fn num_stored(&self) -> usize {
        self.values.len()
    }
}
