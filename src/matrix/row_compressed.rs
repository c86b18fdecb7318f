use super::{
    check_bounds,
    is_default,
    PairwiseValueMap,
};

/// One column-sorted `(col, value)` list per row. Lookups are a binary
/// search within the row.
#[derive(Debug, Clone)]
pub struct RowCompressedValueMap {
    cols: usize,
    default_value: f64,
    rows: Vec<Vec<(usize, f64)>>,
}

impl RowCompressedValueMap {
    pub fn new(
        rows: usize,
        cols: usize,
        default_value: f64,
    ) -> Self {
        RowCompressedValueMap {
            cols,
            default_value,
            rows: vec![Vec::new(); rows],
        }
    }

    pub fn iter_stored(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().map(move |(c, v)| (r, *c, *v)))
    }
}

impl PairwiseValueMap for RowCompressedValueMap {
    fn rows(&self) -> usize {
        self.rows.len()
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
        check_bounds(self.rows.len(), self.cols, row, col, false);
        let entries = &self.rows[row];
        match entries.binary_search_by_key(&col, |(c, _)| *c) {
            Ok(pos) => entries[pos].1,
            Err(_) => self.default_value,
        }
    }

    fn set(
        &mut self,
        row: usize,
        col: usize,
        value: f64,
    ) {
        check_bounds(self.rows.len(), self.cols, row, col, false);
        let remove = is_default(value, self.default_value);
        let entries = &mut self.rows[row];
        match entries.binary_search_by_key(&col, |(c, _)| *c) {
            Ok(pos) if remove => {
                entries.remove(pos);
            },
            Ok(pos) => entries[pos].1 = value,
            Err(_) if remove => {},
            Err(pos) => entries.insert(pos, (col, value)),
        }
    }

    fn num_stored(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }
}
