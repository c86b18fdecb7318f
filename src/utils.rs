use std::time::{
    Duration,
    Instant,
};

use log::{
    log,
    Level,
};
use num_traits::Float;

/// Times a named section of work and reports it through `log` at a fixed level.
pub struct ContextTimer {
    start: Instant,
    name: String,
    level: Level,
    pub cumtime: Duration,
}

impl ContextTimer {
    pub fn new(
        name: &str,
        report_start: bool,
        level: Level,
    ) -> ContextTimer {
        let out = ContextTimer {
            start: Instant::now(),
            name: name.to_string(),
            level,
            cumtime: Duration::new(0, 0),
        };
        if report_start {
            log!(out.level, "Started: '{}'", out.name);
        }
        out
    }

    pub fn stop(
        &mut self,
        report: bool,
    ) -> Duration {
        let duration = self.start.elapsed();
        self.cumtime += duration;
        if report {
            self.report();
        }
        duration
    }

    pub fn report(&self) {
        log!(
            self.level,
            "Time elapsed in '{}' is: {:.02}s",
            self.name,
            self.cumtime.as_secs_f64()
        );
    }
}

/// Returns the `[left, right)` range of a slice sorted by `key` whose keys
/// fall within `[low, high]`.
///
/// ```rust
/// use peakmesh::utils::window_bounds;
/// let data = [1.0, 1.5, 1.5, 2.0, 2.5, 3.0, 3.5];
/// let (left, right) = window_bounds(&data, |x| *x, 1.5, 3.0);
/// assert_eq!(&data[left..right], &[1.5, 1.5, 2.0, 2.5, 3.0]);
/// let (left, right) = window_bounds(&data, |x| *x, 10., 11.);
/// assert_eq!(left, right);
/// ```
pub fn window_bounds<E, F>(
    sorted: &[E],
    key: F,
    low: f64,
    high: f64,
) -> (usize, usize)
where
    F: Fn(&E) -> f64,
{
    let left = sorted.partition_point(|x| key(x) < low);
    let right = left + sorted[left..].partition_point(|x| key(x) <= high);
    (left, right)
}

// Welford's single pass update:
// https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Welford's_online_algorithm

/// Mean and variance of a stream of values without storing them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats<T> {
    n: u64,
    mean: T,
    m2: T,
    min: Option<T>,
    max: Option<T>,
}

impl<T: Float> Default for RunningStats<T> {
    fn default() -> Self {
        RunningStats {
            n: 0,
            mean: T::zero(),
            m2: T::zero(),
            min: None,
            max: None,
        }
    }
}

impl<T: Float> RunningStats<T> {
    pub fn add(
        &mut self,
        x: T,
    ) {
        self.n += 1;
        let n = T::from(self.n).unwrap_or_else(T::one);
        let delta = x - self.mean;
        self.mean = self.mean + delta / n;
        let delta2 = x - self.mean;
        self.m2 = self.m2 + delta * delta2;

        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    /// Population variance. Zero when fewer than two values were added.
    pub fn variance(&self) -> T {
        if self.n < 2 {
            return T::zero();
        }
        self.m2 / T::from(self.n).unwrap_or_else(T::one)
    }

    pub fn sd(&self) -> T {
        self.variance().sqrt()
    }

    pub fn mean(&self) -> T {
        self.mean
    }

    pub fn min(&self) -> Option<T> {
        self.min
    }

    pub fn max(&self) -> Option<T> {
        self.max
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Stats {
    pub mean: f64,
    pub sd: f64,
    pub n: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub fn get_stats(data: &[f64]) -> Stats {
    let mut calc = RunningStats::<f64>::default();
    for x in data.iter() {
        calc.add(*x);
    }
    Stats {
        mean: calc.mean(),
        sd: calc.sd(),
        n: calc.n(),
        min: calc.min(),
        max: calc.max(),
    }
}

#[cfg(test)]
mod test_running_stats {
    use super::*;

    // Population variance of 10.0, mean of 9.0
    const ASCOMBES_QX: [f64; 11] = [10., 8., 13., 9., 11., 14., 6., 4., 12., 7., 5.];
    // Population variance of 3.75 +- 0.01, mean of 7.5
    const ASCOMBES_Q1: [f64; 11] = [
        8.04, 6.95, 7.58, 8.81, 8.33, 9.96, 7.24, 4.26, 10.84, 4.82, 5.68,
    ];

    fn assert_close(
        a: f64,
        b: f64,
    ) {
        assert!((a - b).abs() < 1e-3, "{} != {}", a, b);
    }

    #[test]
    fn test_running_stats() {
        let mut calc = RunningStats::<f64>::default();
        calc.add(1.0);
        assert_eq!(calc.variance(), 0.);
        calc.add(1.0);
        assert_eq!(calc.mean(), 1.0);
        assert_eq!(calc.variance(), 0.);

        let mut calc = RunningStats::<f64>::default();
        for x in ASCOMBES_QX.iter() {
            calc.add(*x);
        }
        assert_close(calc.mean(), 9.0);
        assert_close(calc.variance(), 10.0);
        assert_eq!(calc.min(), Some(4.));
        assert_eq!(calc.max(), Some(14.));

        let mut calc = RunningStats::<f32>::default();
        for x in ASCOMBES_Q1.iter() {
            calc.add(*x as f32);
        }
        assert_close(calc.mean() as f64, 7.50);
        assert_close(calc.variance() as f64, 3.752);
    }

    #[test]
    fn test_window_bounds_edges() {
        let empty: [f64; 0] = [];
        assert_eq!(window_bounds(&empty, |x| *x, 0., 1.), (0, 0));

        let data = [1.0, 2.0, 3.0];
        assert_eq!(window_bounds(&data, |x| *x, -5., -4.), (0, 0));
        assert_eq!(window_bounds(&data, |x| *x, 2., 2.), (1, 2));
        assert_eq!(window_bounds(&data, |x| *x, 0., 10.), (0, 3));
    }
}
