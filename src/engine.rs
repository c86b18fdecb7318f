use std::collections::BTreeMap;
use std::ops::Range;
use std::panic::{
    catch_unwind,
    AssertUnwindSafe,
};
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

use indicatif::ParallelProgressIterator;
use log::{
    debug,
    info,
    warn,
    Level,
};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    AlignmentError,
    ConfigError,
};
use crate::matrix::{
    PairwiseValueMap,
    SimilarityMatrix,
    StorageChoice,
};
use crate::peaks::{
    PeakArena,
    PeakKey,
    PeakList,
};
use crate::similarity::ScalarArraySimilarity;
use crate::utils::{
    window_bounds,
    ContextTimer,
};

/// Score of pairs that were pruned by the retention time window or whose
/// similarity was NaN.
pub const INCOMPARABLE: f64 = f64::NEG_INFINITY;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct EngineConfig {
    pub max_rt_difference: f64,
    pub max_rt2_difference: Option<f64>,
    pub assume_symmetric: bool,
    /// Size of the pool to build with `build_thread_pool`. An engine always
    /// runs on the pool it is handed.
    pub num_threads: usize,
    /// Side of the square sub-blocks each task scores. 0 scores a whole
    /// sample pair in one task.
    pub tile_size: usize,
    pub storage: StorageChoice,
    pub show_progress: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_rt_difference: 30.,
            max_rt2_difference: None,
            assume_symmetric: true,
            num_threads: 4,
            tile_size: 512,
            storage: StorageChoice::Auto,
            show_progress: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::EmptyPool);
        }
        non_negative("max_rt_difference", self.max_rt_difference)?;
        if let Some(max_rt2) = self.max_rt2_difference {
            non_negative("max_rt2_difference", max_rt2)?;
        }
        Ok(())
    }
}

fn non_negative(
    name: &'static str,
    value: f64,
) -> Result<(), ConfigError> {
    if value.is_nan() || value < 0. {
        return Err(ConfigError::InvalidParameter {
            name,
            value,
            reason: "must be zero or positive",
        });
    }
    Ok(())
}

pub fn build_thread_pool(num_threads: usize) -> Result<ThreadPool, ConfigError> {
    if num_threads == 0 {
        return Err(ConfigError::EmptyPool);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("peakmesh-similarity-{}", i))
        .build()?;
    Ok(pool)
}

/// Shared flag to abort a similarity computation. Tasks that have not
/// started when it is set are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineReport {
    pub num_pairs: usize,
    pub num_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
    pub scored_cells: usize,
}

/// One rectangular block of a sample pair.
#[derive(Debug, Clone)]
struct PairTask {
    a: usize,
    b: usize,
    rows: Range<usize>,
    cols: Range<usize>,
}

enum TaskOutcome {
    Scored(Vec<(usize, usize, f64)>),
    Failed(String),
    Skipped,
}

/// Peak indices of one sample ordered by first retention time, with the
/// matching sorted retention times for window searches.
struct RtOrder {
    order: Vec<usize>,
    rts: Vec<f64>,
}

impl RtOrder {
    fn new(list: &PeakList) -> Self {
        let order = list.rt_sorted_indices();
        let rts = order.iter().map(|i| list.peaks()[*i].rt.rt1()).collect();
        RtOrder { order, rts }
    }
}

pub struct SimilarityEngine {
    config: EngineConfig,
    similarity: Arc<dyn ScalarArraySimilarity>,
    pool: Arc<ThreadPool>,
    cancel: CancellationToken,
}

impl SimilarityEngine {
    pub fn new(
        config: EngineConfig,
        similarity: Arc<dyn ScalarArraySimilarity>,
        pool: Arc<ThreadPool>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.num_threads != pool.current_num_threads() {
            warn!(
                "Configured num_threads {} differs from the supplied pool ({} threads), using the pool",
                config.num_threads,
                pool.current_num_threads()
            );
        }
        Ok(SimilarityEngine {
            config,
            similarity,
            pool,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Worker count of the pool scoring runs on.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Unordered pairs `a < b` when the similarity is declared symmetric,
    /// every ordered pair `a != b` otherwise.
    pub fn sample_pairs(
        &self,
        num_samples: usize,
    ) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for a in 0..num_samples {
            for b in 0..num_samples {
                if a == b || (self.config.assume_symmetric && b < a) {
                    continue;
                }
                out.push((a, b));
            }
        }
        out
    }

    fn tile_ranges(
        &self,
        len: usize,
    ) -> Vec<Range<usize>> {
        if len == 0 {
            return Vec::new();
        }
        let size = if self.config.tile_size == 0 {
            len
        } else {
            self.config.tile_size
        };
        (0..len)
            .step_by(size)
            .map(|start| start..(start + size).min(len))
            .collect()
    }

    fn plan_tasks(
        &self,
        pairs: &[(usize, usize)],
        lens: &[usize],
    ) -> Vec<PairTask> {
        let mut tasks = Vec::new();
        for (a, b) in pairs.iter() {
            for rows in self.tile_ranges(lens[*a]) {
                for cols in self.tile_ranges(lens[*b]) {
                    tasks.push(PairTask {
                        a: *a,
                        b: *b,
                        rows: rows.clone(),
                        cols,
                    });
                }
            }
        }
        tasks
    }

    /// Scores the cells of one block whose retention times are within the
    /// configured window. Errors and panics of the similarity function turn
    /// the whole block into a failure.
    fn score_block(
        &self,
        a: &PeakList,
        b: &PeakList,
        b_order: &RtOrder,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> TaskOutcome {
        if self.cancel.is_cancelled() {
            return TaskOutcome::Skipped;
        }

        let max_rt = self.config.max_rt_difference;
        let out = catch_unwind(AssertUnwindSafe(|| {
            let mut cells = Vec::new();
            for i in rows.clone() {
                let peak_a = &a.peaks()[i];
                let rt_a = peak_a.rt.rt1();
                // Widened slightly, the exact check below decides.
                let slack = 1e-9 * (1. + rt_a.abs() + max_rt);
                let (left, right) = window_bounds(
                    &b_order.rts,
                    |x| *x,
                    rt_a - max_rt - slack,
                    rt_a + max_rt + slack,
                );

                for j in b_order.order[left..right].iter().copied() {
                    if !cols.contains(&j) {
                        continue;
                    }
                    let peak_b = &b.peaks()[j];
                    if (rt_a - peak_b.rt.rt1()).abs() > max_rt {
                        continue;
                    }
                    if let (Some(max_rt2), Some(rt2_a), Some(rt2_b)) = (
                        self.config.max_rt2_difference,
                        peak_a.rt.rt2(),
                        peak_b.rt.rt2(),
                    ) {
                        if (rt2_a - rt2_b).abs() > max_rt2 {
                            continue;
                        }
                    }

                    let score = self.similarity.score(
                        peak_a.rt.as_slice(),
                        peak_b.rt.as_slice(),
                        &peak_a.spectrum,
                        &peak_b.spectrum,
                    )?;
                    if !score.is_nan() {
                        cells.push((i, j, score));
                    }
                }
            }
            Ok::<_, crate::error::SimilarityError>(cells)
        }));

        match out {
            Ok(Ok(cells)) => TaskOutcome::Scored(cells),
            Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                TaskOutcome::Failed(format!("similarity panicked: {}", msg))
            },
        }
    }

    fn run_tasks(
        &self,
        samples: &[&PeakList],
        tasks: Vec<PairTask>,
    ) -> Vec<(PairTask, TaskOutcome)> {
        let orders = samples.iter().map(|s| RtOrder::new(s)).collect::<Vec<_>>();
        let progbar = if self.config.show_progress {
            indicatif::ProgressBar::new(tasks.len() as u64)
        } else {
            indicatif::ProgressBar::hidden()
        };

        // The collect is the barrier between scoring and assembly.
        self.pool.install(|| {
            tasks
                .into_par_iter()
                .progress_with(progbar)
                .map(|task| {
                    let outcome = self.score_block(
                        samples[task.a],
                        samples[task.b],
                        &orders[task.b],
                        task.rows.clone(),
                        task.cols.clone(),
                    );
                    (task, outcome)
                })
                .collect::<Vec<_>>()
        })
    }

    fn assemble(
        &self,
        samples: &[&PeakList],
        pairs: &[(usize, usize)],
        outcomes: Vec<(PairTask, TaskOutcome)>,
    ) -> Result<(BTreeMap<(usize, usize), SimilarityMatrix>, EngineReport), AlignmentError> {
        let mut report = EngineReport {
            num_pairs: pairs.len(),
            num_tasks: outcomes.len(),
            ..Default::default()
        };

        let mut cells: BTreeMap<(usize, usize), Vec<(usize, usize, f64)>> =
            pairs.iter().map(|p| (*p, Vec::new())).collect();
        for (task, outcome) in outcomes {
            match outcome {
                TaskOutcome::Scored(scored) => {
                    report.scored_cells += scored.len();
                    cells.entry((task.a, task.b)).or_default().extend(scored);
                },
                TaskOutcome::Failed(msg) => {
                    report.failed_tasks += 1;
                    warn!(
                        "Similarity task for samples '{}' x '{}' (rows {:?}, cols {:?}) failed, leaving it incomparable: {}",
                        samples[task.a].sample_id(),
                        samples[task.b].sample_id(),
                        task.rows,
                        task.cols,
                        msg
                    );
                },
                TaskOutcome::Skipped => report.skipped_tasks += 1,
            }
        }

        if self.cancel.is_cancelled() {
            info!(
                "Similarity computation cancelled, {} of {} tasks skipped",
                report.skipped_tasks, report.num_tasks
            );
            return Err(AlignmentError::Cancelled);
        }

        let matrices = cells
            .into_iter()
            .map(|((a, b), scored)| {
                let rows = samples[a].len();
                let cols = samples[b].len();
                let total = rows * cols;
                let fill_ratio = if total == 0 {
                    0.
                } else {
                    scored.len() as f64 / total as f64
                };
                let kind = self.config.storage.resolve(fill_ratio);
                debug!(
                    "Pair '{}' x '{}': {} of {} cells scored, using {} storage",
                    samples[a].sample_id(),
                    samples[b].sample_id(),
                    scored.len(),
                    total,
                    kind.as_str()
                );
                let matrix = SimilarityMatrix::from_cells(rows, cols, kind, INCOMPARABLE, scored);
                ((a, b), matrix)
            })
            .collect();

        Ok((matrices, report))
    }

    /// Scores two peak lists against each other. Rows are `a`, columns `b`.
    pub fn compute_pair(
        &self,
        a: &PeakList,
        b: &PeakList,
    ) -> Result<(SimilarityMatrix, EngineReport), AlignmentError> {
        let samples = [a, b];
        let pairs = [(0, 1)];
        let tasks = self.plan_tasks(&pairs, &[a.len(), b.len()]);
        let outcomes = self.run_tasks(&samples, tasks);
        let (mut matrices, report) = self.assemble(&samples, &pairs, outcomes)?;
        let matrix = matrices.remove(&(0, 1)).unwrap_or_else(|| {
            let kind = self.config.storage.resolve(0.);
            SimilarityMatrix::new(a.len(), b.len(), kind, INCOMPARABLE)
        });
        Ok((matrix, report))
    }

    /// Scores every required sample pair of the arena.
    pub fn compute_all(
        &self,
        arena: &PeakArena,
    ) -> Result<PairwiseSimilarities, AlignmentError> {
        let mut timer = ContextTimer::new("similarity_engine", true, Level::Info);
        let samples = arena.samples().iter().collect::<Vec<_>>();
        let lens = samples.iter().map(|s| s.len()).collect::<Vec<_>>();
        let pairs = self.sample_pairs(samples.len());
        let tasks = self.plan_tasks(&pairs, &lens);
        info!(
            "Scoring {} sample pairs in {} tasks on {} threads (symmetric: {})",
            pairs.len(),
            tasks.len(),
            self.num_threads(),
            self.config.assume_symmetric
        );

        let outcomes = self.run_tasks(&samples, tasks);
        let (matrices, report) = self.assemble(&samples, &pairs, outcomes)?;
        info!(
            "Scored {} cells, {} failed tasks",
            report.scored_cells, report.failed_tasks
        );
        timer.stop(true);

        Ok(PairwiseSimilarities {
            num_samples: samples.len(),
            symmetric: self.config.assume_symmetric,
            matrices,
            report,
        })
    }
}

/// Matrices for every computed sample pair.
///
/// In symmetric mode only `(a, b)` with `a < b` is stored and `(b, a)`
/// reads the same cells transposed.
#[derive(Debug, Clone)]
pub struct PairwiseSimilarities {
    num_samples: usize,
    symmetric: bool,
    matrices: BTreeMap<(usize, usize), SimilarityMatrix>,
    report: EngineReport,
}

impl PairwiseSimilarities {
    pub fn report(&self) -> &EngineReport {
        &self.report
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Matrix holding the scores of `a` against `b` and whether it has to be
    /// read transposed (rows are `b`).
    pub fn matrix(
        &self,
        a: usize,
        b: usize,
    ) -> Option<(&SimilarityMatrix, bool)> {
        if let Some(m) = self.matrices.get(&(a, b)) {
            return Some((m, false));
        }
        if self.symmetric {
            return self.matrices.get(&(b, a)).map(|m| (m, true));
        }
        None
    }

    pub fn score(
        &self,
        a: usize,
        i: usize,
        b: usize,
        j: usize,
    ) -> f64 {
        match self.matrix(a, b) {
            Some((m, false)) => m.get(i, j),
            Some((m, true)) => m.get(j, i),
            None => INCOMPARABLE,
        }
    }

    /// Peak of sample `b` scoring highest against peak `i` of sample `a`.
    /// Ties go to the lowest index; `None` when nothing is comparable.
    pub fn best_hit(
        &self,
        a: usize,
        i: usize,
        b: usize,
    ) -> Option<usize> {
        let (m, transposed) = self.matrix(a, b)?;
        let best = if transposed {
            m.index_of_max_in_column(i)?
        } else {
            let mut best: Option<(usize, f64)> = None;
            for j in 0..m.cols() {
                let v = m.get(i, j);
                if best.map_or(true, |(_, b)| v > b) {
                    best = Some((j, v));
                }
            }
            best?.0
        };
        if self.score(a, i, b, best) == INCOMPARABLE {
            None
        } else {
            Some(best)
        }
    }

    /// Publishes every stored score into the per-peak similarity maps.
    pub fn to_index(
        &self,
        arena: &PeakArena,
    ) -> SimilarityIndex {
        let mut index = SimilarityIndex::new(arena.len());
        for ((a, b), matrix) in self.matrices.iter() {
            for (i, j, score) in matrix.iter_stored() {
                let key_a = arena.key(*a, i);
                let key_b = arena.key(*b, j);
                if self.symmetric {
                    index.set_symmetric(key_a, key_b, score);
                } else {
                    index.set(key_a, key_b, score);
                }
            }
        }
        index
    }
}

/// Per-peak similarity maps, indexed by arena key. `maps[a][b]` is the
/// score of `a` against `b`.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    maps: Vec<BTreeMap<PeakKey, f64>>,
}

impl SimilarityIndex {
    pub fn new(num_peaks: usize) -> Self {
        SimilarityIndex {
            maps: vec![BTreeMap::new(); num_peaks],
        }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn set(
        &mut self,
        from: PeakKey,
        to: PeakKey,
        score: f64,
    ) {
        if score.is_nan() || score == INCOMPARABLE {
            return;
        }
        self.maps[from.0].insert(to, score);
    }

    pub fn set_symmetric(
        &mut self,
        a: PeakKey,
        b: PeakKey,
        score: f64,
    ) {
        self.set(a, b, score);
        self.set(b, a, score);
    }

    pub fn get(
        &self,
        from: PeakKey,
        to: PeakKey,
    ) -> f64 {
        *self.maps[from.0].get(&to).unwrap_or(&INCOMPARABLE)
    }

    pub fn map(
        &self,
        key: PeakKey,
    ) -> &BTreeMap<PeakKey, f64> {
        &self.maps[key.0]
    }
}

#[cfg(test)]
mod test_engine {
    use super::*;
    use crate::error::SimilarityError;
    use crate::matrix::StorageKind;
    use crate::peaks::{
        Peak,
        RetentionTime,
        Spectrum,
    };
    use crate::similarity::SimilarityConfig;

    fn list(
        name: &str,
        rts: &[f64],
    ) -> PeakList {
        let peaks = rts
            .iter()
            .enumerate()
            .map(|(i, rt)| {
                Peak::new(
                    i as u64,
                    RetentionTime::one(*rt),
                    Spectrum::new(vec![50., 73.], vec![100., 10. + i as f64]),
                )
            })
            .collect();
        PeakList::new(name.into(), peaks).unwrap()
    }

    fn engine_with(
        config: EngineConfig,
        similarity: Arc<dyn ScalarArraySimilarity>,
    ) -> SimilarityEngine {
        let pool = Arc::new(build_thread_pool(2).unwrap());
        SimilarityEngine::new(config, similarity, pool).unwrap()
    }

    fn rt_difference(
        rt_a: &[f64],
        rt_b: &[f64],
        _: &Spectrum,
        _: &Spectrum,
    ) -> Result<f64, SimilarityError> {
        Ok(1. / (1. + (rt_a[0] - rt_b[0]).abs()))
    }

    #[test]
    fn test_window_pruning() {
        let config = EngineConfig {
            max_rt_difference: 5.,
            tile_size: 2,
            ..Default::default()
        };
        let engine = engine_with(config, Arc::new(rt_difference));
        let a = list("a", &[10., 50., 20.]);
        let b = list("b", &[52., 14.9, 10., 100., 25.]);
        let (m, report) = engine.compute_pair(&a, &b).unwrap();

        for i in 0..a.len() {
            for j in 0..b.len() {
                let diff = (a.peaks()[i].rt.rt1() - b.peaks()[j].rt.rt1()).abs();
                if diff > 5. {
                    assert_eq!(m.get(i, j), INCOMPARABLE);
                } else {
                    assert_eq!(m.get(i, j), 1. / (1. + diff));
                }
            }
        }
        // 10-14.9, 10-10, 50-52, 20-25; 20-14.9 is just outside
        assert_eq!(report.scored_cells, 4);
        // 2 row tiles x 3 col tiles
        assert_eq!(report.num_tasks, 2 * 3);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let config = EngineConfig {
            max_rt_difference: 1.,
            ..Default::default()
        };
        let engine = engine_with(config, Arc::new(rt_difference));
        let (m, _) = engine
            .compute_pair(&list("a", &[10.]), &list("b", &[11.]))
            .unwrap();
        assert_eq!(m.get(0, 0), 0.5);
    }

    #[test]
    fn test_pair_enumeration() {
        let symmetric = engine_with(EngineConfig::default(), Arc::new(rt_difference));
        assert_eq!(symmetric.sample_pairs(3), vec![(0, 1), (0, 2), (1, 2)]);

        let ordered = engine_with(
            EngineConfig {
                assume_symmetric: false,
                ..Default::default()
            },
            Arc::new(rt_difference),
        );
        assert_eq!(ordered.sample_pairs(3).len(), 6);
        assert_eq!(ordered.sample_pairs(1).len(), 0);
    }

    #[test]
    fn test_symmetric_scores_are_shared() {
        let engine = engine_with(EngineConfig::default(), SimilarityConfig::default().build().unwrap());
        let arena = PeakArena::new(vec![
            list("a", &[10., 20.3, 31.]),
            list("b", &[10.4, 19.]),
            list("c", &[]),
        ])
        .unwrap();
        let sims = engine.compute_all(&arena).unwrap();
        let index = sims.to_index(&arena);

        for i in 0..3 {
            for j in 0..2 {
                let ab = sims.score(0, i, 1, j);
                let ba = sims.score(1, j, 0, i);
                assert_eq!(ab.to_bits(), ba.to_bits());
                let ka = arena.key(0, i);
                let kb = arena.key(1, j);
                assert_eq!(index.get(ka, kb).to_bits(), index.get(kb, ka).to_bits());
                assert_eq!(index.get(ka, kb).to_bits(), ab.to_bits());
            }
        }
        assert_eq!(sims.score(0, 0, 0, 0), INCOMPARABLE);
        assert_eq!(sims.report().num_pairs, 3);
    }

    #[test]
    fn test_ordered_mode_computes_both_directions() {
        // Deliberately asymmetric: favours the row peak eluting first
        let skewed = |rt_a: &[f64], rt_b: &[f64], _: &Spectrum, _: &Spectrum| -> Result<f64, SimilarityError> {
            Ok(if rt_a[0] <= rt_b[0] { 0.9 } else { 0.1 })
        };
        let engine = engine_with(
            EngineConfig {
                assume_symmetric: false,
                ..Default::default()
            },
            Arc::new(skewed),
        );
        let arena = PeakArena::new(vec![list("a", &[10.]), list("b", &[11.])]).unwrap();
        let sims = engine.compute_all(&arena).unwrap();
        assert_eq!(sims.score(0, 0, 1, 0), 0.9);
        assert_eq!(sims.score(1, 0, 0, 0), 0.1);

        let index = sims.to_index(&arena);
        assert_eq!(index.get(PeakKey(0), PeakKey(1)), 0.9);
        assert_eq!(index.get(PeakKey(1), PeakKey(0)), 0.1);
    }

    #[test]
    fn test_failing_task_is_isolated() {
        let picky = |rt_a: &[f64], _: &[f64], _: &Spectrum, _: &Spectrum| -> Result<f64, SimilarityError> {
            if rt_a[0] > 40. {
                Err(SimilarityError::Failed("late peak".into()))
            } else {
                Ok(1.)
            }
        };
        let config = EngineConfig {
            max_rt_difference: 100.,
            tile_size: 1,
            ..Default::default()
        };
        let engine = engine_with(config, Arc::new(picky));
        let (m, report) = engine
            .compute_pair(&list("a", &[10., 50.]), &list("b", &[12., 13.]))
            .unwrap();
        assert_eq!(report.failed_tasks, 2);
        assert_eq!(m.get(0, 0), 1.);
        assert_eq!(m.get(0, 1), 1.);
        assert_eq!(m.get(1, 0), INCOMPARABLE);
        assert_eq!(m.get(1, 1), INCOMPARABLE);
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let explosive = |rt_a: &[f64], _: &[f64], _: &Spectrum, _: &Spectrum| -> Result<f64, SimilarityError> {
            if rt_a[0] > 40. {
                panic!("boom");
            }
            Ok(0.5)
        };
        let config = EngineConfig {
            max_rt_difference: 100.,
            tile_size: 1,
            ..Default::default()
        };
        let engine = engine_with(config, Arc::new(explosive));
        let (m, report) = engine
            .compute_pair(&list("a", &[10., 50.]), &list("b", &[12.]))
            .unwrap();
        assert_eq!(report.failed_tasks, 1);
        assert_eq!(m.get(0, 0), 0.5);
        assert_eq!(m.get(1, 0), INCOMPARABLE);
    }

    #[test]
    fn test_nan_scores_are_incomparable() {
        let nan = |_: &[f64], _: &[f64], _: &Spectrum, _: &Spectrum| -> Result<f64, SimilarityError> {
            Ok(f64::NAN)
        };
        let engine = engine_with(EngineConfig::default(), Arc::new(nan));
        let (m, report) = engine
            .compute_pair(&list("a", &[10.]), &list("b", &[10.]))
            .unwrap();
        assert_eq!(m.get(0, 0), INCOMPARABLE);
        assert_eq!(report.scored_cells, 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        let engine = engine_with(EngineConfig::default(), Arc::new(rt_difference))
            .with_cancellation(token.clone());
        token.cancel();
        let arena = PeakArena::new(vec![list("a", &[10.]), list("b", &[10.])]).unwrap();
        assert!(matches!(
            engine.compute_all(&arena),
            Err(AlignmentError::Cancelled)
        ));
    }

    #[test]
    fn test_storage_selection() {
        let dense = engine_with(
            EngineConfig {
                storage: StorageChoice::Auto,
                ..Default::default()
            },
            Arc::new(rt_difference),
        );
        let (m, _) = dense
            .compute_pair(&list("a", &[10., 11.]), &list("b", &[10., 12.]))
            .unwrap();
        assert_eq!(m.kind(), StorageKind::Dense);

        let (m, _) = dense
            .compute_pair(&list("a", &[10., 500.]), &list("b", &[1000., 1200., 1300.]))
            .unwrap();
        assert_eq!(m.kind(), StorageKind::Sparse);

        let fixed = engine_with(
            EngineConfig {
                storage: StorageChoice::Fixed(StorageKind::RowCompressed),
                ..Default::default()
            },
            Arc::new(rt_difference),
        );
        let (m, _) = fixed
            .compute_pair(&list("a", &[10.]), &list("b", &[10.]))
            .unwrap();
        assert_eq!(m.kind(), StorageKind::RowCompressed);
    }

    #[test]
    fn test_rt2_window() {
        let make = |name: &str, rts: &[(f64, f64)]| {
            let peaks = rts
                .iter()
                .enumerate()
                .map(|(i, (rt1, rt2))| {
                    Peak::new(i as u64, RetentionTime::two(*rt1, *rt2), Spectrum::default())
                })
                .collect();
            PeakList::new(name.into(), peaks).unwrap()
        };
        let config = EngineConfig {
            max_rt_difference: 5.,
            max_rt2_difference: Some(0.5),
            ..Default::default()
        };
        let engine = engine_with(config, Arc::new(rt_difference));
        let (m, _) = engine
            .compute_pair(&make("a", &[(10., 1.)]), &make("b", &[(11., 1.2), (11., 2.)]))
            .unwrap();
        assert_eq!(m.get(0, 0), 0.5);
        assert_eq!(m.get(0, 1), INCOMPARABLE);
    }

    #[test]
    fn test_best_hit() {
        let engine = engine_with(EngineConfig::default(), Arc::new(rt_difference));
        let arena = PeakArena::new(vec![
            list("a", &[10., 200.]),
            list("b", &[13., 10.5, 10.5]),
        ])
        .unwrap();
        let sims = engine.compute_all(&arena).unwrap();
        assert_eq!(sims.best_hit(0, 0, 1), Some(1));
        assert_eq!(sims.best_hit(0, 1, 1), None);
        // Transposed lookup of the same matrix
        assert_eq!(sims.best_hit(1, 1, 0), Some(0));
    }

    #[test]
    fn test_zero_pool_is_rejected() {
        assert!(matches!(build_thread_pool(0), Err(ConfigError::EmptyPool)));
        let config = EngineConfig {
            num_threads: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPool)));
    }

    #[test]
    fn test_supplied_pool_sets_thread_count() {
        // Default config asks for 4 threads
        let engine = engine_with(EngineConfig::default(), Arc::new(rt_difference));
        assert_eq!(engine.config().num_threads, 4);
        assert_eq!(engine.num_threads(), 2);

        let (m, _) = engine
            .compute_pair(&list("a", &[10.]), &list("b", &[10.]))
            .unwrap();
        assert_eq!(m.get(0, 0), 1.);
    }
}
