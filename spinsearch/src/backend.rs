use crate::{
    evaluate_candidate, AcceleratorBackend, AcceleratorOptions, BackendError, CandidateOutcome,
    Progress, SearchContext,
};
use control::BackendKind;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use spin::SearchResult;
use std::ops::Range;
use utility::get_chunks;

pub trait SearchBackend: Sync {
    fn name(&self) -> &str;

    /// Accepted candidates of `range`, sorted by id.
    fn evaluate_range(
        &self,
        ctx: &SearchContext,
        range: Range<u64>,
        progress: &Progress,
    ) -> Result<Vec<SearchResult>, BackendError>;

    /// Accepted candidates among `ids`, sorted by id.
    fn evaluate_ids(
        &self,
        ctx: &SearchContext,
        ids: &[u64],
        progress: &Progress,
    ) -> Result<Vec<SearchResult>, BackendError>;
}

pub fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Fixed pool of worker threads, each owning one contiguous slice of the work.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    num_threads: usize,
}

impl CpuBackend {
    /// `num_threads = 0` uses every available core.
    pub fn new(num_threads: usize) -> CpuBackend {
        let num_threads = if num_threads == 0 {
            available_threads()
        } else {
            num_threads
        };

        CpuBackend { num_threads }
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    // Item k of [0, n_items) is candidate id_of(k). Workers keep their hits
    // locally and merge once at the end of their slice.
    fn run<F>(
        &self,
        ctx: &SearchContext,
        n_items: u64,
        id_of: F,
        progress: &Progress,
    ) -> Result<Vec<SearchResult>, BackendError>
    where
        F: Fn(u64) -> u64 + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .map_err(|e| BackendError::ThreadPool(e.to_string()))?;

        let merged: Mutex<Vec<SearchResult>> = Mutex::new(Vec::new());
        let chunks = get_chunks(n_items, self.num_threads);

        debug!(
            "cpu backend: {} items over {} threads",
            n_items, self.num_threads
        );

        pool.scope(|s| {
            for chunk in chunks.into_iter().filter(|c| !c.is_empty()) {
                let merged = &merged;
                let id_of = &id_of;

                s.spawn(move |_| {
                    let mut local = Vec::new();

                    for k in chunk {
                        match evaluate_candidate(ctx, id_of(k)) {
                            CandidateOutcome::Accepted(r) => {
                                progress.record(Some(&r));
                                local.push(r);
                            }
                            _ => progress.record(None),
                        }
                    }

                    merged.lock().extend(local);
                });
            }
        });

        let mut results = merged.into_inner();
        results.sort_by_key(|r| r.id);

        Ok(results)
    }
}

impl SearchBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn evaluate_range(
        &self,
        ctx: &SearchContext,
        range: Range<u64>,
        progress: &Progress,
    ) -> Result<Vec<SearchResult>, BackendError> {
        let start = range.start;
        let n_items = range.end.saturating_sub(range.start);

        self.run(ctx, n_items, |k| start + k, progress)
    }

    fn evaluate_ids(
        &self,
        ctx: &SearchContext,
        ids: &[u64],
        progress: &Progress,
    ) -> Result<Vec<SearchResult>, BackendError> {
        self.run(ctx, ids.len() as u64, |k| ids[k as usize], progress)
    }
}

/// Backends available to a search. The cpu backend is always present and
/// takes over when the accelerator cannot be used.
pub struct BackendSelection {
    accelerator: Option<AcceleratorBackend>,
    cpu: CpuBackend,
    fallback: bool,
}

impl BackendSelection {
    pub fn cpu(num_threads: usize) -> BackendSelection {
        BackendSelection {
            accelerator: None,
            cpu: CpuBackend::new(num_threads),
            fallback: false,
        }
    }

    pub fn get_accelerator(&self) -> Option<&AcceleratorBackend> {
        self.accelerator.as_ref()
    }

    pub fn get_cpu(&self) -> &CpuBackend {
        &self.cpu
    }

    /// Whether an accelerator was asked for but is not in use.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn label(&self) -> String {
        match (&self.accelerator, self.fallback) {
            (Some(acc), _) => acc.name().to_string(),
            (None, true) => format!("{} (accelerator fallback)", self.cpu.name()),
            (None, false) => self.cpu.name().to_string(),
        }
    }

    /// Runs `f` on the accelerator if there is one, and on the cpu backend
    /// if there is none or it fails. Returns the results and the label of
    /// the backend that produced them.
    pub fn run_with_fallback<F>(
        &self,
        progress: &Progress,
        f: F,
    ) -> Result<(Vec<SearchResult>, String), BackendError>
    where
        F: Fn(&dyn SearchBackend) -> Result<Vec<SearchResult>, BackendError>,
    {
        if let Some(acc) = &self.accelerator {
            match f(acc) {
                Ok(results) => return Ok((results, acc.name().to_string())),
                Err(err) => {
                    warn!("accelerator failed ({}); continuing on cpu", err);
                    progress.reset();

                    let results = f(&self.cpu)?;
                    return Ok((
                        results,
                        format!("{} (accelerator fallback)", self.cpu.name()),
                    ));
                }
            }
        }

        let results = f(&self.cpu)?;

        Ok((results, self.label()))
    }
}

/// Builds the backends for `kind`. A failed accelerator initialization is
/// logged and leaves the search on the cpu backend.
pub fn select_backend(
    kind: BackendKind,
    ctx: &SearchContext,
    num_threads: usize,
    options: AcceleratorOptions,
) -> BackendSelection {
    let mut selection = BackendSelection::cpu(num_threads);

    if kind == BackendKind::Accelerator {
        match AcceleratorBackend::new(ctx, num_threads, options) {
            Ok(acc) => {
                info!("accelerator backend initialized");
                selection.accelerator = Some(acc);
            }
            Err(err) => {
                warn!(
                    "accelerator initialization failed ({}); running in degraded mode on cpu",
                    err
                );
                selection.fallback = true;
            }
        }
    }

    info!("search backend: {}", selection.label());

    selection
}
