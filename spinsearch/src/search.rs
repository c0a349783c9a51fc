use crate::{
    BackendSelection, Progress, SearchBackend, SearchContext, SearchError, SearchMethod,
    SearchOutcome,
};
use amconsts::*;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spin::SearchResult;
use std::collections::HashSet;
use std::time::Instant;

/// Yes/no questions asked before expensive searches.
pub trait Confirm {
    fn confirm(&mut self, question: &str, default_yes: bool) -> bool;
}

/// Approves everything, for batch runs.
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&mut self, _question: &str, _default_yes: bool) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPlan {
    Exhaustive,
    Sampling,
    Cancelled,
}

/// Decides how to search `2^n_magnetic` candidates.
///
/// Above `large_threshold` magnetic atoms the exhaustive search needs
/// approval. If it is declined above `sampling_threshold`, sampling is
/// offered instead.
pub fn plan_search(
    n_magnetic: usize,
    large_threshold: usize,
    sampling_threshold: usize,
    confirm: &mut dyn Confirm,
) -> SearchPlan {
    if n_magnetic <= large_threshold {
        return SearchPlan::Exhaustive;
    }

    let total = 1u128 << n_magnetic;

    println!(
        "   WARNING: {} magnetic atoms give {} configurations",
        n_magnetic, total
    );

    if n_magnetic <= sampling_threshold {
        println!("   this may take hours but is feasible with multithreading");
    } else {
        println!("   this is computationally very expensive and may take days");
        println!("   consider a smaller supercell or a sampling search");
    }

    if confirm.confirm("Do you want to continue with the full exhaustive search?", false) {
        return SearchPlan::Exhaustive;
    }

    println!("   search cancelled");

    if n_magnetic > sampling_threshold
        && confirm.confirm("Would you like to try a random sampling search instead?", true)
    {
        return SearchPlan::Sampling;
    }

    SearchPlan::Cancelled
}

/// Every candidate id in `[0, 2^M)`.
pub fn run_exhaustive(
    ctx: &SearchContext,
    selection: &BackendSelection,
    progress: &Progress,
) -> Result<SearchOutcome, SearchError> {
    let total = ctx.get_n_candidates();
    let start = Instant::now();

    info!("exhaustive search over {} candidates", total);

    let (mut results, backend) =
        selection.run_with_fallback(progress, |b| b.evaluate_range(ctx, 0..total, progress))?;

    results.sort_by_key(|r| r.id);
    progress.finish();

    Ok(SearchOutcome {
        method: SearchMethod::Exhaustive,
        backend,
        n_magnetic: ctx.get_n_magnetic(),
        total_tested: total,
        results,
        elapsed: start.elapsed(),
        exhaustive: true,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub max_samples: u64,
    pub batch_size: u64,
    pub target_found: usize,
    /// Wall-clock limit in seconds, 0 for none.
    pub max_seconds: f64,
    pub seed: Option<u64>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        SamplingOptions {
            max_samples: MAX_SAMPLES,
            batch_size: SAMPLE_BATCH_SIZE,
            target_found: SAMPLE_TARGET_FOUND,
            max_seconds: 0.0,
            seed: None,
        }
    }
}

/// Random batches of distinct candidate ids.
///
/// A batch stops drawing after `2 * batch_size` attempts, so late batches in
/// a nearly exhausted space may come out short. Ids are never drawn twice
/// within one run. Stop conditions are checked between batches only.
pub fn run_sampling(
    ctx: &SearchContext,
    selection: &BackendSelection,
    options: &SamplingOptions,
    progress: &Progress,
) -> Result<SearchOutcome, SearchError> {
    let total = ctx.get_n_candidates();
    let budget = options.max_samples.min(total);
    let batch_size = options.batch_size.max(1);
    let start = Instant::now();

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "sampling up to {} of {} candidates in batches of {}",
        budget, total, batch_size
    );

    let mut seen: HashSet<u64> = HashSet::new();
    let mut results: Vec<SearchResult> = Vec::new();
    let mut sampled: u64 = 0;
    let mut backend = selection.label();
    let mut on_cpu = selection.get_accelerator().is_none();

    loop {
        if sampled >= budget {
            break;
        }

        if results.len() >= options.target_found {
            info!("early stop: {} altermagnetic configurations found", results.len());
            break;
        }

        if options.max_seconds > 0.0 && start.elapsed().as_secs_f64() >= options.max_seconds {
            info!("sampling time limit of {} s reached", options.max_seconds);
            break;
        }

        let want = batch_size.min(budget - sampled);
        let mut ids = Vec::with_capacity(want as usize);
        let mut attempts = 0;

        while (ids.len() as u64) < want && attempts < 2 * want {
            let id = rng.gen_range(0, total);
            attempts += 1;

            if seen.insert(id) {
                ids.push(id);
            }
        }

        // every draw of this batch was a repeat
        if ids.is_empty() {
            continue;
        }

        let found = match selection.get_accelerator() {
            Some(acc) if !on_cpu => match acc.evaluate_ids(ctx, &ids, progress) {
                Ok(found) => found,
                Err(err) => {
                    warn!("accelerator failed ({}); continuing on cpu", err);
                    on_cpu = true;
                    backend = format!("{} (accelerator fallback)", selection.get_cpu().name());
                    selection.get_cpu().evaluate_ids(ctx, &ids, progress)?
                }
            },
            _ => selection.get_cpu().evaluate_ids(ctx, &ids, progress)?,
        };

        sampled += ids.len() as u64;
        results.extend(found);
    }

    results.sort_by_key(|r| r.id);
    progress.finish();

    Ok(SearchOutcome {
        method: SearchMethod::Sampling,
        backend,
        n_magnetic: ctx.get_n_magnetic(),
        total_tested: sampled,
        results,
        elapsed: start.elapsed(),
        exhaustive: seen.len() as u64 == total,
    })
}
