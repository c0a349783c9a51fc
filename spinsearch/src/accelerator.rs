use crate::{BackendError, Progress, SearchBackend, SearchContext};
use amconsts::MAX_MAGNETIC_ATOMS;
use log::debug;
use nalgebra::Vector3;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use spin::{decode_candidate, SearchResult};
use std::mem::size_of;
use std::ops::Range;
use symops::site_permutation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceleratorOptions {
    pub batch_size: u64,
    /// Upper bound for the device tables and one batch of candidate ids.
    pub memory_budget: usize,
}

impl Default for AcceleratorOptions {
    fn default() -> Self {
        AcceleratorOptions {
            batch_size: 1 << 16,
            memory_budget: 256 << 20,
        }
    }
}

/// Bit-parallel candidate screening.
///
/// Each symmetry operation is reduced to the permutation it induces on the
/// magnetic sites. A candidate id then encodes the down spins as bits, and
/// an operation reverses every spin of an orbit when `id ^ permute(id)`
/// covers the orbit's bits. A candidate is accepted when it is balanced on
/// every orbit and some orbit has reversing operations, none of which is
/// inversion or a pure translation.
///
/// This skips the Luttinger test and the pair bookkeeping of the exact
/// classifier, so the two can disagree near the tolerance boundary and for
/// orbits where only some pairs are reversed by one operation.
pub struct AcceleratorBackend {
    n_magnetic: usize,
    magnetic: Vec<usize>,
    natoms: usize,
    permutations: Vec<Vec<u8>>,
    it_ops: Vec<bool>,
    orbit_masks: Vec<u64>,
    batch_size: u64,
    pool: ThreadPool,
}

impl AcceleratorBackend {
    pub fn new(
        ctx: &SearchContext,
        num_threads: usize,
        options: AcceleratorOptions,
    ) -> Result<AcceleratorBackend, BackendError> {
        let structure = ctx.get_structure();
        let magnetic = ctx.get_magnetic_indices().to_vec();
        let n_magnetic = magnetic.len();
        let ops = structure.get_symmetry_operations();

        if n_magnetic > MAX_MAGNETIC_ATOMS {
            return Err(BackendError::Unavailable(format!(
                "{} magnetic sites exceed the {}-bit candidate word",
                n_magnetic, MAX_MAGNETIC_ATOMS
            )));
        }

        if ops.is_empty() {
            return Err(BackendError::Unavailable(
                "no symmetry operations".to_string(),
            ));
        }

        if options.batch_size == 0 {
            return Err(BackendError::Unavailable("zero batch size".to_string()));
        }

        let required = ops.len() * n_magnetic * size_of::<u8>()
            + ops.len() * size_of::<bool>()
            + options.batch_size as usize * size_of::<u64>();

        if required > options.memory_budget {
            return Err(BackendError::MemoryBudget {
                required,
                budget: options.memory_budget,
            });
        }

        let positions: Vec<Vector3<f64>> = magnetic
            .iter()
            .map(|i| *structure.get_atom(*i).get_position())
            .collect();
        let symbols: Vec<&str> = magnetic
            .iter()
            .map(|i| structure.get_atom(*i).get_symbol())
            .collect();

        let mut permutations = Vec::with_capacity(ops.len());

        for (k, op) in ops.iter().enumerate() {
            let perm = site_permutation(op, &positions, ctx.get_tolerance())
                .ok_or(BackendError::NotAPermutation { op: k })?;

            if perm.iter().enumerate().any(|(a, b)| symbols[a] != symbols[*b]) {
                return Err(BackendError::NotAPermutation { op: k });
            }

            permutations.push(perm.into_iter().map(|b| b as u8).collect());
        }

        let it_ops = ops
            .iter()
            .map(|op| op.is_inversion() || op.is_pure_translation(ctx.get_tolerance()))
            .collect();

        let orbit_masks: Vec<u64> = ctx
            .get_orbits()
            .iter()
            .filter(|orbit| orbit.atom_indices.len() > 1)
            .map(|orbit| {
                magnetic
                    .iter()
                    .enumerate()
                    .filter(|(_, iat)| orbit.atom_indices.contains(*iat))
                    .fold(0u64, |mask, (a, _)| mask | (1u64 << a))
            })
            .filter(|mask| *mask != 0)
            .collect();

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| BackendError::ThreadPool(e.to_string()))?;

        debug!(
            "accelerator tables: {} operations, {} magnetic orbits, {} bytes",
            ops.len(),
            orbit_masks.len(),
            required
        );

        Ok(AcceleratorBackend {
            n_magnetic,
            magnetic,
            natoms: structure.get_n_atoms(),
            permutations,
            it_ops,
            orbit_masks,
            batch_size: options.batch_size,
            pool,
        })
    }

    pub fn get_batch_size(&self) -> u64 {
        self.batch_size
    }

    fn permute(id: u64, perm: &[u8]) -> u64 {
        perm.iter()
            .enumerate()
            .fold(0u64, |acc, (a, b)| acc | (((id >> a) & 1) << *b))
    }

    pub fn is_accepted(&self, id: u64) -> bool {
        let balanced = self
            .orbit_masks
            .iter()
            .all(|mask| 2 * (id & mask).count_ones() == mask.count_ones());

        if !balanced {
            return false;
        }

        let reversed: Vec<u64> = self
            .permutations
            .iter()
            .map(|perm| id ^ AcceleratorBackend::permute(id, perm))
            .collect();

        self.orbit_masks.iter().any(|mask| {
            let mut any_retained = false;

            for (flip, it) in reversed.iter().zip(self.it_ops.iter()) {
                if flip & mask == *mask {
                    if *it {
                        return false;
                    }
                    any_retained = true;
                }
            }

            any_retained
        })
    }

    fn check_batch(&self, last: u64) -> Result<(), BackendError> {
        if self.n_magnetic < 64 && last >> self.n_magnetic != 0 {
            return Err(BackendError::BatchOverflow {
                id: last,
                n_magnetic: self.n_magnetic,
            });
        }

        Ok(())
    }

    fn accept(&self, id: u64) -> Option<SearchResult> {
        if self.is_accepted(id) {
            Some(SearchResult::new(
                id,
                decode_candidate(id, &self.magnetic, self.natoms),
            ))
        } else {
            None
        }
    }
}

impl SearchBackend for AcceleratorBackend {
    fn name(&self) -> &str {
        "accelerator"
    }

    fn evaluate_range(
        &self,
        _ctx: &SearchContext,
        range: Range<u64>,
        progress: &Progress,
    ) -> Result<Vec<SearchResult>, BackendError> {
        let mut results = Vec::new();
        let mut start = range.start;

        while start < range.end {
            let end = range.end.min(start.saturating_add(self.batch_size));
            self.check_batch(end - 1)?;

            let found: Vec<SearchResult> = self
                .pool
                .install(|| (start..end).into_par_iter().filter_map(|id| self.accept(id)).collect());

            progress.record_batch(end - start, &found);
            results.extend(found);

            start = end;
        }

        Ok(results)
    }

    fn evaluate_ids(
        &self,
        _ctx: &SearchContext,
        ids: &[u64],
        progress: &Progress,
    ) -> Result<Vec<SearchResult>, BackendError> {
        let mut results = Vec::new();

        for batch in ids.chunks(self.batch_size as usize) {
            if let Some(max) = batch.iter().max() {
                self.check_batch(*max)?;
            }

            let found: Vec<SearchResult> = self
                .pool
                .install(|| batch.par_iter().filter_map(|id| self.accept(*id)).collect());

            progress.record_batch(batch.len() as u64, &found);
            results.extend(found);
        }

        results.sort_by_key(|r| r.id);

        Ok(results)
    }
}
