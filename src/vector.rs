//! Sparse 1-D container: a power-of-two bucket table keyed by the low bits
//! of the index (spec §3, §4.2).

use crate::bucket::Bucket1;
use crate::core::config::RehashConfig;
use crate::core::error::{Error, Result};
use crate::entry::Entry1;
use crate::flags::ContainerFlags;
use crate::system::metrics::EngineMetrics;

/// A sparse mapping from `u64` index to `f32` weight.
#[derive(Debug, Clone)]
pub struct Vector {
    bits: u8,
    buckets: Vec<Bucket1>,
    flags: ContainerFlags,
    eps: f32,
    revision: u64,
    optimize: i64,
    rehash: RehashConfig,
}

impl Vector {
    /// Construct an empty vector with 1 bucket (`bits = 0`).
    ///
    /// Rejects any flag outside [`ContainerFlags::CONSTRUCTIBLE`] — the
    /// stricter of the two historical `alloc` variants noted in spec §9 is
    /// the only one implemented.
    pub fn new(flags: ContainerFlags, eps: f32) -> Result<Self> {
        if !ContainerFlags::CONSTRUCTIBLE.contains(flags) {
            return Err(Error::invalid_argument("unknown flag bit in Vector::new"));
        }
        Ok(Self {
            bits: 0,
            buckets: vec![Bucket1::new()],
            flags,
            eps,
            revision: 0,
            optimize: 256,
            rehash: RehashConfig::default(),
        })
    }

    /// Override the rehash watermarks (primarily for tests exercising the
    /// resize path without inserting hundreds of entries).
    pub fn with_rehash_config(mut self, rehash: RehashConfig) -> Self {
        self.optimize = rehash.min_optimize;
        self.rehash = rehash;
        self
    }

    /// Container flags.
    pub fn flags(&self) -> ContainerFlags {
        self.flags
    }

    /// Monotonically increasing mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of buckets (`2^bits`).
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Total stored entries.
    pub fn num_entries(&self) -> usize {
        self.buckets.iter().map(Bucket1::len).sum()
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    fn bucket_index(&self, index: u64) -> usize {
        (index & self.mask()) as usize
    }

    /// `true` if `index` has a stored (post-collapse) entry.
    pub fn has(&mut self, index: u64) -> bool {
        self.get(index).is_some()
    }

    /// Read the weight at `index`, if any.
    pub fn get(&mut self, index: u64) -> Option<f32> {
        let b = self.bucket_index(index);
        self.buckets[b].get(index)
    }

    /// Overwrite the weight at `index`. Fails with [`Error::ReadOnly`] if the
    /// container is read-only.
    pub fn set(&mut self, index: u64, weight: f32) -> Result<()> {
        self.check_writable()?;
        let b = self.bucket_index(index);
        self.buckets[b].set(index, weight);
        EngineMetrics::global().mutations.with_label_values(&["set", "vector"]).inc();
        self.finish_mutation(index);
        Ok(())
    }

    /// Add `delta` to the weight at `index` (inserting `delta` if absent).
    pub fn add(&mut self, index: u64, delta: f32) -> Result<()> {
        self.check_writable()?;
        let b = self.bucket_index(index);
        {
            let slot = self.buckets[b].get_entry_mut(index);
            *slot += delta;
        }
        EngineMetrics::global().mutations.with_label_values(&["add", "vector"]).inc();
        self.finish_mutation(index);
        Ok(())
    }

    /// Subtract `delta` from the weight at `index`.
    pub fn sub(&mut self, index: u64, delta: f32) -> Result<()> {
        self.add(index, -delta)
    }

    /// Remove the entry at `index`, if present.
    pub fn del(&mut self, index: u64) -> Result<Option<f32>> {
        self.check_writable()?;
        let b = self.bucket_index(index);
        let removed = self.buckets[b].del(index);
        EngineMetrics::global().mutations.with_label_values(&["del", "vector"]).inc();
        self.bump_revision();
        self.maybe_rehash();
        Ok(removed)
    }

    fn check_writable(&self) -> Result<()> {
        if self.flags.is_readonly() {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Apply the NONZERO/POSITIVE collapse policy after a weight changed at
    /// `index`, then bump `revision` and tick the rehash countdown.
    fn finish_mutation(&mut self, index: u64) {
        let b = self.bucket_index(index);
        if let Some(weight) = self.buckets[b].get(index) {
            let collapse = if self.flags.is_positive() {
                weight <= self.eps
            } else if self.flags.is_nonzero() {
                weight.abs() <= self.eps
            } else {
                false
            };
            if collapse {
                self.buckets[b].del(index);
                EngineMetrics::global().collapses.inc();
            }
        }
        self.bump_revision();
        self.maybe_rehash();
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
    }

    fn maybe_rehash(&mut self) {
        self.optimize -= 1;
        if self.optimize <= 0 {
            self.rehash_table();
        }
    }

    /// Iterate all stored entries in bucket order (not a global sort order —
    /// see spec §5).
    pub fn iter(&self) -> impl Iterator<Item = &Entry1> {
        self.buckets.iter().flat_map(Bucket1::iter)
    }

    fn rebuild(&mut self, new_bits: u8) {
        let new_mask = (1u64 << new_bits) - 1;
        let mut new_buckets: Vec<Bucket1> = (0..(1usize << new_bits)).map(|_| Bucket1::new()).collect();
        for bucket in &self.buckets {
            for e in bucket.iter() {
                let idx = (e.index & new_mask) as usize;
                new_buckets[idx].set(e.index, e.weight);
            }
        }
        self.bits = new_bits;
        self.buckets = new_buckets;
    }

    /// `vector_optimize`: grow/shrink the bucket table toward the
    /// `[shrink_factor, grow_stop_factor) * buckets` band, rebuilding over a
    /// fresh array and swapping in on success (the simpler alternative to
    /// in-place row-shuffling explicitly endorsed by spec §9).
    fn rehash_table(&mut self) {
        let n = self.num_entries() as u64;
        let r = self.rehash;
        let mut bits = self.bits;
        let b0 = 1u64 << bits;
        if n >= r.grow_factor * b0 {
            loop {
                bits += 1;
                if n < r.grow_stop_factor * (1u64 << bits) {
                    break;
                }
            }
        } else if bits >= 1 && n < r.shrink_factor * b0 {
            loop {
                bits -= 1;
                if bits == 0 || n >= r.grow_stop_factor * (1u64 << bits) {
                    break;
                }
            }
        }
        let resized = bits != self.bits;
        if resized {
            let old_bits = self.bits;
            self.rebuild(bits);
            EngineMetrics::global().rehashes.inc();
            tracing::debug!(old_bits, new_bits = bits, entries = n, "vector rehash");
        }
        self.optimize = if resized {
            let b = 1i64 << self.bits;
            (r.grow_factor as i64 * b - n as i64)
                .min(n as i64 - r.shrink_factor as i64 * b)
                .max(r.min_optimize)
        } else {
            r.min_optimize
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let mut v = Vector::new(ContainerFlags::empty(), 1e-6).unwrap();
        v.set(5, 2.0).unwrap();
        assert_eq!(v.get(5), Some(2.0));
        assert_eq!(v.revision(), 1);
    }

    #[test]
    fn nonzero_collapses_small_weight() {
        let mut v = Vector::new(ContainerFlags::NONZERO, 1e-3).unwrap();
        v.set(1, 1e-6).unwrap();
        assert_eq!(v.get(1), None);
        assert_eq!(v.num_entries(), 0);
    }

    #[test]
    fn positive_rejects_non_positive_result() {
        let mut v = Vector::new(ContainerFlags::POSITIVE, 1e-6).unwrap();
        v.set(1, 5.0).unwrap();
        v.add(1, -5.0).unwrap();
        assert_eq!(v.get(1), None);
    }

    #[test]
    fn readonly_rejects_mutation() {
        let mut v = Vector::new(ContainerFlags::READONLY, 1e-6).unwrap();
        assert!(matches!(v.set(0, 1.0), Err(Error::ReadOnly)));
    }

    #[test]
    fn rejects_unknown_flag_bits() {
        let bogus = ContainerFlags::from_bits_retain(1 << 20);
        assert!(Vector::new(bogus, 1e-6).is_err());
    }

    #[test]
    fn revision_strictly_increases_on_mutation_only() {
        let mut v = Vector::new(ContainerFlags::empty(), 1e-6).unwrap();
        v.set(1, 1.0).unwrap();
        let rev = v.revision();
        let _ = v.get(1);
        assert_eq!(v.revision(), rev);
        v.set(1, 2.0).unwrap();
        assert_eq!(v.revision(), rev + 1);
    }

    #[test]
    fn rehash_preserves_entry_multiset() {
        let mut v = Vector::new(ContainerFlags::empty(), 1e-6)
            .unwrap()
            .with_rehash_config(RehashConfig { grow_factor: 4, grow_stop_factor: 2, shrink_factor: 1, min_optimize: 4, retry_optimize: 16 });
        for i in 0..64u64 {
            v.set(i, i as f32).unwrap();
        }
        assert_eq!(v.num_entries(), 64);
        let mut seen: Vec<u64> = v.iter().map(|e| e.index).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..64).collect::<Vec<_>>());
    }
}
