// PCAP Funnel - Mode Result Cache
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Caching of per-mode results so switching modes back and forth in a view
//! does not recompute what was already computed.
//!
//! Layer statistics in the cascade are never cached here: their inputs change
//! on every trigger.

use std::collections::HashMap;

use tracing::debug;

use crate::models::Mode;

/// Results of one view, keyed by measurement mode.
#[derive(Debug, Clone)]
pub struct ModeCache<T> {
    entries: HashMap<Mode, T>,
}

impl<T> Default for ModeCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ModeCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Cached result for `mode`, computing it on first request.
    pub fn get_or_compute<F>(&mut self, mode: Mode, compute: F) -> &T
    where
        F: FnOnce(Mode) -> T,
    {
        self.entries.entry(mode).or_insert_with(|| {
            debug!("Computing {} result for mode cache", mode);
            compute(mode)
        })
    }

    /// Cached result for `mode`, if any.
    pub fn get(&self, mode: Mode) -> Option<&T> {
        self.entries.get(&mode)
    }

    /// Whether `mode` has been computed.
    pub fn contains(&self, mode: Mode) -> bool {
        self.entries.contains_key(&mode)
    }

    /// Drop every entry; call when the underlying dataset changes.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computes_each_mode_once() {
        let mut cache: ModeCache<usize> = ModeCache::new();
        let mut calls = 0;

        let value = *cache.get_or_compute(Mode::Bytes, |_| {
            calls += 1;
            42
        });
        assert_eq!(value, 42);

        let value = *cache.get_or_compute(Mode::Bytes, |_| {
            calls += 1;
            0
        });
        assert_eq!(value, 42);
        assert_eq!(calls, 1);

        cache.get_or_compute(Mode::Flows, |_| 7);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(Mode::Packets));
    }

    #[test]
    fn test_invalidate_clears_entries() {
        let mut cache = ModeCache::new();
        cache.get_or_compute(Mode::Packets, |mode| mode.as_str().to_string());
        assert_eq!(cache.get(Mode::Packets).map(String::as_str), Some("packets"));

        cache.invalidate();
        assert!(cache.is_empty());
        assert_eq!(cache.get(Mode::Packets), None);
    }
}
