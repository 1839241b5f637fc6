// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Idempotency cache.
//!
//! The proxy re-delivers a tool request until it sees the result posted
//! back, so a slow post means the same operation id arrives again.  Each
//! stream keeps a small ring of `{id → serialized result}` and replays
//! the stored body instead of executing twice.  The fs and cmd streams
//! get independent instances so a burst of writes cannot evict a recent
//! command result.

#[derive(Debug)]
struct Slot {
    id: String,
    result: String,
}

/// Fixed-capacity FIFO ring of serialized results.
#[derive(Debug)]
pub struct IdempotencyCache {
    name: &'static str,
    slots: Vec<Option<Slot>>,
    next: usize,
}

impl IdempotencyCache {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            name,
            slots,
            next: 0,
        }
    }

    /// Serialized result previously stored for `id`, if still resident.
    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.slots
            .iter()
            .flatten()
            .find(|slot| slot.id == id)
            .map(|slot| slot.result.as_str())
    }

    /// Store a result, evicting whatever occupies the current slot.
    pub fn store(&mut self, id: &str, result: &str) {
        tracing::trace!(cache = self.name, id, "store result");
        self.slots[self.next] = Some(Slot {
            id: id.to_string(),
            result: result.to_string(),
        });
        self.next = (self.next + 1) % self.slots.len();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
