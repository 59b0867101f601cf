//! Batching of fragments for delivery downstream.

use std::num::NonZeroUsize;

use crate::error::Result;
use crate::types::{Batch, Fragment, Headers};

/// Receiver of emitted batches.
///
/// Batches arrive in file order, and within a file in match order.
pub trait BatchSink {
    fn deliver(&mut self, batch: Batch) -> Result<()>;
}

impl<F> BatchSink for F
where
    F: FnMut(Batch) -> Result<()>,
{
    fn deliver(&mut self, batch: Batch) -> Result<()> {
        self(batch)
    }
}

/// Sink that keeps every batch in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub batches: Vec<Batch>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All fragment texts across all batches, in delivery order.
    #[must_use]
    pub fn fragments(&self) -> Vec<&str> {
        self.batches.iter().flat_map(Batch::texts).collect()
    }
}

impl BatchSink for CollectingSink {
    fn deliver(&mut self, batch: Batch) -> Result<()> {
        self.batches.push(batch);
        Ok(())
    }
}

/// Groups fragments into batches of a fixed size for one file.
///
/// A full batch is held until the next fragment arrives, and is then
/// delivered with `is_final = false`. The batch still held when the file
/// ends goes out through [`BatchAccumulator::finish`], which is the only
/// place the final flag can be set.
#[derive(Debug)]
pub struct BatchAccumulator {
    per_batch: NonZeroUsize,
    headers: Headers,
    fragments: Vec<Fragment>,
    emitted: usize,
}

impl BatchAccumulator {
    #[must_use]
    pub fn new(per_batch: NonZeroUsize, headers: Headers) -> Self {
        Self {
            per_batch,
            headers,
            fragments: Vec::with_capacity(per_batch.get()),
            emitted: 0,
        }
    }

    /// Number of fragments waiting in the current batch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.fragments.len()
    }

    /// Number of batches delivered so far.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Append a fragment, first delivering the held batch if it is full.
    pub fn add<S: BatchSink + ?Sized>(&mut self, fragment: Fragment, sink: &mut S) -> Result<()> {
        if self.fragments.len() >= self.per_batch.get() {
            self.emit(false, sink)?;
        }
        self.fragments.push(fragment);
        Ok(())
    }

    /// Deliver the held batch, if any; returns the total number of batches
    /// delivered for this file.
    pub fn finish<S: BatchSink + ?Sized>(mut self, is_final: bool, sink: &mut S) -> Result<usize> {
        if !self.fragments.is_empty() {
            self.emit(is_final, sink)?;
        }
        Ok(self.emitted)
    }

    fn emit<S: BatchSink + ?Sized>(&mut self, is_final: bool, sink: &mut S) -> Result<()> {
        let fragments = std::mem::replace(
            &mut self.fragments,
            Vec::with_capacity(self.per_batch.get()),
        );
        tracing::debug!(fragments = fragments.len(), is_final, "emitting batch");
        sink.deliver(Batch {
            headers: self.headers.clone(),
            fragments,
            is_final,
        })?;
        self.emitted += 1;
        Ok(())
    }
}
