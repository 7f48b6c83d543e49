//! Ordered runner for the writes of one mutation step.
//!
//! Writes run in insertion order and the first failure stops the batch.
//! Writes that already ran are not undone; rolling them back is the job of
//! the enclosing transaction.

use std::fmt;

type Op<'a, E> = Box<dyn FnOnce() -> Result<(), E> + 'a>;

pub struct WriteBatch<'a, E> {
  ops: Vec<(&'static str, Op<'a, E>)>,
}

/// The first failed write of a batch.
#[derive(Debug)]
pub struct BatchError<E> {
  /// Label of the write that failed.
  pub label:     &'static str,
  /// Number of writes that completed before it.
  pub completed: usize,
  pub source:    E,
}

impl<E: fmt::Display> fmt::Display for BatchError<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "write {:?} failed after {} completed: {}",
      self.label, self.completed, self.source
    )
  }
}

impl<E: std::error::Error + 'static> std::error::Error for BatchError<E> {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.source) }
}

impl<'a, E> Default for WriteBatch<'a, E> {
  fn default() -> Self { Self { ops: Vec::new() } }
}

impl<'a, E> WriteBatch<'a, E> {
  pub fn new() -> Self { Self::default() }

  pub fn push(
    mut self,
    label: &'static str,
    op: impl FnOnce() -> Result<(), E> + 'a,
  ) -> Self {
    self.ops.push((label, Box::new(op)));
    self
  }

  /// Like [`push`](Self::push), but only when `condition` holds.
  pub fn push_if(
    self,
    condition: bool,
    label: &'static str,
    op: impl FnOnce() -> Result<(), E> + 'a,
  ) -> Self {
    if condition { self.push(label, op) } else { self }
  }

  pub fn len(&self) -> usize { self.ops.len() }

  pub fn is_empty(&self) -> bool { self.ops.is_empty() }

  /// Run every write in order. Returns the number of writes run.
  pub fn run(self) -> Result<usize, BatchError<E>> {
    let mut completed = 0;
    for (label, op) in self.ops {
      op().map_err(|source| BatchError {
        label,
        completed,
        source,
      })?;
      completed += 1;
    }
    Ok(completed)
  }
}
