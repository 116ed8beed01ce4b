//! Filter chain applied to drained batches before export.
//!
//! Each stage sees one batch and either passes it on (possibly modified) or
//! drops it. A stage that fails aborts the whole export cycle: sending a
//! partially filtered set could leak traces that a redaction or sampling
//! filter was configured to remove.

use crate::span::TraceBatch;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// A filter stage failed on a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("filter `{filter}` failed: {message}")]
pub struct FilterError {
    /// Name of the failing filter.
    pub filter: String,
    /// What went wrong.
    pub message: String,
}

impl FilterError {
    /// Creates a new filter error.
    pub fn new(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            message: message.into(),
        }
    }
}

/// One stage of the filter chain.
///
/// Returning `Ok(None)` drops the batch; later stages do not see it.
pub trait TraceFilter: Send + Sync {
    /// Processes one batch.
    fn process_trace(&self, batch: TraceBatch) -> Result<Option<TraceBatch>, FilterError>;

    /// Returns the filter name for logs and errors.
    fn name(&self) -> &str;
}

/// Ordered sequence of filters.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn TraceFilter>>,
}

impl FilterChain {
    /// Creates a chain applying `filters` in order.
    pub fn new(filters: Vec<Arc<dyn TraceFilter>>) -> Self {
        Self { filters }
    }

    /// Appends a filter at the end of the chain.
    pub fn push(&mut self, filter: Arc<dyn TraceFilter>) {
        self.filters.push(filter);
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs every batch through the chain.
    ///
    /// Dropped batches are left out of the result; the first error aborts
    /// the call and every batch (processed or not) is discarded.
    pub fn apply(&self, batches: Vec<TraceBatch>) -> Result<Vec<TraceBatch>, FilterError> {
        if self.filters.is_empty() {
            return Ok(batches);
        }

        let mut kept = Vec::with_capacity(batches.len());
        'batches: for batch in batches {
            let mut current = batch;
            for filter in &self.filters {
                match filter.process_trace(current)? {
                    Some(next) => current = next,
                    None => continue 'batches,
                }
            }
            kept.push(current);
        }
        Ok(kept)
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

/// Drops traces whose root span resource is in a fixed set,
/// e.g. health-check endpoints.
#[derive(Debug, Clone)]
pub struct DropByResource {
    resources: HashSet<String>,
}

impl DropByResource {
    /// Creates a filter dropping the given resources.
    pub fn new<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }
}

impl TraceFilter for DropByResource {
    fn process_trace(&self, batch: TraceBatch) -> Result<Option<TraceBatch>, FilterError> {
        let matched = batch
            .root()
            .is_some_and(|root| self.resources.contains(&root.resource));
        Ok(if matched { None } else { Some(batch) })
    }

    fn name(&self) -> &str {
        "drop_by_resource"
    }
}
