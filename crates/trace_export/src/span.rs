use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;
use trace_queue::SpanCount;

/// A finished unit of work, as handed over by the instrumentation layer.
///
/// The pipeline never inspects spans beyond counting them and letting
/// filters look at them; the fields mirror what a collector expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Trace identifier shared by every span of one trace
    pub trace_id: u64,
    /// Unique span identifier
    pub span_id: u64,
    /// Parent span identifier (0 if root span)
    pub parent_id: u64,
    /// Service that produced the span
    pub service: String,
    /// Operation name
    pub name: String,
    /// Resource being operated on (endpoint, query, ...)
    pub resource: String,
    /// Start time (Unix nanoseconds)
    pub start: u64,
    /// Duration in nanoseconds
    pub duration: u64,
    /// Whether the operation failed
    pub error: bool,
    /// String tags
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
    /// Numeric tags
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
}

impl Span {
    /// Creates a span starting now, with the resource defaulting to the name.
    pub fn new(
        trace_id: u64,
        span_id: u64,
        parent_id: u64,
        service: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            trace_id,
            span_id,
            parent_id,
            service: service.into(),
            resource: name.clone(),
            name,
            start: unix_nanos(),
            duration: 0,
            error: false,
            meta: HashMap::new(),
            metrics: HashMap::new(),
        }
    }

    /// Sets the resource.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Adds a string tag.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Marks the span finished now.
    pub fn finish(&mut self, error: bool) {
        self.duration = unix_nanos().saturating_sub(self.start);
        self.error = error;
    }

    /// Returns `true` if this span has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }
}

fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// One trace's worth of spans, the unit moved through the pipeline.
///
/// The span count is computed once at construction. Filters that change the
/// spans build a new batch with [`TraceBatch::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct TraceBatch {
    spans: Vec<Span>,
    span_count: usize,
}

impl TraceBatch {
    /// Creates a batch from the spans of one trace.
    pub fn new(spans: Vec<Span>) -> Self {
        let span_count = spans.len();
        Self { spans, span_count }
    }

    /// The spans, in the order they were produced.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Consumes the batch, returning its spans.
    pub fn into_spans(self) -> Vec<Span> {
        self.spans
    }

    /// Number of spans in the batch.
    pub fn len(&self) -> usize {
        self.span_count
    }

    /// Returns `true` if the batch holds no spans.
    pub fn is_empty(&self) -> bool {
        self.span_count == 0
    }

    /// The root span, or the first span if no span is a root.
    pub fn root(&self) -> Option<&Span> {
        self.spans
            .iter()
            .find(|s| s.is_root())
            .or_else(|| self.spans.first())
    }

    /// Trace identifier of the batch, taken from its first span.
    pub fn trace_id(&self) -> Option<u64> {
        self.spans.first().map(|s| s.trace_id)
    }
}

impl SpanCount for TraceBatch {
    fn span_count(&self) -> usize {
        self.span_count
    }
}

impl From<Vec<Span>> for TraceBatch {
    fn from(spans: Vec<Span>) -> Self {
        Self::new(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_counts_spans_once() {
        let batch = TraceBatch::new(vec![
            Span::new(1, 1, 0, "web", "request"),
            Span::new(1, 2, 1, "web", "db.query"),
        ]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.span_count(), 2);
        assert_eq!(batch.trace_id(), Some(1));
    }

    #[test]
    fn test_root_lookup() {
        let batch = TraceBatch::new(vec![
            Span::new(7, 2, 1, "web", "child"),
            Span::new(7, 1, 0, "web", "root").with_resource("GET /users"),
        ]);
        assert_eq!(batch.root().map(|s| s.resource.as_str()), Some("GET /users"));

        let orphans = TraceBatch::new(vec![Span::new(7, 3, 2, "web", "orphan")]);
        assert_eq!(orphans.root().map(|s| s.span_id), Some(3));
        assert!(TraceBatch::new(Vec::new()).root().is_none());
    }

    #[test]
    fn test_span_serializes_without_empty_tags() {
        let span = Span::new(1, 2, 0, "svc", "op");
        let json = serde_json::to_value(&span).unwrap();
        assert!(json.get("meta").is_none());
        assert_eq!(json["service"], "svc");
    }
}
