//! Span lifecycle wrapper over an injected [`Tracer`].
//!
//! A span handed out by [`SpanTracer`] is `Active` until `end_span`, after
//! which it is `Ended` for good. Every operation on an ended span is a no-op,
//! so a second `end_span` can never end the engine span twice.

use super::attributes::{normalize, AttributeValue, Attributes};
use super::exception::Exception;
use super::tracer::{EngineSpan, SpanKind, SpanStatus, Status, Tracer};
use serde_json::Value;
use std::sync::Arc;

/// Lifecycle state of a wrapped span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    Active,
    Ended,
}

/// A span started through [`SpanTracer`].
pub struct Span {
    inner: Box<dyn EngineSpan>,
    name: String,
    kind: SpanKind,
    state: SpanState,
}

impl Span {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    pub fn state(&self) -> SpanState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == SpanState::Ended
    }

    fn active(&mut self, op: &'static str) -> Option<&mut dyn EngineSpan> {
        if self.is_ended() {
            tracing::debug!(span = %self.name, op, "ignoring operation on ended span");
            return None;
        }
        Some(self.inner.as_mut())
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Starts, annotates and ends spans with normalized attributes.
#[derive(Clone)]
pub struct SpanTracer {
    tracer: Arc<dyn Tracer>,
}

impl SpanTracer {
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer }
    }

    fn start(&self, name: &str, kind: SpanKind, attributes: &[(&str, Value)]) -> Span {
        let inner = self.tracer.start_span(name, kind, normalize(attributes));
        Span {
            inner,
            name: name.to_string(),
            kind,
            state: SpanState::Active,
        }
    }

    /// Starts a root span for an incoming request.
    pub fn start_trace(&self, name: &str, attributes: &[(&str, Value)]) -> Span {
        self.start(name, SpanKind::Server, attributes)
    }

    /// Starts a child span under the currently active span.
    pub fn start_span(&self, name: &str, attributes: &[(&str, Value)]) -> Span {
        self.start(name, SpanKind::Internal, attributes)
    }

    /// Applies `final_attributes`, sets the status and ends the span.
    ///
    /// `SpanStatus::Unset` leaves the engine status untouched.
    pub fn end_span(&self, span: &mut Span, final_attributes: &[(&str, Value)], status: SpanStatus) {
        let Some(inner) = span.active("end_span") else {
            return;
        };

        if !final_attributes.is_empty() {
            inner.set_attributes(normalize(final_attributes));
        }

        match status {
            SpanStatus::Ok => inner.set_status(Status::ok()),
            SpanStatus::Error => inner.set_status(Status::error(None)),
            SpanStatus::Unset => {}
        }

        inner.end();
        span.state = SpanState::Ended;
    }

    /// Adds a named event to the span.
    pub fn add_event(&self, span: &mut Span, name: &str, attributes: &[(&str, Value)]) {
        if let Some(inner) = span.active("add_event") {
            inner.add_event(name, normalize(attributes));
        }
    }

    /// Records `exception` on the span and marks it as failed.
    ///
    /// Emits an `exception` event carrying the formatted stack trace, then
    /// invokes the engine's own exception recording.
    pub fn record_exception(&self, span: &mut Span, exception: &Exception) {
        let Some(inner) = span.active("record_exception") else {
            return;
        };

        let mut attributes = Attributes::new();
        attributes.insert(
            "exception.type".into(),
            AttributeValue::from(exception.type_name()),
        );
        attributes.insert(
            "exception.message".into(),
            AttributeValue::from(exception.message()),
        );
        attributes.insert(
            "exception.stacktrace".into(),
            AttributeValue::String(exception.format_stacktrace()),
        );

        inner.add_event("exception", attributes);
        inner.record_exception(exception);
        inner.set_status(Status::error(Some(exception.message().to_string())));
    }
}
