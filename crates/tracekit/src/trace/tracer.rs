//! Interface to the distributed tracing engine.
//!
//! The engine owns span identity, parent linkage, sampling and batch export.
//! This crate only drives span lifecycles through these two traits, so any
//! engine (or a test fake) can be plugged in.

use super::attributes::Attributes;
use super::exception::Exception;
use std::convert::Infallible;
use std::str::FromStr;

/// Span kind, restricted to what the wrapper creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Root span of an incoming request
    Server,
    /// Child operation nested under the active span
    Internal,
}

/// Span completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanStatus {
    /// Status not set
    #[default]
    Unset,
    /// Span completed successfully
    Ok,
    /// Span completed with error
    Error,
}

impl FromStr for SpanStatus {
    type Err = Infallible;

    /// `"OK"` and `"ERROR"` map to their statuses; anything else is `Unset`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "OK" => Self::Ok,
            "ERROR" => Self::Error,
            _ => Self::Unset,
        })
    }
}

/// Status with an optional description, as handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: SpanStatus,
    pub description: Option<String>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: SpanStatus::Ok,
            description: None,
        }
    }

    pub fn error(description: Option<String>) -> Self {
        Self {
            code: SpanStatus::Error,
            description,
        }
    }
}

/// A live span inside the tracing engine.
pub trait EngineSpan: Send {
    fn set_attributes(&mut self, attributes: Attributes);

    fn add_event(&mut self, name: &str, attributes: Attributes);

    fn set_status(&mut self, status: Status);

    /// Engine-native exception recording.
    fn record_exception(&mut self, exception: &Exception);

    /// Sets the end timestamp. Called at most once by the wrapper.
    fn end(&mut self);
}

/// Span factory of the tracing engine.
pub trait Tracer: Send + Sync {
    /// Starts a span. The engine links it to whatever span is active in the
    /// current execution context.
    fn start_span(&self, name: &str, kind: SpanKind, attributes: Attributes)
        -> Box<dyn EngineSpan>;
}

/// Tracer whose spans record nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

struct NoopSpan;

impl EngineSpan for NoopSpan {
    fn set_attributes(&mut self, _attributes: Attributes) {}
    fn add_event(&mut self, _name: &str, _attributes: Attributes) {}
    fn set_status(&mut self, _status: Status) {}
    fn record_exception(&mut self, _exception: &Exception) {}
    fn end(&mut self) {}
}

impl Tracer for NoopTracer {
    fn start_span(
        &self,
        _name: &str,
        _kind: SpanKind,
        _attributes: Attributes,
    ) -> Box<dyn EngineSpan> {
        Box::new(NoopSpan)
    }
}
