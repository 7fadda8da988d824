//! Span lifecycle helpers over a pluggable tracing engine.

pub mod attributes;
pub mod exception;
pub mod span;
pub mod tracer;

pub use attributes::{normalize, normalize_value, AttributeValue, Attributes};
pub use exception::{Exception, StackFrame};
pub use span::{Span, SpanState, SpanTracer};
pub use tracer::{EngineSpan, NoopTracer, SpanKind, SpanStatus, Status, Tracer};
