//! Exception capture and stack-trace formatting.
//!
//! The backend extracts frames from recorded stack traces with the pattern
//! `File "([^"]+)", line (\d+), in (\S+)`, so every frame line produced here
//! must keep exactly that shape.

use backtrace::{Backtrace, BacktraceSymbol};
use std::error::Error;
use std::fmt;
use std::panic::Location;

/// Symbol prefixes of runtime and capture machinery left out of captured stacks.
const SKIPPED_SYMBOLS: [&str; 9] = [
    "backtrace::",
    "std::",
    "core::",
    "alloc::",
    "test::",
    "__rust",
    "<std::",
    "<core::",
    "<alloc::",
];

/// One frame of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File \"{}\", line {}, in {}",
            self.file, self.line, self.function
        )
    }
}

/// An error prepared for recording on a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    type_name: String,
    message: String,
    /// Oldest call first
    frames: Vec<StackFrame>,
}

impl Exception {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            frames: Vec::new(),
        }
    }

    /// Builds an exception from an error value, named after its type, with
    /// the current call stack as its frames.
    ///
    /// Frames come from debug info. When none resolve (stripped binaries),
    /// the caller's location is recorded as the single frame.
    #[track_caller]
    pub fn from_error<E: Error>(err: &E) -> Self {
        let caller = Location::caller();
        let mut exception = Self::new(short_type_name(std::any::type_name::<E>()), err.to_string());
        exception.frames = frames_or_caller(capture_frames(), caller);
        exception
    }

    /// Appends a frame. Frames are pushed outermost first.
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = StackFrame>) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Renders the trace in the backend's frame format:
    ///
    /// ```text
    /// Traceback (most recent call last):
    ///   File "src/main.rs", line 12, in main
    ///   File "src/handler.rs", line 40, in handle
    /// ParseIntError: invalid digit found in string
    /// ```
    pub fn format_stacktrace(&self) -> String {
        let mut out = String::new();

        if !self.frames.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            for frame in &self.frames {
                out.push_str("  ");
                out.push_str(&frame.to_string());
                out.push('\n');
            }
        }

        out.push_str(&self.type_name);
        if !self.message.is_empty() {
            out.push_str(": ");
            out.push_str(&self.message);
        }
        out.push('\n');
        out
    }
}

/// Resolved frames of the current call stack, oldest call first.
fn capture_frames() -> Vec<StackFrame> {
    let backtrace = Backtrace::new();
    let mut frames: Vec<StackFrame> = backtrace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .filter_map(application_frame)
        .collect();
    frames.reverse();
    frames
}

/// Converts a symbol into a frame unless it belongs to the runtime or to
/// the capture itself.
fn application_frame(symbol: &BacktraceSymbol) -> Option<StackFrame> {
    let path = format!("{:#}", symbol.name()?);
    if SKIPPED_SYMBOLS.iter().any(|prefix| path.starts_with(prefix))
        || path.contains("exception::capture_frames")
        || path.contains("Exception::from_error")
        || path.contains("Exception>::from_error")
    {
        return None;
    }

    let file = symbol.filename()?.display().to_string();
    if file.starts_with("/rustc/") {
        return None;
    }
    let line = symbol.lineno()?;

    let function = function_ident(&path);
    if function.chars().any(char::is_whitespace) {
        return None;
    }
    Some(StackFrame::new(file, line, function))
}

fn frames_or_caller(frames: Vec<StackFrame>, caller: &Location<'_>) -> Vec<StackFrame> {
    if frames.is_empty() {
        vec![StackFrame::new(caller.file(), caller.line(), "<unknown>")]
    } else {
        frames
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Last named segment of a function path, skipping closure segments.
#[doc(hidden)]
pub fn function_ident(path: &str) -> &str {
    path.split("::")
        .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .last()
        .unwrap_or("<unknown>")
}

/// Captures the current source location as a [`StackFrame`].
///
/// ```
/// let frame = tracekit::frame!();
/// assert!(frame.file.ends_with(".rs"));
/// ```
#[macro_export]
macro_rules! frame {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let path = __type_name_of(__here);
        let path = path.strip_suffix("::__here").unwrap_or(path);
        $crate::trace::StackFrame::new(
            file!(),
            line!(),
            $crate::trace::exception::function_ident(path),
        )
    }};
}
