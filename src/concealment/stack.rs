//! Stack-trace concealment
//!
//! Frames from the interception machinery are removed from any stack the
//! hosted process captures. Filtering runs under a thread-local re-entrancy
//! guard: anything the filter does that captures a stack again (logging
//! subscribers, host loggers that attach traces) reaches the capture hook
//! while the guard is held and gets the raw frames back instead of
//! recursing into the filter without bound.

use crate::concealment::policy::ConcealmentPolicy;
use crate::error::MaskError;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::marker::PhantomData;
use tracing::{debug, trace};

thread_local! {
    static FILTERING: Cell<bool> = const { Cell::new(false) };
}

/// One frame of a captured stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Fully qualified symbol; its namespace decides concealment
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            line: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

/// RAII marker that this thread is inside the stack filter
///
/// Only one guard can exist per thread; `enter` returns `None` while one is
/// held. Not `Send`, so it cannot leave the thread that set the flag.
#[derive(Debug)]
pub struct ReentrancyGuard {
    _not_send: PhantomData<*const ()>,
}

impl ReentrancyGuard {
    pub fn enter() -> Option<Self> {
        FILTERING.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self {
                    _not_send: PhantomData,
                })
            }
        })
    }

    pub fn is_active() -> bool {
        FILTERING.with(Cell::get)
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        FILTERING.with(|flag| flag.set(false));
    }
}

/// Removes concealed frames from captured stacks
#[derive(Debug)]
pub struct StackFilter {
    allowlist: Vec<String>,
    patterns: RegexSet,
}

impl StackFilter {
    pub fn new(policy: &ConcealmentPolicy) -> Result<Self, MaskError> {
        Ok(Self {
            allowlist: policy.allowlist_prefixes.clone(),
            patterns: RegexSet::new(&policy.symbol_patterns)?,
        })
    }

    pub fn is_allowlisted(&self, frame: &StackFrame) -> bool {
        self.allowlist
            .iter()
            .any(|prefix| frame.symbol.starts_with(prefix.as_str()))
    }

    pub fn is_concealed(&self, frame: &StackFrame) -> bool {
        !self.is_allowlisted(frame) && self.patterns.is_match(&frame.symbol)
    }

    /// Drop concealed frames, keeping the order of the rest
    ///
    /// A nested call on the same thread returns `frames` untouched.
    pub fn filter(&self, frames: Vec<StackFrame>) -> Vec<StackFrame> {
        let Some(_guard) = ReentrancyGuard::enter() else {
            trace!(target: "idveil::concealment", "Nested stack capture, passing through");
            return frames;
        };

        let before = frames.len();
        let kept: Vec<StackFrame> = frames
            .into_iter()
            .filter(|frame| !self.is_concealed(frame))
            .collect();

        if kept.len() != before {
            debug!(
                target: "idveil::concealment",
                "Concealed {} of {} stack frames",
                before - kept.len(),
                before
            );
        }
        kept
    }
}

/// Something that can capture the current thread's stack
pub trait StackSource: Send + Sync {
    fn capture(&self) -> Vec<StackFrame>;
}

/// Captures the calling thread's native stack with the `backtrace` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceCapture;

impl StackSource for BacktraceCapture {
    fn capture(&self) -> Vec<StackFrame> {
        let bt = backtrace::Backtrace::new();
        let mut frames = Vec::with_capacity(bt.frames().len());
        for frame in bt.frames() {
            if frame.symbols().is_empty() {
                frames.push(StackFrame::new(format!("{:?}", frame.ip())));
                continue;
            }
            for symbol in frame.symbols() {
                frames.push(StackFrame {
                    symbol: symbol
                        .name()
                        .map(|n| format!("{:#}", n))
                        .unwrap_or_else(|| format!("{:?}", frame.ip())),
                    file: symbol.filename().map(|p| p.display().to_string()),
                    line: symbol.lineno(),
                });
            }
        }
        frames
    }
}

/// Stack source whose captures pass through the concealment filter
pub struct ConcealedStack<S: StackSource> {
    source: S,
    filter: std::sync::Arc<StackFilter>,
}

impl<S: StackSource> ConcealedStack<S> {
    pub fn new(source: S, filter: std::sync::Arc<StackFilter>) -> Self {
        Self { source, filter }
    }

    pub fn capture(&self) -> Vec<StackFrame> {
        self.filter.filter(self.source.capture())
    }
}
