//! Source scanning module for finding registration markers.
//!
//! This module walks the lines of a source file looking for marker
//! invocations and associates each one with the class it annotates.
//!
//! ## Algorithm Overview
//!
//! 1. Split the file into lines, keeping every byte (terminators included)
//! 2. Feed each line to a [`Locator`], a small state machine that is either
//!    seeking a marker or seeking a class declaration for pending markers
//! 3. A pending marker is resolved by the first qualifying class declaration
//!    on one of the next [`LOOKAHEAD_LINES`] lines, or dropped once its
//!    window is exhausted
//!
//! ## Extensibility
//!
//! The [`ScanStrategy`] trait allows custom locating algorithms:
//!
//! ```no_run
//! use servreg_core::scanner::{MarkerMatch, ScanStrategy, SourceFile};
//!
//! struct NoMarkers;
//!
//! impl ScanStrategy for NoMarkers {
//!     fn scan(&self, file: &SourceFile) -> Vec<MarkerMatch> {
//!         Vec::new()
//!     }
//! }
//! ```

mod pattern;

use crate::config::RegistrarConfig;
use crate::error::{Error, Result};
use std::borrow::Cow;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub use pattern::{strip_quotes, MarkerInvocation, MarkerPatterns};

/// Number of lines after a marker that may hold its class declaration.
///
/// Tolerates a few blank or comment lines between annotation and class,
/// nothing more.
pub const LOOKAHEAD_LINES: usize = 5;

/// Token that starts a single-line comment in the scanned language
pub const LINE_COMMENT: &str = "//";

/// A marker invocation associated with the class it annotates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    /// Zero-based index of the marker line
    pub line_index: usize,
    /// Text between the marker's parentheses, verbatim
    pub raw_argument: String,
    /// Name of the qualifying class found within the lookahead window
    pub class_name: String,
    /// The full marker invocation, e.g. `ServerImpl("echo")`
    pub marker_text: String,
    /// The class declaration line, trimmed
    pub class_line: String,
    /// Whether the marker line was already commented out
    pub already_neutralized: bool,
    /// Resolved path of the file the marker was found in
    pub owning_file: PathBuf,
}

impl MarkerMatch {
    /// One-based line number of the marker
    pub fn line_number(&self) -> usize {
        self.line_index + 1
    }

    /// The argument with surrounding whitespace and quotes removed
    pub fn argument(&self) -> &str {
        strip_quotes(&self.raw_argument)
    }
}

/// A source file loaded for a single locate-and-neutralize pass
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    content: Vec<u8>,
    lines: Vec<Range<usize>>,
}

impl SourceFile {
    /// Reads a file from disk, resolving its path to an absolute one.
    ///
    /// Missing paths and paths that are not regular files are reported as
    /// distinct errors.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::path_not_found(path));
            }
            Err(e) => return Err(Error::file_read(path, e)),
        };
        if !metadata.is_file() {
            return Err(Error::not_a_regular_file(path));
        }

        let resolved = fs::canonicalize(path).map_err(|e| Error::file_read(path, e))?;
        let content = fs::read(&resolved).map_err(|e| Error::file_read(&resolved, e))?;
        trace!("Read {} bytes from {}", content.len(), resolved.display());

        Ok(Self::from_bytes(resolved, content))
    }

    /// Wraps in-memory content under the given identity
    pub fn from_bytes(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let lines = split_lines(&content);
        Self {
            path: path.into(),
            content,
            lines,
        }
    }

    /// The file's identity
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file content
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Number of lines, counting a final unterminated line
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Raw bytes of a line, terminator included
    pub fn line_bytes(&self, index: usize) -> &[u8] {
        &self.content[self.lines[index].clone()]
    }

    /// Text of a line without its terminator, lossily decoded
    pub fn line_text(&self, index: usize) -> Cow<'_, str> {
        let (body, _) = split_terminator(self.line_bytes(index));
        String::from_utf8_lossy(body)
    }
}

/// Splits content into line ranges, each including its `\n` terminator
fn split_lines(content: &[u8]) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &byte) in content.iter().enumerate() {
        if byte == b'\n' {
            lines.push(start..i + 1);
            start = i + 1;
        }
    }
    if start < content.len() {
        lines.push(start..content.len());
    }
    lines
}

/// Splits a raw line into its body and its terminator (`\n`, `\r\n` or empty)
pub(crate) fn split_terminator(line: &[u8]) -> (&[u8], &[u8]) {
    let cut = if line.ends_with(b"\r\n") {
        line.len() - 2
    } else if line.ends_with(b"\n") {
        line.len() - 1
    } else {
        line.len()
    };
    line.split_at(cut)
}

/// Splits a line body into its leading ASCII whitespace and the rest
pub(crate) fn split_indent(body: &[u8]) -> (&[u8], &[u8]) {
    let indent_len = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    body.split_at(indent_len)
}

/// Returns true if the line starts with [`LINE_COMMENT`] once indentation is skipped
pub(crate) fn is_commented(line: &[u8]) -> bool {
    split_indent(line).1.starts_with(LINE_COMMENT.as_bytes())
}

/// A marker waiting for its class declaration
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingMarker {
    line_index: usize,
    raw_argument: String,
    marker_text: String,
    already_neutralized: bool,
    window_remaining: usize,
}

/// State of the [`Locator`]
#[derive(Debug, Clone, PartialEq, Eq)]
enum LocatorState {
    /// No marker is waiting for a class
    SeekingMarker,
    /// At least one marker is waiting; each keeps its own remaining window
    SeekingClass(Vec<PendingMarker>),
}

/// Line-by-line state machine associating markers with class declarations
#[derive(Debug)]
pub struct Locator<'a> {
    patterns: &'a MarkerPatterns,
    file: &'a Path,
    state: LocatorState,
}

impl<'a> Locator<'a> {
    /// Creates a locator for the given file identity
    pub fn new(patterns: &'a MarkerPatterns, file: &'a Path) -> Self {
        Self {
            patterns,
            file,
            state: LocatorState::SeekingMarker,
        }
    }

    /// Returns true while no marker is waiting for a class
    pub fn is_seeking_marker(&self) -> bool {
        self.state == LocatorState::SeekingMarker
    }

    /// Feeds the next line and returns the matches it completes.
    ///
    /// A class declaration only resolves markers from earlier lines, never a
    /// marker on the same line.
    pub fn step(&mut self, line_index: usize, line: &str) -> Vec<MarkerMatch> {
        let mut completed = Vec::new();
        let state = std::mem::replace(&mut self.state, LocatorState::SeekingMarker);

        let mut pending = match state {
            LocatorState::SeekingMarker => Vec::new(),
            LocatorState::SeekingClass(pending) => pending,
        };

        if !pending.is_empty() {
            if let Some(class_name) = self.patterns.find_class(line) {
                completed = pending
                    .drain(..)
                    .map(|marker| {
                        debug!(
                            "Marker at line {} annotates class {}",
                            marker.line_index + 1,
                            class_name
                        );
                        MarkerMatch {
                            line_index: marker.line_index,
                            raw_argument: marker.raw_argument,
                            class_name: class_name.to_string(),
                            marker_text: marker.marker_text,
                            class_line: line.trim().to_string(),
                            already_neutralized: marker.already_neutralized,
                            owning_file: self.file.to_path_buf(),
                        }
                    })
                    .collect();
            } else {
                pending.retain_mut(|marker| {
                    marker.window_remaining -= 1;
                    if marker.window_remaining == 0 {
                        trace!(
                            "No qualifying class within {} lines of marker at line {}",
                            LOOKAHEAD_LINES,
                            marker.line_index + 1
                        );
                    }
                    marker.window_remaining > 0
                });
            }
        }

        if let Some(invocation) = self.patterns.find_marker(line) {
            trace!("Found marker at line {}: {}", line_index + 1, invocation.text);
            pending.push(PendingMarker {
                line_index,
                raw_argument: invocation.argument.to_string(),
                marker_text: invocation.text.to_string(),
                already_neutralized: is_commented(line.as_bytes()),
                window_remaining: LOOKAHEAD_LINES,
            });
        }

        if !pending.is_empty() {
            self.state = LocatorState::SeekingClass(pending);
        }
        completed
    }

    /// Ends the pass, dropping markers whose window ran past end of file
    pub fn finish(self) {
        if let LocatorState::SeekingClass(pending) = self.state {
            for marker in pending {
                trace!(
                    "Marker at line {} reached end of file without a class",
                    marker.line_index + 1
                );
            }
        }
    }
}

/// Trait for implementing custom locating strategies
pub trait ScanStrategy {
    /// Locate all marker matches in the file, in discovery order
    fn scan(&self, file: &SourceFile) -> Vec<MarkerMatch>;
}

/// Primary scanner for finding registration markers
#[derive(Debug, Clone)]
pub struct Scanner {
    patterns: MarkerPatterns,
}

impl Scanner {
    /// Creates a new scanner for the identifiers in `config`
    pub fn new(config: &RegistrarConfig) -> Result<Self> {
        Ok(Self {
            patterns: MarkerPatterns::new(config)?,
        })
    }
}

impl ScanStrategy for Scanner {
    fn scan(&self, file: &SourceFile) -> Vec<MarkerMatch> {
        let mut locator = Locator::new(&self.patterns, file.path());
        let mut matches = Vec::new();

        for index in 0..file.line_count() {
            let line = file.line_text(index);
            matches.extend(locator.step(index, &line));
        }
        locator.finish();

        debug!(
            "Scan of {} complete: found {} marker(s)",
            file.path().display(),
            matches.len()
        );
        matches
    }
}
