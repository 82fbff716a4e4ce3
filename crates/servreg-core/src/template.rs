//! Template patching.
//!
//! The target template holds a placeholder function whose whole body is
//! `return false;`. Patching replaces that body with the registration block
//! and, when an include block is supplied, inserts it above the placeholder
//! next to the closest existing anchor:
//!
//! 1. after the last `#include` directive before the placeholder
//! 2. else after the last block comment before the placeholder
//! 3. else directly before the placeholder
//!
//! Directives and comment markers are only recognised outside block
//! comments, so prose such as `/* add #include lines here */` is never an
//! anchor. The template is handled as bytes; anything that is not valid
//! UTF-8 passes through unchanged.
//!
//! Patching is not idempotent. A patched template no longer contains the
//! placeholder, and patching a template that somehow still does will add the
//! includes again.

use crate::config::RegistrarConfig;
use crate::error::{Error, Result};
use regex::bytes::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the include block goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeAnchor {
    /// After the line of the last include directive
    AfterInclude,
    /// After the line closing the last block comment
    AfterBlockComment,
    /// Immediately before the placeholder function
    BeforePlaceholder,
}

/// Compiled placeholder function pattern.
///
/// Every occurrence is patched, so a template may carry the placeholder in
/// several preprocessor branches. Includes are inserted once, above the
/// first occurrence.
#[derive(Debug, Clone)]
pub struct Placeholder {
    pattern: Regex,
}

impl Placeholder {
    /// Compiles the pattern for `inline <ret> <name>() { return false; }`
    pub fn new(config: &RegistrarConfig) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"(inline\s+{}\s+{}\s*\(\s*\)\s*\{{)\s*return\s+false\s*;(\s*\}})",
            regex::escape(&config.placeholder_return_type),
            regex::escape(&config.placeholder_name)
        ))?;
        Ok(Self { pattern })
    }

    /// Patches `text`, returning `None` if the placeholder is missing
    pub fn patch(&self, text: &[u8], registration_block: &str, include_block: &str) -> Option<Vec<u8>> {
        let mut occurrences = self.pattern.captures_iter(text).peekable();
        let first = occurrences.peek()?.get(0)?.start();

        let mut out = Vec::with_capacity(
            text.len() + registration_block.len() + include_block.len() + 3,
        );
        let mut cursor = 0;

        if !include_block.is_empty() {
            let (anchor, insert_at) = find_include_anchor(text, first);
            debug!("Inserting includes at byte {} ({:?})", insert_at, anchor);
            out.extend_from_slice(&text[..insert_at]);
            out.extend_from_slice(include_block.as_bytes());
            out.extend_from_slice(b"\n\n");
            cursor = insert_at;
        }

        for caps in occurrences {
            let (Some(open), Some(close)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            out.extend_from_slice(&text[cursor..open.end()]);
            out.push(b'\n');
            out.extend_from_slice(registration_block.as_bytes());
            cursor = close.start();
        }
        out.extend_from_slice(&text[cursor..]);
        Some(out)
    }
}

/// Chooses the insertion point for includes above the placeholder.
///
/// The returned offset is never past `placeholder_start` and always sits at
/// the start of a line, after any blank lines following the anchor.
pub fn find_include_anchor(text: &[u8], placeholder_start: usize) -> (IncludeAnchor, usize) {
    let before = &text[..placeholder_start];
    let mut in_comment = false;
    let mut last_include = None;
    let mut last_comment_end = None;
    let mut offset = 0;

    for line in before.split_inclusive(|&b| b == b'\n') {
        let end = offset + line.len();
        if !in_comment && is_include_directive(line) {
            last_include = Some(end);
        }
        if scan_block_comments(line, &mut in_comment) {
            last_comment_end = Some(end);
        }
        offset = end;
    }

    let anchored = last_include
        .map(|end| (IncludeAnchor::AfterInclude, end))
        .or_else(|| last_comment_end.map(|end| (IncludeAnchor::AfterBlockComment, end)));
    let Some((anchor, line_end)) = anchored else {
        return (IncludeAnchor::BeforePlaceholder, placeholder_start);
    };

    let mut insert_at = line_end;
    for line in before[line_end..].split_inclusive(|&b| b == b'\n') {
        if !line.ends_with(b"\n") || !line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
        insert_at += line.len();
    }
    (anchor, insert_at)
}

/// Returns true for `#include` lines, allowing blanks around the `#`
fn is_include_directive(line: &[u8]) -> bool {
    let rest = skip_blanks(line);
    let Some(rest) = rest.strip_prefix(b"#") else {
        return false;
    };
    skip_blanks(rest)
        .strip_prefix(b"include")
        .is_some_and(|tail| !tail.first().is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_'))
}

fn skip_blanks(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t'))
        .unwrap_or(line.len());
    &line[start..]
}

/// Tracks block comment state across one line.
///
/// Returns true if a block comment closes on this line.
fn scan_block_comments(line: &[u8], in_comment: &mut bool) -> bool {
    let mut closed = false;
    let mut i = 0;
    while i + 1 < line.len() {
        match (*in_comment, line[i], line[i + 1]) {
            (true, b'*', b'/') => {
                *in_comment = false;
                closed = true;
                i += 2;
            }
            (false, b'/', b'*') => {
                *in_comment = true;
                i += 2;
            }
            (false, b'/', b'/') => break,
            _ => i += 1,
        }
    }
    closed
}

/// The target template, read once and written at most once
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    path: PathBuf,
    content: Vec<u8>,
}

impl TemplateDocument {
    /// Reads the template from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::path_not_found(path));
        }
        if !path.is_file() {
            return Err(Error::not_a_regular_file(path));
        }
        let content = fs::read(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::from_bytes(path, content))
    }

    /// Wraps in-memory template content
    pub fn from_bytes(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Path of the template
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current template content
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Substitutes the placeholder in memory.
    ///
    /// Fails with [`Error::PlaceholderNotFound`] whether or not an include
    /// block was supplied, leaving the content untouched.
    pub fn patch(
        &mut self,
        placeholder: &Placeholder,
        registration_block: &str,
        include_block: &str,
    ) -> Result<()> {
        let patched = placeholder
            .patch(&self.content, registration_block, include_block)
            .ok_or_else(|| Error::placeholder_not_found(&self.path))?;
        self.content = patched;
        Ok(())
    }

    /// Writes the current content back to the template path
    pub fn write(&self) -> Result<()> {
        fs::write(&self.path, &self.content).map_err(|e| Error::file_write(&self.path, e))?;
        info!("Updated {}", self.path.display());
        Ok(())
    }
}
