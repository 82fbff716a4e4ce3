//! Line-scoped patterns for marker invocations and qualifying class declarations.
//!
//! Two shapes are recognised, each on a single line:
//!
//! - `NAME ( ARGS )` where `NAME` is the marker identifier. `ARGS` ends at the
//!   first closing parenthesis, so nested parentheses are not supported.
//! - `class IDENT [final] : public BASE` where `BASE` is the required interface.
//!
//! No attempt is made to understand the surrounding language.

use crate::config::RegistrarConfig;
use crate::error::Result;
use regex::Regex;
use std::ops::Range;

/// A marker invocation found on a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerInvocation<'a> {
    /// The full invocation text, e.g. `ServerImpl("echo")`
    pub text: &'a str,
    /// Everything between the parentheses, verbatim
    pub argument: &'a str,
    /// Byte range of the invocation within the line
    pub range: Range<usize>,
}

/// Compiled marker and class-declaration patterns
#[derive(Debug, Clone)]
pub struct MarkerPatterns {
    marker: Regex,
    class_decl: Regex,
}

impl MarkerPatterns {
    /// Compiles the patterns for the identifiers in `config`
    pub fn new(config: &RegistrarConfig) -> Result<Self> {
        let marker = Regex::new(&format!(
            r"\b{}\s*\(([^)]*)\)",
            regex::escape(&config.marker_name)
        ))?;
        let class_decl = Regex::new(&format!(
            r"\bclass\s+(\w+)(?:\s+final)?\s*:\s*public\s+{}\b",
            regex::escape(&config.interface_name)
        ))?;

        Ok(Self { marker, class_decl })
    }

    /// Returns the first marker invocation on the line, if any
    pub fn find_marker<'a>(&self, line: &'a str) -> Option<MarkerInvocation<'a>> {
        let caps = self.marker.captures(line)?;
        let whole = caps.get(0)?;
        let argument = caps.get(1).map_or("", |m| m.as_str());

        Some(MarkerInvocation {
            text: whole.as_str(),
            argument,
            range: whole.range(),
        })
    }

    /// Returns the class name if the line declares a qualifying class
    pub fn find_class<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.class_decl
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Normalizes a marker argument.
///
/// Surrounding whitespace is trimmed, then one matching pair of double or
/// single quotes is removed if it wraps the whole argument.
pub fn strip_quotes(argument: &str) -> &str {
    let trimmed = argument.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}
