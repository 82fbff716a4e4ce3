//! Comment out matched marker lines in place.
//!
//! A marker line is rewritten as its original indentation, the line-comment
//! token, and the rest of the original line. Lines that already start with
//! the comment token are left alone, so running twice changes nothing.

use crate::error::{Error, Result};
use crate::scanner::{
    is_commented, split_indent, split_terminator, MarkerMatch, SourceFile, LINE_COMMENT,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// A marker line that was (or would be) commented out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeutralizedLine {
    /// One-based line number
    pub line_number: usize,
    /// The line before rewriting, without terminator
    pub original: String,
    /// The line after rewriting, without terminator
    pub rewritten: String,
}

/// Result of neutralizing one file in memory
#[derive(Debug, Clone, Default)]
pub struct Neutralization {
    content: Vec<u8>,
    lines: Vec<NeutralizedLine>,
}

impl Neutralization {
    /// The rewritten file content
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Lines newly commented out by this pass
    pub fn lines(&self) -> &[NeutralizedLine] {
        &self.lines
    }

    /// Returns true if at least one line changed
    pub fn is_modified(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Writes the content back to `path` if anything changed.
    ///
    /// Returns whether a write happened; unmodified files are never opened.
    pub fn write_back(&self, path: &Path) -> Result<bool> {
        if !self.is_modified() {
            return Ok(false);
        }
        fs::write(path, &self.content).map_err(|e| Error::file_write(path, e))?;
        info!(
            "Commented {} marker(s) in {}",
            self.lines.len(),
            path.display()
        );
        Ok(true)
    }
}

/// Rewrites a single marker line, or returns `None` if it is already a comment
pub fn neutralize_line(line: &[u8]) -> Option<Vec<u8>> {
    let (body, terminator) = split_terminator(line);
    if is_commented(body) {
        return None;
    }
    let (indent, rest) = split_indent(body);

    let mut rewritten = Vec::with_capacity(line.len() + LINE_COMMENT.len() + 1);
    rewritten.extend_from_slice(indent);
    rewritten.extend_from_slice(LINE_COMMENT.as_bytes());
    rewritten.push(b' ');
    rewritten.extend_from_slice(rest);
    rewritten.extend_from_slice(terminator);
    Some(rewritten)
}

/// Comments out the marker line of every match, leaving all other bytes as-is
pub fn neutralize(file: &SourceFile, matches: &[MarkerMatch]) -> Neutralization {
    let mut content = Vec::with_capacity(file.as_bytes().len() + matches.len() * 3);
    let mut lines = Vec::new();
    let targets: BTreeSet<usize> = matches.iter().map(|m| m.line_index).collect();

    for index in 0..file.line_count() {
        let line = file.line_bytes(index);

        match targets.contains(&index).then(|| neutralize_line(line)).flatten() {
            Some(rewritten) => {
                let (original, _) = split_terminator(line);
                let (new_body, _) = split_terminator(&rewritten);
                lines.push(NeutralizedLine {
                    line_number: index + 1,
                    original: String::from_utf8_lossy(original).into_owned(),
                    rewritten: String::from_utf8_lossy(new_body).into_owned(),
                });
                content.extend_from_slice(&rewritten);
            }
            None => content.extend_from_slice(line),
        }
    }

    debug!(
        "Neutralized {} line(s) in {}",
        lines.len(),
        file.path().display()
    );
    Neutralization { content, lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistrarConfig;
    use crate::scanner::{ScanStrategy, Scanner};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn run(text: &[u8]) -> Neutralization {
        let file = SourceFile::from_bytes("/lib/Echo.h", text);
        let matches = Scanner::new(&RegistrarConfig::default())
            .unwrap()
            .scan(&file);
        neutralize(&file, &matches)
    }

    #[test]
    fn test_neutralize_line() {
        assert_eq!(
            neutralize_line(b"ServerImpl(\"echo\")\n").unwrap(),
            b"// ServerImpl(\"echo\")\n"
        );
        assert_eq!(
            neutralize_line(b"\t  ServerImpl(x)\r\n").unwrap(),
            b"\t  // ServerImpl(x)\r\n"
        );
        assert_eq!(neutralize_line(b"ServerImpl(x)").unwrap(), b"// ServerImpl(x)");
        assert!(neutralize_line(b"   // ServerImpl(x)\n").is_none());
        assert!(neutralize_line(b"//ServerImpl(x)\n").is_none());
    }

    #[test]
    fn test_form_feed_indented_comment_untouched() {
        let text = b"\x0c// ServerImpl(a)\nclass A : public IServer {};\n";
        let file = SourceFile::from_bytes("/lib/A.h", &text[..]);
        let matches = Scanner::new(&RegistrarConfig::default())
            .unwrap()
            .scan(&file);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].already_neutralized);

        let n = neutralize(&file, &matches);
        assert!(!n.is_modified());
        assert_eq!(n.content(), &text[..]);
        assert!(neutralize_line(b"\x0c// ServerImpl(a)\n").is_none());
    }

    #[test]
    fn test_echo_server_rewrite() {
        let n = run(b"ServerImpl(\"echo\")\nclass EchoServer final : public IServer\n");
        assert!(n.is_modified());
        assert_eq!(
            String::from_utf8_lossy(n.content()),
            "// ServerImpl(\"echo\")\nclass EchoServer final : public IServer\n"
        );
        assert_eq!(
            n.lines(),
            &[NeutralizedLine {
                line_number: 1,
                original: "ServerImpl(\"echo\")".to_string(),
                rewritten: "// ServerImpl(\"echo\")".to_string(),
            }]
        );
    }

    #[test]
    fn test_idempotent() {
        let first = run(b"  ServerImpl(a)\n  class A : public IServer {};\n");
        assert_eq!(first.lines().len(), 1);

        let second = run(first.content());
        assert!(!second.is_modified());
        assert_eq!(second.content(), first.content());
    }

    #[test]
    fn test_unmatched_marker_untouched() {
        let text = b"ServerImpl(\"echo\")\n\n\n\n\n\n\nclass EchoServer : public IServer\n";
        let n = run(text);
        assert!(!n.is_modified());
        assert_eq!(n.content(), &text[..]);
    }

    #[test]
    fn test_preserves_other_bytes() {
        let mut text = b"#pragma once\r\n\xff\xfe binary-ish\r\n".to_vec();
        text.extend_from_slice(b"    ServerImpl('tcp') // keep me\r\n");
        text.extend_from_slice(b"    class Tcp : public IServer {};\r\nint tail;");

        let n = run(&text);
        let mut expected = b"#pragma once\r\n\xff\xfe binary-ish\r\n".to_vec();
        expected.extend_from_slice(b"    // ServerImpl('tcp') // keep me\r\n");
        expected.extend_from_slice(b"    class Tcp : public IServer {};\r\nint tail;");
        assert_eq!(n.content(), &expected[..]);
    }

    #[test]
    fn test_stacked_markers_each_rewritten() {
        let n = run(b"ServerImpl(a)\nServerImpl(b)\nclass Both : public IServer\n");
        assert_eq!(n.lines().len(), 2);
        assert_eq!(
            String::from_utf8_lossy(n.content()),
            "// ServerImpl(a)\n// ServerImpl(b)\nclass Both : public IServer\n"
        );
    }

    #[test]
    fn test_write_back_skips_unmodified() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("none.h");

        // Path does not exist: a write attempt would create it
        let n = Neutralization::default();
        assert!(!n.write_back(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_write_back_writes_modified() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Echo.h");
        std::fs::write(&path, "ServerImpl(e)\nclass E : public IServer\n").unwrap();

        let file = SourceFile::open(&path).unwrap();
        let matches = Scanner::new(&RegistrarConfig::default())
            .unwrap()
            .scan(&file);
        let n = neutralize(&file, &matches);
        assert!(n.write_back(file.path()).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "// ServerImpl(e)\nclass E : public IServer\n"
        );
    }
}
