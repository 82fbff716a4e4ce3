//! Registration code synthesis module.
//!
//! Turns the accumulated [`Registry`] into two text blocks:
//!
//! 1. An include block, one directive per distinct source file
//! 2. A registration block, one factory statement per entry
//!
//! ## Include path selection
//!
//! Given a library root, each source file is spelled as:
//!
//! - a quoted path relative to `<root>/include`, if it lives there
//! - otherwise a quoted path relative to `<root>`, if it lives there
//! - otherwise an angle-bracket absolute path
//!
//! The [`RegistrationWriter`] trait controls the exact statement syntax.

mod writer;

use crate::registry::Registry;
use std::fmt::Write as FmtWrite;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub use writer::{FactoryWriter, RegistrationWriter};

/// Name of the library subdirectory holding public headers
pub const INCLUDE_DIR: &str = "include";

/// How a source file is referenced from the generated include block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludePath {
    /// `#include "path"`, relative to the include dir or library root
    Quoted(String),
    /// `#include <path>`, for files outside the library
    Absolute(PathBuf),
}

/// Resolves source files to include paths relative to a library root
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    library_root: PathBuf,
}

impl IncludeResolver {
    /// Creates a resolver for the given library root.
    ///
    /// The root is canonicalized when possible so it compares equal to the
    /// resolved paths the scanner produces.
    pub fn new(library_root: impl AsRef<Path>) -> Self {
        let root = library_root.as_ref();
        let library_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self { library_root }
    }

    /// Picks the include form for `file`
    pub fn resolve(&self, file: &Path) -> IncludePath {
        let include_root = self.library_root.join(INCLUDE_DIR);
        if let Ok(relative) = file.strip_prefix(&include_root) {
            return IncludePath::Quoted(to_include_string(relative));
        }
        if let Ok(relative) = file.strip_prefix(&self.library_root) {
            return IncludePath::Quoted(to_include_string(relative));
        }
        IncludePath::Absolute(file.to_path_buf())
    }
}

/// Joins path components with `/`, whatever the host separator
fn to_include_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The generated text blocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    /// Include directives separated by `\n`; empty if nothing was registered
    pub include_block: String,
    /// Registration statements separated by `\n`, without trailing newline
    pub registration_block: String,
    /// Number of include directives
    pub include_count: usize,
}

/// Produces include and registration blocks from a registry
pub struct CodeSynthesizer<W: RegistrationWriter = FactoryWriter> {
    resolver: IncludeResolver,
    writer: W,
}

impl CodeSynthesizer<FactoryWriter> {
    /// Creates a synthesizer with the default factory writer
    pub fn new(library_root: impl AsRef<Path>) -> Self {
        Self::with_writer(library_root, FactoryWriter::default())
    }
}

impl<W: RegistrationWriter> CodeSynthesizer<W> {
    /// Creates a synthesizer with a custom writer
    pub fn with_writer(library_root: impl AsRef<Path>, writer: W) -> Self {
        Self {
            resolver: IncludeResolver::new(library_root),
            writer,
        }
    }

    /// Generates both blocks
    pub fn synthesize(&self, registry: &Registry) -> Synthesis {
        let mut include_block = String::new();
        let include_count = self
            .write_includes_to(&mut include_block, registry)
            .expect("String write cannot fail");
        let mut registration_block = String::new();
        self.write_registrations_to(&mut registration_block, registry)
            .expect("String write cannot fail");

        debug!(
            "Generated {} include(s) and {} registration(s)",
            include_count,
            registry.len()
        );
        Synthesis {
            include_block,
            registration_block,
            include_count,
        }
    }

    /// Writes one include per distinct resolved source file, in first-seen
    /// order, and returns how many were written
    pub fn write_includes_to(
        &self,
        w: &mut impl FmtWrite,
        registry: &Registry,
    ) -> Result<usize, std::fmt::Error> {
        let files = registry.source_files();

        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                w.write_char('\n')?;
            }
            self.writer.write_include(w, &self.resolver.resolve(file))?;
        }

        Ok(files.len())
    }

    /// Writes one statement per entry, closed by a success statement.
    ///
    /// An empty registry yields the failure body alone.
    pub fn write_registrations_to(
        &self,
        w: &mut impl FmtWrite,
        registry: &Registry,
    ) -> std::fmt::Result {
        if registry.is_empty() {
            return self.writer.write_empty_body(w);
        }

        for entry in registry.entries() {
            self.writer.write_registration(w, entry)?;
            w.write_char('\n')?;
        }
        self.writer.write_success(w)
    }
}
