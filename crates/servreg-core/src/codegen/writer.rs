//! Extensible statement writing traits.
//!
//! This module provides the [`RegistrationWriter`] trait for customizing
//! how include directives and registration statements are spelled.

use super::IncludePath;
use crate::config::RegistrarConfig;
use crate::registry::RegistrationEntry;
use std::fmt::{Result, Write};

/// Trait for writing generated code fragments to output.
///
/// Each method writes exactly one line, without a trailing newline; the
/// synthesizer joins lines with `\n`.
///
/// # Example
///
/// ```ignore
/// use servreg_core::codegen::{IncludePath, RegistrationWriter};
///
/// struct MacroWriter;
///
/// impl RegistrationWriter for MacroWriter {
///     fn write_registration(&self, out: &mut dyn Write, entry: &RegistrationEntry) -> Result {
///         write!(out, "REGISTER({}, \"{}\");", entry.class_name, entry.argument)
///     }
///     // ... implement other methods
/// }
/// ```
pub trait RegistrationWriter {
    /// Write one include directive
    fn write_include(&self, out: &mut dyn Write, include: &IncludePath) -> Result {
        match include {
            IncludePath::Quoted(path) => write!(out, "#include \"{}\"", path),
            IncludePath::Absolute(path) => write!(out, "#include <{}>", path.display()),
        }
    }

    /// Write one registration statement
    fn write_registration(&self, out: &mut dyn Write, entry: &RegistrationEntry) -> Result;

    /// Write the body used when nothing was registered
    fn write_empty_body(&self, out: &mut dyn Write) -> Result;

    /// Write the statement closing a non-empty registration block
    fn write_success(&self, out: &mut dyn Write) -> Result;
}

/// Writes `Factory::Register<Class>("id");` statements
#[derive(Debug, Clone)]
pub struct FactoryWriter {
    factory_call: String,
    indent: String,
}

impl FactoryWriter {
    /// Creates a writer from the factory call and indentation in `config`
    pub fn new(config: &RegistrarConfig) -> Self {
        Self {
            factory_call: config.factory_call.clone(),
            indent: config.body_indent.clone(),
        }
    }
}

impl Default for FactoryWriter {
    fn default() -> Self {
        Self::new(&RegistrarConfig::default())
    }
}

impl RegistrationWriter for FactoryWriter {
    fn write_registration(&self, out: &mut dyn Write, entry: &RegistrationEntry) -> Result {
        write!(
            out,
            "{}{}<{}>(\"{}\");",
            self.indent, self.factory_call, entry.class_name, entry.argument
        )
    }

    fn write_empty_body(&self, out: &mut dyn Write) -> Result {
        write!(out, "{}return false;", self.indent)
    }

    fn write_success(&self, out: &mut dyn Write) -> Result {
        write!(out, "{}return true;", self.indent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn entry() -> RegistrationEntry {
        RegistrationEntry {
            class_name: "EchoServer".to_string(),
            argument: "echo".to_string(),
            source_file: PathBuf::from("/lib/include/EchoServer.h"),
        }
    }

    #[test]
    fn test_factory_writer_statements() {
        let writer = FactoryWriter::default();
        let mut out = String::new();
        writer.write_registration(&mut out, &entry()).unwrap();
        assert_eq!(out, "    ServerFactory::RegisterServer<EchoServer>(\"echo\");");

        let mut out = String::new();
        writer.write_empty_body(&mut out).unwrap();
        assert_eq!(out, "    return false;");

        let mut out = String::new();
        writer.write_success(&mut out).unwrap();
        assert_eq!(out, "    return true;");
    }

    #[test]
    fn test_default_include_forms() {
        let writer = FactoryWriter::default();
        let mut out = String::new();
        writer
            .write_include(&mut out, &IncludePath::Quoted("net/Echo.h".to_string()))
            .unwrap();
        assert_eq!(out, "#include \"net/Echo.h\"");

        let mut out = String::new();
        writer
            .write_include(&mut out, &IncludePath::Absolute(PathBuf::from("/opt/Echo.h")))
            .unwrap();
        assert_eq!(out, "#include </opt/Echo.h>");
    }

    #[test]
    fn test_custom_config() {
        let config = RegistrarConfig::new()
            .factory_call("Registry::Add")
            .body_indent("\t");
        let writer = FactoryWriter::new(&config);
        let mut out = String::new();
        writer.write_registration(&mut out, &entry()).unwrap();
        assert_eq!(out, "\tRegistry::Add<EchoServer>(\"echo\");");
    }
}
