//! Run orchestration: scan, neutralize, accumulate, synthesize, patch.
//!
//! Files are handled strictly one at a time. Errors raised for one file are
//! recorded in its [`FileOutcome`] and never stop the run; only the template
//! stage can fail the run as a whole.

use crate::codegen::{CodeSynthesizer, FactoryWriter, Synthesis};
use crate::config::RegistrarConfig;
use crate::error::{Error, Result};
use crate::neutralize::{neutralize, NeutralizedLine};
use crate::registry::Registry;
use crate::scanner::{MarkerMatch, ScanStrategy, Scanner, SourceFile};
use crate::template::{Placeholder, TemplateDocument};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How far a run is allowed to go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessMode {
    /// Locate markers only
    Check,
    /// Compute every rewrite but write nothing
    DryRun,
    /// Rewrite sources and the template
    #[default]
    Apply,
}

impl ProcessMode {
    /// Returns true if this mode writes files
    pub fn writes(self) -> bool {
        self == Self::Apply
    }
}

/// What happened to one source file
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Resolved path of the file
    pub path: PathBuf,
    /// Markers found, in line order
    pub matches: Vec<MarkerMatch>,
    /// Lines newly commented out (or that would be, in dry-run mode)
    pub neutralized: Vec<NeutralizedLine>,
    /// Whether the file was written back
    pub written: bool,
}

impl FileReport {
    /// Returns true if at least one marker was found
    pub fn found(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Returns true if at least one marker line was newly commented out
    pub fn modified(&self) -> bool {
        !self.neutralized.is_empty()
    }
}

/// A candidate path and what processing it produced
#[derive(Debug)]
pub struct FileOutcome {
    /// The path as supplied by the caller
    pub input: PathBuf,
    /// The report, or the error that aborted this file
    pub result: Result<FileReport>,
}

/// Result of the template stage
#[derive(Debug)]
pub enum TemplateOutcome {
    /// No registrations were collected, so the template was left alone
    NothingToRegister,
    /// The mode does not touch the template
    Skipped,
    /// The placeholder was found; nothing was written
    WouldPatch(PathBuf),
    /// The template was rewritten
    Patched(PathBuf),
    /// Collected registrations could not be committed
    Failed(Error),
}

/// Summary of a whole run
#[derive(Debug)]
pub struct RunReport {
    /// One outcome per candidate, in input order
    pub files: Vec<FileOutcome>,
    /// All registrations, in accumulation order
    pub registry: Registry,
    /// Generated blocks, absent in check mode
    pub synthesis: Option<Synthesis>,
    /// Template stage result
    pub template: TemplateOutcome,
}

impl RunReport {
    /// Number of candidate files
    pub fn files_scanned(&self) -> usize {
        self.files.len()
    }

    /// Number of files containing at least one matched marker
    pub fn files_with_markers(&self) -> usize {
        self.reports().filter(|r| r.found()).count()
    }

    /// Number of files with newly commented markers
    pub fn files_modified(&self) -> usize {
        self.reports().filter(|r| r.modified()).count()
    }

    /// Number of files that could not be processed
    pub fn files_failed(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_err()).count()
    }

    /// Total registrations
    pub fn registrations(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if no file failed and the template stage succeeded
    pub fn is_success(&self) -> bool {
        self.files_failed() == 0 && !matches!(self.template, TemplateOutcome::Failed(_))
    }

    fn reports(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter_map(|f| f.result.as_ref().ok())
    }
}

/// Drives the full pipeline with one configuration
#[derive(Debug, Clone)]
pub struct Registrar {
    config: RegistrarConfig,
    scanner: Scanner,
    placeholder: Placeholder,
}

impl Registrar {
    /// Compiles all patterns for `config`
    pub fn new(config: RegistrarConfig) -> Result<Self> {
        let scanner = Scanner::new(&config)?;
        let placeholder = Placeholder::new(&config)?;
        Ok(Self {
            config,
            scanner,
            placeholder,
        })
    }

    /// Locates and, unless checking, neutralizes the markers of one file
    pub fn process_file(&self, path: impl AsRef<Path>, mode: ProcessMode) -> Result<FileReport> {
        let file = SourceFile::open(path)?;
        let matches = self.scanner.scan(&file);
        debug!(
            "{}: {} marker(s) found",
            file.path().display(),
            matches.len()
        );

        let mut report = FileReport {
            path: file.path().to_path_buf(),
            matches,
            neutralized: Vec::new(),
            written: false,
        };
        if mode == ProcessMode::Check || report.matches.is_empty() {
            return Ok(report);
        }

        let neutralization = neutralize(&file, &report.matches);
        if mode.writes() {
            report.written = neutralization.write_back(file.path())?;
        }
        report.neutralized = neutralization.lines().to_vec();
        Ok(report)
    }

    /// Processes every candidate and, if anything was registered, patches the
    /// template.
    ///
    /// `library_root` anchors include paths; `template` is the file holding
    /// the placeholder function.
    pub fn run<P: AsRef<Path>>(
        &self,
        paths: &[P],
        library_root: &Path,
        template: &Path,
        mode: ProcessMode,
    ) -> RunReport {
        let mut registry = Registry::new();
        let mut files = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            let result = self.process_file(path, mode);
            match &result {
                Ok(report) => registry.extend_from_matches(&report.matches),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
            files.push(FileOutcome {
                input: path.to_path_buf(),
                result,
            });
        }

        info!(
            "Collected {} registration(s) from {} file(s)",
            registry.len(),
            files.len()
        );

        if mode == ProcessMode::Check {
            return RunReport {
                files,
                registry,
                synthesis: None,
                template: TemplateOutcome::Skipped,
            };
        }

        let synthesis = CodeSynthesizer::with_writer(library_root, FactoryWriter::new(&self.config))
            .synthesize(&registry);

        let template = if registry.is_empty() {
            TemplateOutcome::NothingToRegister
        } else {
            self.patch_template(template, &synthesis, mode)
        };

        RunReport {
            files,
            registry,
            synthesis: Some(synthesis),
            template,
        }
    }

    /// Reads, patches and (in apply mode) writes the template
    pub fn patch_template(
        &self,
        template: &Path,
        synthesis: &Synthesis,
        mode: ProcessMode,
    ) -> TemplateOutcome {
        let patched = TemplateDocument::open(template).and_then(|mut doc| {
            doc.patch(
                &self.placeholder,
                &synthesis.registration_block,
                &synthesis.include_block,
            )?;
            if mode.writes() {
                doc.write()?;
            }
            Ok(doc)
        });

        match patched {
            Ok(doc) if mode.writes() => TemplateOutcome::Patched(doc.path().to_path_buf()),
            Ok(doc) => TemplateOutcome::WouldPatch(doc.path().to_path_buf()),
            Err(e) => TemplateOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const TEMPLATE: &str = "\
#include \"ServerFactory.h\"

/**
 * Initialize the factory
 */
inline Bool Init() {
    return false;
}
";

    struct Fixture {
        _dir: TempDir,
        lib: PathBuf,
        template: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let lib = fs::canonicalize(dir.path()).unwrap().join("lib");
        fs::create_dir_all(lib.join("include")).unwrap();
        fs::create_dir_all(lib.join("src")).unwrap();
        let template = lib.join("include").join("ServerFactoryInit.h");
        fs::write(&template, TEMPLATE).unwrap();
        Fixture {
            _dir: dir,
            lib,
            template,
        }
    }

    fn registrar() -> Registrar {
        Registrar::new(RegistrarConfig::default()).unwrap()
    }

    #[test]
    fn test_end_to_end_echo() {
        let fx = fixture();
        let echo = fx.lib.join("include").join("EchoServer.h");
        fs::write(
            &echo,
            "#pragma once\nServerImpl(\"echo\")\nclass EchoServer final : public IServer {};\n",
        )
        .unwrap();

        let report = registrar().run(&[&echo], &fx.lib, &fx.template, ProcessMode::Apply);
        assert!(report.is_success());
        assert_eq!(report.files_with_markers(), 1);
        assert_eq!(report.files_modified(), 1);
        assert_eq!(report.registrations(), 1);
        assert!(matches!(report.template, TemplateOutcome::Patched(_)));

        assert_eq!(
            fs::read_to_string(&echo).unwrap(),
            "#pragma once\n// ServerImpl(\"echo\")\nclass EchoServer final : public IServer {};\n"
        );
        assert_eq!(
            fs::read_to_string(&fx.template).unwrap(),
            "\
#include \"ServerFactory.h\"

#include \"EchoServer.h\"

/**
 * Initialize the factory
 */
inline Bool Init() {
    ServerFactory::RegisterServer<EchoServer>(\"echo\");
    return true;
}
"
        );
    }

    #[test]
    fn test_second_scan_is_noop() {
        let fx = fixture();
        let tcp = fx.lib.join("src").join("Tcp.h");
        fs::write(&tcp, "ServerImpl('tcp')\nclass Tcp : public IServer {};\n").unwrap();

        let registrar = registrar();
        let first = registrar.process_file(&tcp, ProcessMode::Apply).unwrap();
        assert!(first.written);
        let after_first = fs::read(&tcp).unwrap();

        let second = registrar.process_file(&tcp, ProcessMode::Apply).unwrap();
        assert!(second.found());
        assert!(!second.modified());
        assert!(!second.written);
        assert_eq!(fs::read(&tcp).unwrap(), after_first);
    }

    #[test]
    fn test_already_neutralized_still_registers() {
        let fx = fixture();
        let tcp = fx.lib.join("src").join("Tcp.h");
        fs::write(&tcp, "// ServerImpl('tcp')\nclass Tcp : public IServer {};\n").unwrap();

        let report = registrar().run(&[&tcp], &fx.lib, &fx.template, ProcessMode::Apply);
        assert_eq!(report.files_modified(), 0);
        assert_eq!(report.registrations(), 1);
        let synthesis = report.synthesis.unwrap();
        assert_eq!(synthesis.include_block, "#include \"src/Tcp.h\"");
    }

    #[test]
    fn test_file_errors_are_local() {
        let fx = fixture();
        let good = fx.lib.join("src").join("Good.h");
        fs::write(&good, "ServerImpl(g)\nclass Good : public IServer {};\n").unwrap();
        let missing = fx.lib.join("src").join("Missing.h");
        let directory = fx.lib.join("src");

        let report = registrar().run(
            &[missing.clone(), directory, good],
            &fx.lib,
            &fx.template,
            ProcessMode::Apply,
        );
        assert_eq!(report.files_scanned(), 3);
        assert_eq!(report.files_failed(), 2);
        assert!(matches!(
            report.files[0].result,
            Err(Error::PathNotFound { .. })
        ));
        assert!(matches!(
            report.files[1].result,
            Err(Error::NotARegularFile { .. })
        ));
        assert_eq!(report.files[0].input, missing);
        assert_eq!(report.registrations(), 1);
        assert!(matches!(report.template, TemplateOutcome::Patched(_)));
        assert!(!report.is_success());
    }

    #[test]
    fn test_nothing_to_register_leaves_template() {
        let fx = fixture();
        let plain = fx.lib.join("src").join("Plain.h");
        fs::write(&plain, "int x;\n").unwrap();

        let report = registrar().run(&[&plain], &fx.lib, &fx.template, ProcessMode::Apply);
        assert!(report.is_success());
        assert!(matches!(report.template, TemplateOutcome::NothingToRegister));
        assert_eq!(
            report.synthesis.unwrap().registration_block,
            "    return false;"
        );
        assert_eq!(fs::read_to_string(&fx.template).unwrap(), TEMPLATE);
    }

    #[test]
    fn test_missing_placeholder_fails_run() {
        let fx = fixture();
        fs::write(&fx.template, "inline Bool Init() {\n    return true;\n}\n").unwrap();
        let echo = fx.lib.join("src").join("Echo.h");
        fs::write(&echo, "ServerImpl(e)\nclass Echo : public IServer {};\n").unwrap();

        let report = registrar().run(&[&echo], &fx.lib, &fx.template, ProcessMode::Apply);
        assert!(!report.is_success());
        assert!(matches!(
            report.template,
            TemplateOutcome::Failed(Error::PlaceholderNotFound { .. })
        ));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let fx = fixture();
        let echo = fx.lib.join("src").join("Echo.h");
        let source = "ServerImpl(e)\nclass Echo : public IServer {};\n";
        fs::write(&echo, source).unwrap();

        let report = registrar().run(&[&echo], &fx.lib, &fx.template, ProcessMode::DryRun);
        assert!(report.is_success());
        assert_eq!(report.files_modified(), 1);
        assert!(matches!(report.template, TemplateOutcome::WouldPatch(_)));
        assert_eq!(fs::read_to_string(&echo).unwrap(), source);
        assert_eq!(fs::read_to_string(&fx.template).unwrap(), TEMPLATE);
    }

    #[test]
    fn test_check_mode_only_locates() {
        let fx = fixture();
        let echo = fx.lib.join("src").join("Echo.h");
        let source = "ServerImpl(e)\nclass Echo : public IServer {};\n";
        fs::write(&echo, source).unwrap();

        let report = registrar().run(&[&echo], &fx.lib, &fx.template, ProcessMode::Check);
        assert_eq!(report.files_with_markers(), 1);
        assert_eq!(report.files_modified(), 0);
        assert!(report.synthesis.is_none());
        assert!(matches!(report.template, TemplateOutcome::Skipped));
        assert_eq!(fs::read_to_string(&echo).unwrap(), source);
    }

    #[test]
    fn test_registration_order_across_files() {
        let fx = fixture();
        let a = fx.lib.join("src").join("A.h");
        let b = fx.lib.join("include").join("B.h");
        fs::write(
            &a,
            "ServerImpl(a1)\nclass A1 : public IServer {};\nServerImpl(a2)\nclass A2 : public IServer {};\n",
        )
        .unwrap();
        fs::write(&b, "ServerImpl(\"b\")\nclass B : public IServer {};\n").unwrap();

        let report = registrar().run(&[&b, &a], &fx.lib, &fx.template, ProcessMode::DryRun);
        let synthesis = report.synthesis.unwrap();
        assert_eq!(
            synthesis.include_block,
            "#include \"B.h\"\n#include \"src/A.h\""
        );
        assert_eq!(
            synthesis.registration_block,
            "    ServerFactory::RegisterServer<B>(\"b\");\n\
             \x20   ServerFactory::RegisterServer<A1>(\"a1\");\n\
             \x20   ServerFactory::RegisterServer<A2>(\"a2\");\n\
             \x20   return true;"
        );
    }
}
