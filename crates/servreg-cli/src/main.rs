//! servreg - Register annotated server classes with the server factory
//!
//! This tool scans C++ sources for `ServerImpl("id")` markers above classes
//! implementing `IServer`, comments the markers out, and writes the matching
//! `ServerFactory::RegisterServer<T>("id")` calls into `ServerFactoryInit.h`.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use servreg_core::{
    FileOutcome, ProcessMode, Registrar, RegistrarConfig, RunReport, TemplateOutcome,
    DEFAULT_TEMPLATE,
};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Source extensions considered when scanning libraries
const SOURCE_EXTENSIONS: &[&str] = &["cpp", "h", "hpp", "c", "cc", "cxx", "hxx"];

/// Register annotated server classes with the server factory
#[derive(Parser, Debug)]
#[command(name = "servreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    names: NameArgs,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct NameArgs {
    /// Marker macro identifying classes to register
    #[arg(long, global = true, default_value = "ServerImpl")]
    marker: String,

    /// Interface a class must publicly inherit from
    #[arg(long, global = true, default_value = "IServer")]
    interface: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report markers without modifying anything
    Check {
        /// Files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Comment out markers in place
    Neutralize {
        /// Show what would change without writing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Files to rewrite
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Comment out markers and register their classes in the init template
    Register {
        #[command(flatten)]
        target: TargetArgs,

        /// Library root (include paths are relative to it)
        #[arg(short, long)]
        library_dir: PathBuf,

        /// Files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Discover project libraries and register every annotated class found
    Scan {
        #[command(flatten)]
        target: TargetArgs,

        /// Client project root [default: $PROJECT_DIR, $CMAKE_PROJECT_DIR, or cwd]
        #[arg(short, long, env = "PROJECT_DIR")]
        project_dir: Option<PathBuf>,

        /// Library root holding the init template
        #[arg(short, long, required_unless_present = "list_only")]
        library_dir: Option<PathBuf>,

        /// Only list discovered libraries and source files
        #[arg(long)]
        list_only: bool,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Template to patch [default: <library-dir>/include/ServerFactoryInit.h]
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Show what would change without writing
    #[arg(short = 'n', long)]
    dry_run: bool,
}

impl TargetArgs {
    fn template_path(&self, library_dir: &Path) -> PathBuf {
        self.template
            .clone()
            .unwrap_or_else(|| library_dir.join(DEFAULT_TEMPLATE))
    }

    fn mode(&self) -> ProcessMode {
        if self.dry_run {
            ProcessMode::DryRun
        } else {
            ProcessMode::Apply
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = RegistrarConfig::new()
        .marker_name(&cli.names.marker)
        .interface_name(&cli.names.interface);
    let registrar = Registrar::new(config).context("Invalid marker or interface name")?;

    let success = match &cli.command {
        Command::Check { files } => check_files(&registrar, files),
        Command::Neutralize { dry_run, files } => neutralize_files(&registrar, files, *dry_run),
        Command::Register {
            target,
            library_dir,
            files,
        } => {
            let template = target.template_path(library_dir);
            register(&registrar, files, library_dir, &template, target.mode())
        }
        Command::Scan {
            target,
            project_dir,
            library_dir,
            list_only,
        } => {
            let project_dir = resolve_project_dir(project_dir.as_deref())?;
            println!("Client project directory: {}", project_dir.display());

            let libraries = find_libraries(&project_dir);
            if *list_only {
                print_library_files(&libraries);
                return Ok(ExitCode::SUCCESS);
            }

            let Some(library_dir) = library_dir else {
                bail!("--library-dir is required unless --list-only is given");
            };
            let files: Vec<PathBuf> = libraries
                .iter()
                .flat_map(|lib| collect_source_files(lib))
                .collect();
            let template = target.template_path(library_dir);
            register(&registrar, &files, library_dir, &template, target.mode())
        }
    }?;

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Picks the project directory: flag or `$PROJECT_DIR`, then
/// `$CMAKE_PROJECT_DIR`, then the current directory
fn resolve_project_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    pick_project_dir(explicit, env::var_os("CMAKE_PROJECT_DIR"))
}

fn pick_project_dir(explicit: Option<&Path>, cmake_dir: Option<OsString>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = cmake_dir.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    env::current_dir().context("Failed to determine current directory")
}

/// Finds PlatformIO (`.pio/libdeps/<env>/<lib>`) and CMake
/// (`build/_deps/<lib>`) library directories under the project
fn find_libraries(project_dir: &Path) -> Vec<PathBuf> {
    let mut libraries = Vec::new();

    let pio_libdeps = project_dir.join(".pio").join("libdeps");
    if pio_libdeps.is_dir() {
        info!("Searching PlatformIO libraries in: {}", pio_libdeps.display());
        for platform_dir in sorted_subdirs(&pio_libdeps) {
            for lib_dir in sorted_subdirs(&platform_dir) {
                debug!("Found PlatformIO library: {}", lib_dir.display());
                libraries.push(lib_dir);
            }
        }
    }

    let cmake_deps = project_dir.join("build").join("_deps");
    if cmake_deps.is_dir() {
        info!("Searching CMake libraries in: {}", cmake_deps.display());
        for lib_dir in sorted_subdirs(&cmake_deps) {
            if is_hidden(&lib_dir) {
                continue;
            }
            debug!("Found CMake library: {}", lib_dir.display());
            libraries.push(lib_dir);
        }
    }

    libraries
}

/// Immediate subdirectories, sorted by name
fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(e) => {
            warn!("Error reading {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    dirs.sort();
    dirs
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Heuristic to determine if a file is a C/C++ source or header
fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// All C/C++ files under a library, sorted
fn collect_source_files(library_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(library_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Error scanning {}: {}", library_dir.display(), err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let keep = is_source_file(path);
            if !keep {
                trace!("Skipping non-source: {}", path.display());
            }
            keep
        })
        .collect();
    files.sort();
    files
}

fn print_library_files(libraries: &[PathBuf]) {
    let rule = "=".repeat(80);
    println!("\n{rule}\nLIBRARY FILES REPORT (C/C++ sources only)\n{rule}");

    if libraries.is_empty() {
        println!("\nNo libraries found in the project.");
        return;
    }

    let mut total = 0;
    for lib_dir in libraries {
        let name = lib_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("\n{rule}\nLibrary: {name}\nPath: {}\n{rule}", lib_dir.display());

        let files = collect_source_files(lib_dir);
        total += files.len();
        if files.is_empty() {
            println!("\nNo source files found in this library.");
            continue;
        }
        println!("\nFound {} source file(s):", files.len());
        for file in &files {
            let shown = fs::canonicalize(file).unwrap_or_else(|_| file.clone());
            println!("  {}", shown.display());
        }
    }

    println!("\n{rule}");
    println!("Total libraries: {}", libraries.len());
    println!("Total source files across all libraries: {total}");
    println!("{rule}");
}

/// Report markers only
fn check_files(registrar: &Registrar, files: &[PathBuf]) -> Result<bool> {
    let mut found_any = false;
    let mut failed = false;

    for file in files {
        match registrar.process_file(file, ProcessMode::Check) {
            Ok(report) if report.found() => {
                found_any = true;
                println!(
                    "✓ Found {} marker(s) in {}",
                    report.matches.len(),
                    file.display()
                );
                for (i, m) in report.matches.iter().enumerate() {
                    println!("\nMatch {}:", i + 1);
                    println!("  Line {}: {}", m.line_number(), m.marker_text);
                    println!("  Argument: {}", m.argument());
                    println!("  Class: {}", m.class_name);
                    println!("  Class line: {}", m.class_line);
                }
            }
            Ok(_) => println!("✗ No marker found above a qualifying class in {}", file.display()),
            Err(e) => {
                failed = true;
                println!("Error: {e}");
            }
        }
    }

    Ok(found_any && !failed)
}

/// Comment markers out without touching any template
fn neutralize_files(registrar: &Registrar, files: &[PathBuf], dry_run: bool) -> Result<bool> {
    let mode = if dry_run {
        println!("DRY RUN MODE - No changes will be made\n");
        ProcessMode::DryRun
    } else {
        ProcessMode::Apply
    };
    let mut failed = false;

    for file in files {
        match registrar.process_file(file, mode) {
            Ok(report) if report.modified() => {
                let action = if dry_run { "Would comment" } else { "Commented" };
                println!(
                    "✓ {action} {} marker(s) in {}",
                    report.neutralized.len(),
                    file.display()
                );
                for line in &report.neutralized {
                    println!("\n  Line {}:", line.line_number);
                    println!("    Original: {}", line.original);
                    println!("    {}: {}", if dry_run { "Would be" } else { "Now" }, line.rewritten);
                }
            }
            Ok(_) => println!("✗ No markers to comment in {}", file.display()),
            Err(e) => {
                failed = true;
                println!("Error: {e}");
            }
        }
    }

    Ok(!failed)
}

/// Full pipeline over explicit files
fn register(
    registrar: &Registrar,
    files: &[PathBuf],
    library_dir: &Path,
    template: &Path,
    mode: ProcessMode,
) -> Result<bool> {
    println!("Processing {} file(s)...", files.len());
    println!("Library directory: {}\n", library_dir.display());

    let report = registrar.run(files, library_dir, template, mode);
    for outcome in &report.files {
        print_file_outcome(outcome);
    }
    print_summary(&report);

    match &report.template {
        TemplateOutcome::NothingToRegister => {
            println!("No markers found. Nothing to register.");
        }
        TemplateOutcome::Skipped => {}
        TemplateOutcome::WouldPatch(path) => println!("Would update {}", path.display()),
        TemplateOutcome::Patched(path) => println!("✓ Successfully updated {}", path.display()),
        TemplateOutcome::Failed(e) => println!("Error: {e}"),
    }

    Ok(report.is_success())
}

fn print_file_outcome(outcome: &FileOutcome) {
    println!("Processing: {}", outcome.input.display());
    let report = match &outcome.result {
        Ok(report) => report,
        Err(e) => {
            println!("  Error: {e}");
            return;
        }
    };

    if !report.found() {
        println!("  - No marker found");
        return;
    }
    if report.modified() {
        println!("  ✓ Commented out {} marker(s)", report.neutralized.len());
    } else {
        println!("  ✓ Found {} marker(s) (already commented)", report.matches.len());
    }
    for m in &report.matches {
        println!("    - Class: {}, Argument: \"{}\"", m.class_name, m.argument());
    }
}

fn print_summary(report: &RunReport) {
    let rule = "=".repeat(80);
    println!("\n{rule}");
    println!("Summary:");
    println!(
        "  Files processed: {}/{}",
        report.files_with_markers(),
        report.files_scanned()
    );
    println!("  Files with markers commented: {}", report.files_modified());
    if report.files_failed() > 0 {
        println!("  Files with errors: {}", report.files_failed());
    }
    println!("  Total registrations: {}", report.registrations());
    println!("{rule}\n");

    let Some(synthesis) = &report.synthesis else {
        return;
    };
    if report.registry.is_empty() {
        return;
    }

    let dash = "-".repeat(80);
    if !synthesis.include_block.is_empty() {
        println!("Generated includes:\n{dash}\n{}\n{dash}", synthesis.include_block);
    }
    println!(
        "\nGenerated code:\n{dash}\n{}\n{dash}\n",
        synthesis.registration_block
    );
}
