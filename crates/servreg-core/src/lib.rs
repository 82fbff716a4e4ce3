//! # servreg-core
//!
//! A library for discovering annotated server classes in C++ sources and
//! generating the code that registers them with a runtime factory.
//!
//! This crate provides the core functionality for:
//! - Locating `ServerImpl("id")` markers above classes implementing `IServer`
//! - Commenting the markers out in place, idempotently
//! - Generating include directives and factory registration statements
//! - Patching the generated code into a template's placeholder function
//!
//! Matching is line-oriented. No attempt is made to parse C++.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`scanner`]: Line patterns and the marker locator
//! - [`neutralize`]: In-place commenting of marker lines
//! - [`registry`]: Cross-file accumulation of registration entries
//! - [`codegen`]: Include and registration block generation
//! - [`template`]: Placeholder substitution in the target template
//! - [`pipeline`]: Sequential orchestration of all of the above
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use servreg_core::{ProcessMode, Registrar, RegistrarConfig};
//! use std::path::Path;
//!
//! let registrar = Registrar::new(RegistrarConfig::default())?;
//! let library = Path::new("lib/ArduinoLibServer");
//! let report = registrar.run(
//!     &["lib/ArduinoLibServer/include/HttpTcpServer.h"],
//!     library,
//!     &library.join("include/ServerFactoryInit.h"),
//!     ProcessMode::Apply,
//! );
//! println!("{} registration(s)", report.registrations());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! The library provides several traits for customization:
//!
//! - [`ScanStrategy`]: Customize how markers are located in a file
//! - [`RegistrationWriter`]: Customize how generated statements are spelled
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codegen;
pub mod config;
pub mod error;
pub mod neutralize;
pub mod pipeline;
pub mod registry;
pub mod scanner;
pub mod template;

// Re-export primary types for convenience
pub use codegen::{CodeSynthesizer, FactoryWriter, IncludePath, RegistrationWriter, Synthesis};
pub use config::RegistrarConfig;
pub use error::{Error, Result};
pub use neutralize::{neutralize, NeutralizedLine};
pub use pipeline::{FileOutcome, FileReport, ProcessMode, Registrar, RunReport, TemplateOutcome};
pub use registry::{RegistrationEntry, Registry};
pub use scanner::{MarkerMatch, ScanStrategy, Scanner, SourceFile, LOOKAHEAD_LINES};
pub use template::{Placeholder, TemplateDocument};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default location of the template, relative to the library root
pub const DEFAULT_TEMPLATE: &str = "include/ServerFactoryInit.h";
