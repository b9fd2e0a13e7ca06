//! # fsa029-validate
//!
//! Hardened validation of regulatory FSA029 XML submissions against a
//! locally pinned XSD distribution.
//!
//! The regulator's published schemas import their common types from a
//! hosted path (`/CommonTypes/v14/`). This crate never follows such
//! references: they are redirected in memory to the operator's trusted
//! schema directory, and the schemas and the submission are parsed with
//! entity expansion, DTD loading and network access disabled.
//!
//! ## Pipeline
//!
//! 1. Preflight checks on the operator's paths ([`pipeline::preflight`])
//! 2. Hardened loading ([`loaders::load`] with [`config::ParserConfig`])
//! 3. Reference rewrite and verification ([`rewriter`])
//! 4. Serialize, re-parse and compile ([`compiler::SchemaCompiler`])
//! 5. Validation ([`validate::validate`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use fsa029_validate::pipeline::{self, RunRequest};
//!
//! let request = RunRequest::new("schemas/", "submission.xml");
//! let result = pipeline::run(&request);
//! std::process::exit(pipeline::exit_code(&result));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod diagnostics;
pub mod error;
pub mod limits;

// Configuration and trust policy
pub mod config;
pub mod policy;

// XML utilities
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading
pub mod documents;
pub mod loaders;
pub mod serializer;
pub mod trusted;

// Pipeline stages
pub mod compiler;
pub mod rewriter;
pub mod validate;

// Schema engine
pub mod validators;

// Orchestration and reporting
pub mod pipeline;
pub mod report;

// Re-exports for convenience
pub use config::{ParserConfig, Settings};
pub use diagnostics::Diagnostic;
pub use error::{Error, Result};
pub use namespaces::{XML_NAMESPACE, XSD_NAMESPACE, XSI_NAMESPACE};
pub use pipeline::{exit_code, run, RunRequest};
pub use validate::ValidationOutcome;
pub use validators::XsdSchema;

/// Version of the fsa029-validate library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
