//! End-to-end validation run
//!
//! Preflight checks on the operator's paths, then load, rewrite, compile
//! and validate. Every stage fails fast; the only non-error failure is a
//! non-conformant submission.

use std::path::{Path, PathBuf};

use crate::compiler::SchemaCompiler;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::loaders;
use crate::rewriter;
use crate::trusted::TrustedSchemaDirectory;
use crate::validate::{validate, ValidationOutcome};

/// Exit status for a conformant submission
pub const EXIT_CONFORMANT: i32 = 0;
/// Exit status for a non-conformant submission
pub const EXIT_NON_CONFORMANT: i32 = 1;
/// Exit status for any operational failure
pub const EXIT_FAILURE: i32 = 2;

/// What to validate, and against which schema directory
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Directory holding the approved schema files
    pub schema_dir: PathBuf,
    /// The submission to validate
    pub submission: PathBuf,
    /// Fixed values of the run
    pub settings: Settings,
}

impl RunRequest {
    /// A request with the default settings
    pub fn new(schema_dir: impl Into<PathBuf>, submission: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            submission: submission.into(),
            settings: Settings::default(),
        }
    }

    /// Path of the root schema
    pub fn main_schema(&self) -> PathBuf {
        self.schema_dir.join(self.settings.main_schema)
    }

    /// Path of the common-types schema
    pub fn common_types_schema(&self) -> PathBuf {
        self.schema_dir.join(self.settings.common_types_schema)
    }
}

/// Check the operator's paths before anything is parsed
///
/// Returns the verified trusted directory.
pub fn preflight(request: &RunRequest) -> Result<TrustedSchemaDirectory> {
    let policy = &request.settings.policy;
    for path in [&request.schema_dir, &request.submission] {
        if policy.is_forbidden_path(path) {
            return Err(Error::ForbiddenPath {
                path: path.clone(),
                marker: policy.marker().to_string(),
            });
        }
    }

    let trusted = TrustedSchemaDirectory::open(&request.schema_dir)?;
    for path in [request.main_schema(), request.common_types_schema()] {
        require_file(&path)?;
    }
    require_file(&request.submission)?;
    Ok(trusted)
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingFile(path.to_path_buf()))
    }
}

/// Run the whole pipeline for one submission
pub fn run(request: &RunRequest) -> Result<ValidationOutcome> {
    let trusted = preflight(request)?;
    let config = &request.settings.parser;

    let main = loaders::load(request.main_schema(), config, "Main XSD")?;
    loaders::load(request.common_types_schema(), config, "CommonTypes XSD")?;
    let submission = loaders::load(request.submission.as_path(), config, "Submission")?;
    tracing::info!(schema_dir = %trusted.path().display(), "loaded schemas and submission");

    let rewritten = rewriter::rewrite(main, &trusted, &request.settings.policy)?;
    let schema = SchemaCompiler::new(config, &trusted).compile(rewritten)?;
    Ok(validate(&schema, &submission))
}

/// Process exit status for a run result
pub fn exit_code(result: &Result<ValidationOutcome>) -> i32 {
    match result {
        Ok(ValidationOutcome::Conformant) => EXIT_CONFORMANT,
        Ok(ValidationOutcome::NonConformant(_)) => EXIT_NON_CONFORMANT,
        Err(_) => EXIT_FAILURE,
    }
}
