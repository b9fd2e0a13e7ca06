//! Hardened parser configuration and run settings
//!
//! [`ParserConfig::hardened`] is the only way to obtain a parser
//! configuration. Every parse in the crate (submission, root schema,
//! re-parse of the rewritten schema, referenced schema documents) goes
//! through it.

use crate::limits::Limits;
use crate::policy::LocationPolicy;

/// File name of the root FSA029 schema inside the trusted directory
pub const MAIN_SCHEMA_FILE: &str = "FSA029-Schema.xsd";

/// File name of the auxiliary common-types schema inside the trusted directory
pub const COMMON_TYPES_SCHEMA_FILE: &str = "CommonTypes-Schema.xsd";

/// Immutable parser configuration
///
/// All flags are fixed to their hardened values. The fields are private so
/// no caller can build a permissive configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    entity_resolution: bool,
    dtd_loading: bool,
    network_access: bool,
    limits: Limits,
}

impl ParserConfig {
    /// Build the hardened configuration
    pub fn hardened() -> Self {
        Self {
            entity_resolution: false,
            dtd_loading: false,
            network_access: false,
            limits: Limits::default(),
        }
    }

    /// Whether entity references beyond the predefined five are expanded
    pub fn entity_resolution_enabled(&self) -> bool {
        self.entity_resolution
    }

    /// Whether document type declarations are accepted
    pub fn dtd_loading_enabled(&self) -> bool {
        self.dtd_loading
    }

    /// Whether remote resources may be dereferenced
    pub fn network_access_enabled(&self) -> bool {
        self.network_access
    }

    /// Expansion and growth bounds
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

/// Build the hardened parser configuration
pub fn build() -> ParserConfig {
    ParserConfig::hardened()
}

/// Fixed values of one validation run, constructed once at start-up
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root schema file name
    pub main_schema: &'static str,
    /// Common-types schema file name
    pub common_types_schema: &'static str,
    /// Trust policy for schema locations and operator paths
    pub policy: LocationPolicy,
    /// Parser configuration
    pub parser: ParserConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            main_schema: MAIN_SCHEMA_FILE,
            common_types_schema: COMMON_TYPES_SCHEMA_FILE,
            policy: LocationPolicy::regulator_default(),
            parser: ParserConfig::hardened(),
        }
    }
}
