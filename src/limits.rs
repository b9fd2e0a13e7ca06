//! Limits and constraints for XML processing
//!
//! These bounds keep a hostile input from growing the in-memory tree
//! without limit. They are part of the hardened [`ParserConfig`]
//! and cannot be relaxed by callers of the pipeline.
//!
//! [`ParserConfig`]: crate::config::ParserConfig

use crate::error::{Error, Result};

/// Processing limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum XML input size in bytes
    pub max_xml_size: usize,

    /// Maximum element nesting depth
    pub max_xml_depth: usize,

    /// Maximum number of attributes per element
    pub max_attributes: usize,

    /// Maximum number of nodes in one document
    pub max_nodes: u32,

    /// Maximum number of schema documents pulled in by one compilation
    pub max_schema_documents: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_xml_depth: 1000,
            max_attributes: 1000,
            max_nodes: 1_000_000,
            max_schema_documents: 100,
        }
    }
}

fn within(what: &str, value: usize, max: usize) -> Result<()> {
    if value > max {
        Err(Error::LimitExceeded(format!("{} {} exceeds maximum {}", what, value, max)))
    } else {
        Ok(())
    }
}

impl Limits {
    /// Check the size of one input in bytes
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        within("XML size (bytes)", size, self.max_xml_size)
    }

    /// Check the nesting depth reached while building a tree
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        within("XML depth", depth, self.max_xml_depth)
    }

    /// Check the attribute count of one element
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        within("Attribute count", count, self.max_attributes)
    }

    /// Check how many schema documents one compilation has pulled in
    pub fn check_schema_documents(&self, count: usize) -> Result<()> {
        within("Schema document count", count, self.max_schema_documents)
    }
}
