//! XML Schema validators
//!
//! A pure-Rust XSD 1.0 engine. Schema documents are collected by
//! [`parsing`], turned into a component arena by [`builders`] and wrapped
//! in an immutable [`XsdSchema`]; instances are checked by
//! [`document_validation`].

// Datatypes
pub mod builtins;
pub mod facets;
pub mod patterns;
pub mod simple_types;

// Structures
pub mod attributes;
pub mod complex_types;
pub mod elements;
pub mod groups;
pub mod identities;
pub mod models;
pub mod particles;
pub mod wildcards;

// Schema assembly
pub mod builders;
pub mod globals;
pub mod parsing;
pub mod schemas;

// Instance validation
pub mod document_validation;
pub mod validation;

pub use builtins::{AtomicValue, BuiltinType};
pub use globals::{GlobalMaps, SchemaComponents, TypeId};
pub use parsing::{SchemaCollector, SchemaDocument};
pub use schemas::XsdSchema;
