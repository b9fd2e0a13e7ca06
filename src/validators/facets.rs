//! XSD constraining facets
//!
//! Each restriction step carries its own [`Facets`]. A value is checked
//! against every step on the way from its type to the primitive, so
//! facets of the base are enforced without being merged.

use rust_decimal::Decimal;

use super::builtins::AtomicValue;
use super::patterns::XsdPattern;

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse the facet's attribute value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s
                .split(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// An ordering bound (minInclusive and friends)
#[derive(Debug, Clone)]
pub struct Bound {
    /// Bound as written
    pub lexical: String,
    /// Bound in the base type's value space
    pub value: AtomicValue,
}

/// One enumeration member
#[derive(Debug, Clone)]
pub struct EnumValue {
    /// Member as written (after whitespace normalization)
    pub lexical: String,
    /// Member in the base type's value space, when it parsed
    pub value: Option<AtomicValue>,
}

/// Facets declared on one restriction step
#[derive(Debug, Clone, Default)]
pub struct Facets {
    /// length
    pub length: Option<usize>,
    /// minLength
    pub min_length: Option<usize>,
    /// maxLength
    pub max_length: Option<usize>,
    /// Patterns of this step; a value must match one of them
    pub patterns: Vec<XsdPattern>,
    /// Enumeration members; empty means unconstrained
    pub enumeration: Vec<EnumValue>,
    /// whiteSpace
    pub white_space: Option<WhiteSpace>,
    /// minInclusive
    pub min_inclusive: Option<Bound>,
    /// maxInclusive
    pub max_inclusive: Option<Bound>,
    /// minExclusive
    pub min_exclusive: Option<Bound>,
    /// maxExclusive
    pub max_exclusive: Option<Bound>,
    /// totalDigits
    pub total_digits: Option<u32>,
    /// fractionDigits
    pub fraction_digits: Option<u32>,
}

impl Facets {
    /// Check a normalized lexical value and its mapped value
    ///
    /// Returns the first violated facet as a message.
    pub fn check(&self, lexical: &str, value: &AtomicValue) -> Result<(), String> {
        self.check_lengths(lexical, value)?;

        if !self.patterns.is_empty() && !self.patterns.iter().any(|p| p.is_match(lexical)) {
            let shown = self
                .patterns
                .iter()
                .map(|p| p.source())
                .collect::<Vec<_>>()
                .join("' | '");
            return Err(format!(
                "[facet 'pattern'] The value '{}' is not accepted by the pattern '{}'.",
                lexical, shown
            ));
        }

        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e.admits(lexical, value)) {
            let set = self
                .enumeration
                .iter()
                .map(|e| format!("'{}'", e.lexical))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(format!(
                "[facet 'enumeration'] The value '{}' is not an element of the set {{{}}}.",
                lexical, set
            ));
        }

        self.check_bounds(lexical, value)?;
        self.check_digits(lexical, value)
    }

    fn check_lengths(&self, lexical: &str, value: &AtomicValue) -> Result<(), String> {
        if self.length.is_none() && self.min_length.is_none() && self.max_length.is_none() {
            return Ok(());
        }
        let len = value_length(lexical, value);
        if let Some(expected) = self.length {
            if len != expected {
                return Err(format!(
                    "[facet 'length'] The value '{}' has a length of '{}'; this differs from the allowed length of '{}'.",
                    lexical, len, expected
                ));
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(format!(
                    "[facet 'minLength'] The value '{}' has a length of '{}'; this underruns the allowed minimum length of '{}'.",
                    lexical, len, min
                ));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(format!(
                    "[facet 'maxLength'] The value '{}' has a length of '{}'; this exceeds the allowed maximum length of '{}'.",
                    lexical, len, max
                ));
            }
        }
        Ok(())
    }

    fn check_bounds(&self, lexical: &str, value: &AtomicValue) -> Result<(), String> {
        use std::cmp::Ordering::*;

        let compare = |facet: &str, bound: &Bound| -> Result<Option<std::cmp::Ordering>, String> {
            match value.compare(&bound.value) {
                None if value.is_ordered() => Err(format!(
                    "[facet '{}'] The value '{}' cannot be compared with '{}'.",
                    facet, lexical, bound.lexical
                )),
                ordering => Ok(ordering),
            }
        };

        if let Some(bound) = &self.min_inclusive {
            if compare("minInclusive", bound)? == Some(Less) {
                return Err(format!(
                    "[facet 'minInclusive'] The value '{}' is less than the minimum value allowed ('{}').",
                    lexical, bound.lexical
                ));
            }
        }
        if let Some(bound) = &self.max_inclusive {
            if compare("maxInclusive", bound)? == Some(Greater) {
                return Err(format!(
                    "[facet 'maxInclusive'] The value '{}' is greater than the maximum value allowed ('{}').",
                    lexical, bound.lexical
                ));
            }
        }
        if let Some(bound) = &self.min_exclusive {
            if matches!(compare("minExclusive", bound)?, Some(Less | Equal)) {
                return Err(format!(
                    "[facet 'minExclusive'] The value '{}' must be greater than '{}'.",
                    lexical, bound.lexical
                ));
            }
        }
        if let Some(bound) = &self.max_exclusive {
            if matches!(compare("maxExclusive", bound)?, Some(Greater | Equal)) {
                return Err(format!(
                    "[facet 'maxExclusive'] The value '{}' must be less than '{}'.",
                    lexical, bound.lexical
                ));
            }
        }
        Ok(())
    }

    fn check_digits(&self, lexical: &str, value: &AtomicValue) -> Result<(), String> {
        if self.total_digits.is_none() && self.fraction_digits.is_none() {
            return Ok(());
        }
        let (total, fraction) = match value {
            AtomicValue::Decimal(d) => decimal_digits(d),
            AtomicValue::BigDecimal(d) => d.digits(),
            _ => lexical_digits(lexical),
        };
        if let Some(max) = self.total_digits {
            if total > max {
                return Err(format!(
                    "[facet 'totalDigits'] The value '{}' has more digits than are allowed ('{}').",
                    lexical, max
                ));
            }
        }
        if let Some(max) = self.fraction_digits {
            if fraction > max {
                return Err(format!(
                    "[facet 'fractionDigits'] The value '{}' has more fractional digits than are allowed ('{}').",
                    lexical, max
                ));
            }
        }
        Ok(())
    }

    /// Contradictions between facets of the same step
    pub fn consistency_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                errors.push(format!(
                    "The value of 'minLength' ({}) is greater than the value of 'maxLength' ({}).",
                    min, max
                ));
            }
        }
        if self.length.is_some() && (self.min_length.is_some() || self.max_length.is_some()) {
            errors.push(
                "The facet 'length' must not be used together with 'minLength' or 'maxLength'."
                    .to_string(),
            );
        }
        if let (Some(total), Some(fraction)) = (self.total_digits, self.fraction_digits) {
            if fraction > total {
                errors.push(format!(
                    "The value of 'fractionDigits' ({}) is greater than the value of 'totalDigits' ({}).",
                    fraction, total
                ));
            }
        }
        if self.min_inclusive.is_some() && self.min_exclusive.is_some() {
            errors.push("The facets 'minInclusive' and 'minExclusive' are mutually exclusive.".to_string());
        }
        if self.max_inclusive.is_some() && self.max_exclusive.is_some() {
            errors.push("The facets 'maxInclusive' and 'maxExclusive' are mutually exclusive.".to_string());
        }
        let lower = self.min_inclusive.as_ref().or(self.min_exclusive.as_ref());
        let upper = self.max_inclusive.as_ref().or(self.max_exclusive.as_ref());
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo.value.compare(&hi.value) == Some(std::cmp::Ordering::Greater) {
                errors.push(format!(
                    "The minimum bound '{}' is greater than the maximum bound '{}'.",
                    lo.lexical, hi.lexical
                ));
            }
        }
        errors
    }
}

impl EnumValue {
    fn admits(&self, lexical: &str, value: &AtomicValue) -> bool {
        match &self.value {
            Some(member) if member.same_value(value) => true,
            _ => self.lexical == lexical,
        }
    }
}

fn value_length(lexical: &str, value: &AtomicValue) -> usize {
    match value {
        AtomicValue::Binary(octets) => *octets,
        AtomicValue::List(items) => *items,
        _ => lexical.chars().count(),
    }
}

/// (totalDigits, fractionDigits) of a decimal value
fn decimal_digits(value: &Decimal) -> (u32, u32) {
    let normalized = value.normalize();
    let scale = normalized.scale();
    let mantissa = normalized.mantissa().unsigned_abs().to_string().len() as u32;
    (mantissa.max(scale), scale)
}

/// Digit counts straight from the lexical form
fn lexical_digits(lexical: &str) -> (u32, u32) {
    let unsigned = lexical.trim_start_matches(['+', '-']);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int_part = int_part.trim_start_matches('0');
    let frac_part = frac_part.trim_end_matches('0');
    let total = (int_part.len() + frac_part.len()).max(1) as u32;
    (total, frac_part.len() as u32)
}
