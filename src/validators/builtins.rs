//! XSD built-in datatypes
//!
//! Lexical validation and value-space mapping for the XSD 1.0 built-in
//! simple types. Values are mapped only as far as facets need them:
//! numbers and the date/time family get an ordered value; the rest keep
//! their normalized lexical form.
//!
//! Based on xmlschema/validators/builtins.py

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal as Dec;

use super::facets::WhiteSpace;
use crate::names;
use crate::namespaces::NamespaceContext;

// =============================================================================
// Built-in type table
// =============================================================================

/// An XSD 1.0 built-in simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BuiltinType {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NCName,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Boolean,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    PositiveInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    Float,
    Double,
    Duration,
    DateTime,
    Time,
    Date,
    GYearMonth,
    GYear,
    GMonthDay,
    GDay,
    GMonth,
    HexBinary,
    Base64Binary,
    AnyUri,
    QName,
    Notation,
}

/// Facet family admitted by a primitive type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetClass {
    /// length, minLength, maxLength, pattern, enumeration, whiteSpace
    Lengthed,
    /// pattern and whiteSpace only
    Boolean,
    /// decimal family: digits facets plus bounds
    Decimal,
    /// float, double, duration and date/time family: bounds
    Ordered,
    /// anySimpleType accepts the string facets
    Any,
}

lazy_static::lazy_static! {
    /// Built-in types by local name in the XSD namespace
    pub static ref BUILTIN_TYPES: HashMap<&'static str, BuiltinType> = {
        let mut m = HashMap::new();
        for builtin in BuiltinType::ALL {
            m.insert(builtin.name(), *builtin);
        }
        m
    };
}

impl BuiltinType {
    /// Every built-in simple type
    pub const ALL: &'static [BuiltinType] = &[
        BuiltinType::AnySimpleType,
        BuiltinType::String,
        BuiltinType::NormalizedString,
        BuiltinType::Token,
        BuiltinType::Language,
        BuiltinType::Name,
        BuiltinType::NCName,
        BuiltinType::Id,
        BuiltinType::IdRef,
        BuiltinType::IdRefs,
        BuiltinType::Entity,
        BuiltinType::Entities,
        BuiltinType::NmToken,
        BuiltinType::NmTokens,
        BuiltinType::Boolean,
        BuiltinType::Decimal,
        BuiltinType::Integer,
        BuiltinType::NonPositiveInteger,
        BuiltinType::NegativeInteger,
        BuiltinType::Long,
        BuiltinType::Int,
        BuiltinType::Short,
        BuiltinType::Byte,
        BuiltinType::NonNegativeInteger,
        BuiltinType::PositiveInteger,
        BuiltinType::UnsignedLong,
        BuiltinType::UnsignedInt,
        BuiltinType::UnsignedShort,
        BuiltinType::UnsignedByte,
        BuiltinType::Float,
        BuiltinType::Double,
        BuiltinType::Duration,
        BuiltinType::DateTime,
        BuiltinType::Time,
        BuiltinType::Date,
        BuiltinType::GYearMonth,
        BuiltinType::GYear,
        BuiltinType::GMonthDay,
        BuiltinType::GDay,
        BuiltinType::GMonth,
        BuiltinType::HexBinary,
        BuiltinType::Base64Binary,
        BuiltinType::AnyUri,
        BuiltinType::QName,
        BuiltinType::Notation,
    ];

    /// Look up a built-in by its local name
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTIN_TYPES.get(name).copied()
    }

    /// Local name in the XSD namespace
    pub fn name(&self) -> &'static str {
        use BuiltinType::*;
        match self {
            AnySimpleType => "anySimpleType",
            String => "string",
            NormalizedString => "normalizedString",
            Token => "token",
            Language => "language",
            Name => "Name",
            NCName => "NCName",
            Id => "ID",
            IdRef => "IDREF",
            IdRefs => "IDREFS",
            Entity => "ENTITY",
            Entities => "ENTITIES",
            NmToken => "NMTOKEN",
            NmTokens => "NMTOKENS",
            Boolean => "boolean",
            Decimal => "decimal",
            Integer => "integer",
            NonPositiveInteger => "nonPositiveInteger",
            NegativeInteger => "negativeInteger",
            Long => "long",
            Int => "int",
            Short => "short",
            Byte => "byte",
            NonNegativeInteger => "nonNegativeInteger",
            PositiveInteger => "positiveInteger",
            UnsignedLong => "unsignedLong",
            UnsignedInt => "unsignedInt",
            UnsignedShort => "unsignedShort",
            UnsignedByte => "unsignedByte",
            Float => "float",
            Double => "double",
            Duration => "duration",
            DateTime => "dateTime",
            Time => "time",
            Date => "date",
            GYearMonth => "gYearMonth",
            GYear => "gYear",
            GMonthDay => "gMonthDay",
            GDay => "gDay",
            GMonth => "gMonth",
            HexBinary => "hexBinary",
            Base64Binary => "base64Binary",
            AnyUri => "anyURI",
            QName => "QName",
            Notation => "NOTATION",
        }
    }

    /// The built-in this type is derived from by restriction
    ///
    /// `None` for anySimpleType, whose base is anyType.
    pub fn base(&self) -> Option<BuiltinType> {
        use BuiltinType::*;
        let base = match self {
            AnySimpleType => return None,
            NormalizedString => String,
            Token => NormalizedString,
            Language | Name | NmToken => Token,
            NCName => Name,
            Id | IdRef | Entity => NCName,
            Integer => Decimal,
            NonPositiveInteger | Long | NonNegativeInteger => Integer,
            NegativeInteger => NonPositiveInteger,
            Int => Long,
            Short => Int,
            Byte => Short,
            PositiveInteger | UnsignedLong => NonNegativeInteger,
            UnsignedInt => UnsignedLong,
            UnsignedShort => UnsignedInt,
            UnsignedByte => UnsignedShort,
            _ => AnySimpleType,
        };
        Some(base)
    }

    /// Built-in whiteSpace facet value
    pub fn whitespace(&self) -> WhiteSpace {
        use BuiltinType::*;
        match self {
            String | AnySimpleType => WhiteSpace::Preserve,
            NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Whether the value space is a list of items
    pub fn is_list(&self) -> bool {
        matches!(self, BuiltinType::IdRefs | BuiltinType::Entities | BuiltinType::NmTokens)
    }

    /// Whether the type is in the integer-derived family
    pub fn is_integer(&self) -> bool {
        use BuiltinType::*;
        matches!(
            self,
            Integer
                | NonPositiveInteger
                | NegativeInteger
                | Long
                | Int
                | Short
                | Byte
                | NonNegativeInteger
                | PositiveInteger
                | UnsignedLong
                | UnsignedInt
                | UnsignedShort
                | UnsignedByte
        )
    }

    /// Facets the type admits
    pub fn facet_class(&self) -> FacetClass {
        use BuiltinType::*;
        match self {
            AnySimpleType => FacetClass::Any,
            Boolean => FacetClass::Boolean,
            Decimal => FacetClass::Decimal,
            t if t.is_integer() => FacetClass::Decimal,
            Float | Double | Duration | DateTime | Time | Date | GYearMonth | GYear
            | GMonthDay | GDay | GMonth => FacetClass::Ordered,
            _ => FacetClass::Lengthed,
        }
    }

    /// Inclusive bounds of the bounded integer types
    fn integer_range(&self) -> (Option<i128>, Option<i128>) {
        use BuiltinType::*;
        match self {
            NonPositiveInteger => (None, Some(0)),
            NegativeInteger => (None, Some(-1)),
            Long => (Some(i64::MIN as i128), Some(i64::MAX as i128)),
            Int => (Some(i32::MIN as i128), Some(i32::MAX as i128)),
            Short => (Some(i16::MIN as i128), Some(i16::MAX as i128)),
            Byte => (Some(i8::MIN as i128), Some(i8::MAX as i128)),
            NonNegativeInteger => (Some(0), None),
            PositiveInteger => (Some(1), None),
            UnsignedLong => (Some(0), Some(u64::MAX as i128)),
            UnsignedInt => (Some(0), Some(u32::MAX as i128)),
            UnsignedShort => (Some(0), Some(u16::MAX as i128)),
            UnsignedByte => (Some(0), Some(u8::MAX as i128)),
            _ => (None, None),
        }
    }

    /// Validate an already whitespace-normalized lexical value
    ///
    /// `namespaces` resolves prefixes of QName values.
    pub fn parse(&self, value: &str, namespaces: &NamespaceContext) -> Result<AtomicValue, ()> {
        use BuiltinType::*;
        match self {
            AnySimpleType | String | NormalizedString | Token | AnyUri => {
                Ok(AtomicValue::String(value.to_string()))
            }
            Language => check(names::is_valid_language(value), value),
            Name => check(names::is_valid_name(value), value),
            NCName | Id | IdRef | Entity => check(names::is_valid_ncname(value), value),
            NmToken => check(names::is_valid_nmtoken(value), value),
            IdRefs | Entities => parse_list(value, names::is_valid_ncname),
            NmTokens => parse_list(value, names::is_valid_nmtoken),
            Boolean => match value {
                "true" | "1" => Ok(AtomicValue::Boolean(true)),
                "false" | "0" => Ok(AtomicValue::Boolean(false)),
                _ => Err(()),
            },
            Decimal => parse_decimal(value),
            t if t.is_integer() => parse_integer(*t, value),
            Float | Double => parse_double(value),
            Duration => parse_duration(value),
            DateTime => parse_date_time(value),
            Date => parse_date(value),
            Time => parse_time(value),
            GYearMonth => parse_g_year_month(value),
            GYear => parse_g_year(value),
            GMonthDay => parse_g_month_day(value),
            GDay => parse_g_day(value),
            GMonth => parse_g_month(value),
            HexBinary => {
                if HEX_BINARY.is_match(value) {
                    Ok(AtomicValue::Binary(value.len() / 2))
                } else {
                    Err(())
                }
            }
            Base64Binary => {
                let compact: std::string::String =
                    value.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact.as_bytes())
                    .map(|bytes| AtomicValue::Binary(bytes.len()))
                    .map_err(|_| ())
            }
            QName | Notation => {
                if !names::is_valid_qname(value) {
                    return Err(());
                }
                let resolved = namespaces.resolve(value).map_err(|_| ())?;
                Ok(AtomicValue::String(resolved.to_string()))
            }
            _ => Err(()),
        }
    }
}

fn check(ok: bool, value: &str) -> Result<AtomicValue, ()> {
    if ok {
        Ok(AtomicValue::String(value.to_string()))
    } else {
        Err(())
    }
}

fn parse_list(value: &str, item_ok: fn(&str) -> bool) -> Result<AtomicValue, ()> {
    let items: Vec<&str> = value.split_whitespace().collect();
    if items.is_empty() || !items.iter().all(|item| item_ok(item)) {
        return Err(());
    }
    Ok(AtomicValue::List(items.len()))
}

// =============================================================================
// Lexical grammars
// =============================================================================

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static DOUBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([Ee][+-]?\d+)?|[+-]?INF|NaN)$").unwrap()
});
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$").unwrap()
});
static HEX_BINARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{2})*$").unwrap());

const TZ: &str = r"(Z|[+-]\d{2}:\d{2})?";

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}})T(\d{{2}}):(\d{{2}}):(\d{{2}})(\.\d+)?{}$",
        TZ
    ))
    .unwrap()
});
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}}){}$", TZ)).unwrap());
static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\d{{2}}):(\d{{2}}):(\d{{2}})(\.\d+)?{}$", TZ)).unwrap()
});
static G_YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(-?\d{{4,}})-(\d{{2}}){}$", TZ)).unwrap());
static G_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^(-?\d{{4,}}){}$", TZ)).unwrap());
static G_MONTH_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^--(\d{{2}})-(\d{{2}}){}$", TZ)).unwrap());
static G_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^---(\d{{2}}){}$", TZ)).unwrap());
static G_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^--(\d{{2}}){}$", TZ)).unwrap());

// =============================================================================
// XSD Value Representation
// =============================================================================

/// A point on a timeline, normalized to UTC when a timezone was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temporal {
    /// Seconds on the type's own scale (epoch, day or year based)
    pub seconds: i64,
    /// Fractional part in nanoseconds
    pub nanos: u32,
    /// Whether the lexical value carried a timezone
    pub timezoned: bool,
}

/// An exact decimal held as digit strings
///
/// Used for integer and decimal values outside the range of
/// `rust_decimal`, which tops out at 28 significant digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecimalDigits {
    negative: bool,
    /// Integer digits without leading zeros; empty for zero
    integer: String,
    /// Fraction digits without trailing zeros
    fraction: String,
}

impl DecimalDigits {
    /// Parse a lexical `xs:decimal` (sign, digits, optional point)
    pub fn parse(lexical: &str) -> Option<Self> {
        let (negative, unsigned) = match lexical.as_bytes().first()? {
            b'-' => (true, &lexical[1..]),
            b'+' => (false, &lexical[1..]),
            _ => (false, lexical),
        };
        let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if integer.is_empty() && fraction.is_empty() {
            return None;
        }
        if !integer.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let integer = integer.trim_start_matches('0').to_string();
        let fraction = fraction.trim_end_matches('0').to_string();
        let zero = integer.is_empty() && fraction.is_empty();
        Some(Self {
            negative: negative && !zero,
            integer,
            fraction,
        })
    }

    /// (totalDigits, fractionDigits) of the value
    pub fn digits(&self) -> (u32, u32) {
        let total = (self.integer.len() + self.fraction.len()).max(1) as u32;
        (total, self.fraction.len() as u32)
    }

    fn magnitude_cmp(&self, other: &Self) -> Ordering {
        self.integer
            .len()
            .cmp(&other.integer.len())
            .then_with(|| self.integer.cmp(&other.integer))
            .then_with(|| self.fraction.cmp(&other.fraction))
    }
}

impl Ord for DecimalDigits {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.magnitude_cmp(other),
            (true, true) => other.magnitude_cmp(self),
        }
    }
}

impl PartialOrd for DecimalDigits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The value-space view of a simple value, as far as facets need it
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    /// Any string-like value (normalized lexical form)
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Decimal and integer values
    Decimal(Dec),
    /// Decimal and integer values beyond the range of `Decimal`
    BigDecimal(DecimalDigits),
    /// Float and double values
    Double(f64),
    /// Date/time family values
    Temporal(Temporal),
    /// Binary data, by decoded length in octets
    Binary(usize),
    /// List values, by item count
    List(usize),
}

impl AtomicValue {
    /// Compare two values of the same primitive family
    ///
    /// Returns `None` when the values are incomparable (different families,
    /// NaN, or a timezoned value against a local one).
    pub fn compare(&self, other: &AtomicValue) -> Option<Ordering> {
        match (self, other) {
            (AtomicValue::Decimal(a), AtomicValue::Decimal(b)) => Some(a.cmp(b)),
            (AtomicValue::Decimal(_) | AtomicValue::BigDecimal(_), _) => {
                Some(self.exact_decimal()?.cmp(&other.exact_decimal()?))
            }
            (AtomicValue::Double(a), AtomicValue::Double(b)) => a.partial_cmp(b),
            (AtomicValue::Temporal(a), AtomicValue::Temporal(b)) => {
                if a.timezoned != b.timezoned {
                    return None;
                }
                Some((a.seconds, a.nanos).cmp(&(b.seconds, b.nanos)))
            }
            _ => None,
        }
    }

    /// Whether ordering facets apply to values of this kind
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            AtomicValue::Decimal(_)
                | AtomicValue::BigDecimal(_)
                | AtomicValue::Double(_)
                | AtomicValue::Temporal(_)
        )
    }

    fn exact_decimal(&self) -> Option<DecimalDigits> {
        match self {
            AtomicValue::Decimal(d) => DecimalDigits::parse(&d.to_string()),
            AtomicValue::BigDecimal(d) => Some(d.clone()),
            _ => None,
        }
    }

    /// Value equality used by the enumeration facet
    pub fn same_value(&self, other: &AtomicValue) -> bool {
        match (self, other) {
            (AtomicValue::Decimal(a), AtomicValue::Decimal(b)) => a == b,
            (AtomicValue::Decimal(_) | AtomicValue::BigDecimal(_), _) => {
                matches!(self.compare(other), Some(Ordering::Equal))
            }
            (AtomicValue::Double(a), AtomicValue::Double(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (AtomicValue::Temporal(a), AtomicValue::Temporal(b)) => a == b,
            (AtomicValue::Boolean(a), AtomicValue::Boolean(b)) => a == b,
            (AtomicValue::String(a), AtomicValue::String(b)) => a == b,
            _ => false,
        }
    }
}

// =============================================================================
// Numeric parsing
// =============================================================================

fn parse_decimal(value: &str) -> Result<AtomicValue, ()> {
    if !DECIMAL.is_match(value) {
        return Err(());
    }
    let mut text = value.trim_start_matches('+').to_string();
    if text.ends_with('.') {
        text.push('0');
    }
    if let Some(rest) = text.strip_prefix("-.") {
        text = format!("-0.{}", rest);
    } else if text.starts_with('.') {
        text.insert(0, '0');
    }
    match Dec::from_str(&text) {
        Ok(d) => Ok(AtomicValue::Decimal(d)),
        Err(_) => DecimalDigits::parse(value).map(AtomicValue::BigDecimal).ok_or(()),
    }
}

fn parse_integer(kind: BuiltinType, value: &str) -> Result<AtomicValue, ()> {
    if !INTEGER.is_match(value) {
        return Err(());
    }
    let digits = value.trim_start_matches(['+', '-']);
    let negative = value.starts_with('-') && digits.chars().any(|c| c != '0');
    let (min, max) = kind.integer_range();

    match value.trim_start_matches('+').parse::<i128>() {
        Ok(n) => {
            if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                return Err(());
            }
        }
        Err(_) => {
            // Beyond i128: only the unbounded sign-constrained types remain possible
            let bounded_magnitude = matches!(min, Some(m) if m != 0 && m != 1)
                || matches!(max, Some(m) if m != 0 && m != -1);
            if bounded_magnitude
                || (negative && min.is_some())
                || (!negative && max.is_some())
            {
                return Err(());
            }
        }
    }

    match Dec::from_str(value.trim_start_matches('+')) {
        Ok(d) => Ok(AtomicValue::Decimal(d)),
        Err(_) => DecimalDigits::parse(value).map(AtomicValue::BigDecimal).ok_or(()),
    }
}

fn parse_double(value: &str) -> Result<AtomicValue, ()> {
    if !DOUBLE.is_match(value) {
        return Err(());
    }
    let number = match value {
        "INF" | "+INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        other => other.parse::<f64>().map_err(|_| ())?,
    };
    Ok(AtomicValue::Double(number))
}

// =============================================================================
// Date and time parsing
// =============================================================================

fn parse_duration(value: &str) -> Result<AtomicValue, ()> {
    if !DURATION.is_match(value) {
        return Err(());
    }
    let body = value.trim_start_matches('-').trim_start_matches('P');
    if body.is_empty() || body.ends_with('T') {
        return Err(());
    }
    Ok(AtomicValue::String(value.to_string()))
}

fn parse_year(text: &str) -> Result<i32, ()> {
    let digits = text.trim_start_matches('-');
    if digits.len() > 4 && digits.starts_with('0') {
        return Err(());
    }
    let year: i32 = text.parse().map_err(|_| ())?;
    if year == 0 {
        return Err(());
    }
    Ok(year)
}

fn parse_u32(text: &str) -> Result<u32, ()> {
    text.parse().map_err(|_| ())
}

/// Timezone offset in seconds east of UTC
fn parse_timezone(text: Option<&str>) -> Result<Option<i64>, ()> {
    let Some(tz) = text else {
        return Ok(None);
    };
    if tz == "Z" {
        return Ok(Some(0));
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hours: i64 = tz[1..3].parse().map_err(|_| ())?;
    let minutes: i64 = tz[4..6].parse().map_err(|_| ())?;
    if minutes > 59 || hours > 14 || (hours == 14 && minutes > 0) {
        return Err(());
    }
    Ok(Some(sign * (hours * 3600 + minutes * 60)))
}

fn parse_fraction(text: Option<&str>) -> u32 {
    let Some(frac) = text else {
        return 0;
    };
    let digits: String = frac.trim_start_matches('.').chars().take(9).collect();
    let padded = format!("{:0<9}", digits);
    padded.parse().unwrap_or(0)
}

fn temporal(naive: NaiveDateTime, nanos: u32, tz: Option<i64>) -> AtomicValue {
    let seconds = naive.and_utc().timestamp() - tz.unwrap_or(0);
    AtomicValue::Temporal(Temporal {
        seconds,
        nanos,
        timezoned: tz.is_some(),
    })
}

/// Build date and time-of-day, handling the 24:00:00 end-of-day form
fn date_and_time(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<NaiveDateTime, ()> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(())?;
    if hour == 24 {
        if minute != 0 || second != 0 {
            return Err(());
        }
        let next = date.succ_opt().ok_or(())?;
        return next.and_hms_opt(0, 0, 0).ok_or(());
    }
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or(())?;
    Ok(date.and_time(time))
}

fn parse_date_time(value: &str) -> Result<AtomicValue, ()> {
    let caps = DATE_TIME.captures(value).ok_or(())?;
    let year = parse_year(&caps[1])?;
    let naive = date_and_time(
        year,
        parse_u32(&caps[2])?,
        parse_u32(&caps[3])?,
        parse_u32(&caps[4])?,
        parse_u32(&caps[5])?,
        parse_u32(&caps[6])?,
    )?;
    let nanos = parse_fraction(caps.get(7).map(|m| m.as_str()));
    let tz = parse_timezone(caps.get(8).map(|m| m.as_str()))?;
    Ok(temporal(naive, nanos, tz))
}

fn parse_date(value: &str) -> Result<AtomicValue, ()> {
    let caps = DATE.captures(value).ok_or(())?;
    let year = parse_year(&caps[1])?;
    let naive = date_and_time(year, parse_u32(&caps[2])?, parse_u32(&caps[3])?, 0, 0, 0)?;
    let tz = parse_timezone(caps.get(4).map(|m| m.as_str()))?;
    Ok(temporal(naive, 0, tz))
}

fn parse_time(value: &str) -> Result<AtomicValue, ()> {
    let caps = TIME.captures(value).ok_or(())?;
    let hour = parse_u32(&caps[1])?;
    let naive = date_and_time(
        1972,
        1,
        1,
        hour,
        parse_u32(&caps[2])?,
        parse_u32(&caps[3])?,
    )?;
    let nanos = parse_fraction(caps.get(4).map(|m| m.as_str()));
    let tz = parse_timezone(caps.get(5).map(|m| m.as_str()))?;
    Ok(temporal(naive, nanos, tz))
}

fn parse_g_year_month(value: &str) -> Result<AtomicValue, ()> {
    let caps = G_YEAR_MONTH.captures(value).ok_or(())?;
    let year = parse_year(&caps[1])?;
    let naive = date_and_time(year, parse_u32(&caps[2])?, 1, 0, 0, 0)?;
    let tz = parse_timezone(caps.get(3).map(|m| m.as_str()))?;
    Ok(temporal(naive, 0, tz))
}

fn parse_g_year(value: &str) -> Result<AtomicValue, ()> {
    let caps = G_YEAR.captures(value).ok_or(())?;
    let year = parse_year(&caps[1])?;
    let naive = date_and_time(year, 1, 1, 0, 0, 0)?;
    let tz = parse_timezone(caps.get(2).map(|m| m.as_str()))?;
    Ok(temporal(naive, 0, tz))
}

fn parse_g_month_day(value: &str) -> Result<AtomicValue, ()> {
    let caps = G_MONTH_DAY.captures(value).ok_or(())?;
    // 2000 is a leap year, so --02-29 is accepted
    let naive = date_and_time(2000, parse_u32(&caps[1])?, parse_u32(&caps[2])?, 0, 0, 0)?;
    let tz = parse_timezone(caps.get(3).map(|m| m.as_str()))?;
    Ok(temporal(naive, 0, tz))
}

fn parse_g_day(value: &str) -> Result<AtomicValue, ()> {
    let caps = G_DAY.captures(value).ok_or(())?;
    let naive = date_and_time(2000, 1, parse_u32(&caps[1])?, 0, 0, 0)?;
    let tz = parse_timezone(caps.get(2).map(|m| m.as_str()))?;
    Ok(temporal(naive, 0, tz))
}

fn parse_g_month(value: &str) -> Result<AtomicValue, ()> {
    let caps = G_MONTH.captures(value).ok_or(())?;
    let naive = date_and_time(2000, parse_u32(&caps[1])?, 1, 0, 0, 0)?;
    let tz = parse_timezone(caps.get(2).map(|m| m.as_str()))?;
    Ok(temporal(naive, 0, tz))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(t: BuiltinType, v: &str) -> bool {
        t.parse(v, &NamespaceContext::new()).is_ok()
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(BuiltinType::from_name("int"), Some(BuiltinType::Int));
        assert_eq!(BuiltinType::from_name("anyURI"), Some(BuiltinType::AnyUri));
        assert_eq!(BuiltinType::from_name("anyType"), None);
        assert_eq!(BUILTIN_TYPES.len(), BuiltinType::ALL.len());
    }

    #[test]
    fn test_derivation_chain() {
        let mut chain = vec![BuiltinType::UnsignedByte];
        while let Some(base) = chain.last().and_then(|b| b.base()) {
            chain.push(base);
        }
        assert_eq!(chain.len(), 8);
        assert_eq!(chain.last(), Some(&BuiltinType::AnySimpleType));
        assert_eq!(BuiltinType::IdRefs.base(), Some(BuiltinType::AnySimpleType));
    }

    #[test]
    fn test_boolean() {
        assert!(ok(BuiltinType::Boolean, "true"));
        assert!(ok(BuiltinType::Boolean, "0"));
        assert!(!ok(BuiltinType::Boolean, "yes"));
        assert!(!ok(BuiltinType::Boolean, "TRUE"));
    }

    #[test]
    fn test_decimal() {
        assert!(ok(BuiltinType::Decimal, "123.45"));
        assert!(ok(BuiltinType::Decimal, "-.5"));
        assert!(ok(BuiltinType::Decimal, "+7."));
        assert!(!ok(BuiltinType::Decimal, "1e5"));
        assert!(!ok(BuiltinType::Decimal, "1_000"));
        assert!(!ok(BuiltinType::Decimal, ""));
    }

    #[test]
    fn test_integer_ranges() {
        assert!(ok(BuiltinType::Byte, "-128"));
        assert!(!ok(BuiltinType::Byte, "128"));
        assert!(ok(BuiltinType::UnsignedLong, "18446744073709551615"));
        assert!(!ok(BuiltinType::UnsignedLong, "18446744073709551616"));
        assert!(!ok(BuiltinType::PositiveInteger, "0"));
        assert!(ok(BuiltinType::NonNegativeInteger, "-0"));
        assert!(!ok(BuiltinType::NegativeInteger, "0"));
        assert!(!ok(BuiltinType::Int, "1.0"));
        assert!(ok(
            BuiltinType::Integer,
            "123456789012345678901234567890123456789012345"
        ));
        assert!(!ok(
            BuiltinType::NegativeInteger,
            "123456789012345678901234567890123456789012345"
        ));
    }

    #[test]
    fn test_double() {
        assert!(ok(BuiltinType::Double, "1.5E-3"));
        assert!(ok(BuiltinType::Float, "-INF"));
        assert!(ok(BuiltinType::Float, "NaN"));
        assert!(!ok(BuiltinType::Float, "inf"));
        assert!(!ok(BuiltinType::Double, "1e"));
    }

    #[test]
    fn test_dates() {
        assert!(ok(BuiltinType::Date, "2024-02-29"));
        assert!(!ok(BuiltinType::Date, "2023-02-29"));
        assert!(ok(BuiltinType::Date, "2024-01-31Z"));
        assert!(ok(BuiltinType::Date, "2024-01-31+05:30"));
        assert!(!ok(BuiltinType::Date, "2024-1-31"));
        assert!(!ok(BuiltinType::Date, "0000-01-01"));
        assert!(ok(BuiltinType::DateTime, "2024-03-31T23:59:59.123Z"));
        assert!(ok(BuiltinType::DateTime, "2024-03-31T24:00:00"));
        assert!(!ok(BuiltinType::DateTime, "2024-03-31T24:00:01"));
        assert!(!ok(BuiltinType::DateTime, "2024-03-31"));
        assert!(ok(BuiltinType::Time, "13:20:00-05:00"));
        assert!(!ok(BuiltinType::Time, "13:60:00"));
        assert!(ok(BuiltinType::GYearMonth, "2024-12"));
        assert!(!ok(BuiltinType::GYearMonth, "2024-13"));
        assert!(ok(BuiltinType::GYear, "2024"));
        assert!(ok(BuiltinType::GMonthDay, "--02-29"));
        assert!(ok(BuiltinType::GDay, "---31"));
        assert!(ok(BuiltinType::GMonth, "--12"));
        assert!(!ok(BuiltinType::Date, "2024-01-01+15:00"));
    }

    #[test]
    fn test_duration() {
        assert!(ok(BuiltinType::Duration, "P1Y2M3DT10H30M"));
        assert!(ok(BuiltinType::Duration, "-P120D"));
        assert!(ok(BuiltinType::Duration, "PT0.5S"));
        assert!(!ok(BuiltinType::Duration, "P"));
        assert!(!ok(BuiltinType::Duration, "P1YT"));
        assert!(!ok(BuiltinType::Duration, "1Y"));
    }

    #[test]
    fn test_binary() {
        assert_eq!(
            BuiltinType::HexBinary.parse("0FB7", &NamespaceContext::new()),
            Ok(AtomicValue::Binary(2))
        );
        assert!(!ok(BuiltinType::HexBinary, "0FB"));
        assert_eq!(
            BuiltinType::Base64Binary.parse("aGVs bG8=", &NamespaceContext::new()),
            Ok(AtomicValue::Binary(5))
        );
        assert!(!ok(BuiltinType::Base64Binary, "@@@"));
    }

    #[test]
    fn test_names_and_lists() {
        assert!(ok(BuiltinType::NCName, "abc"));
        assert!(!ok(BuiltinType::Id, "a:b"));
        assert_eq!(
            BuiltinType::IdRefs.parse("a b c", &NamespaceContext::new()),
            Ok(AtomicValue::List(3))
        );
        assert!(!ok(BuiltinType::NmTokens, ""));
    }

    #[test]
    fn test_qname_needs_prefix_in_scope() {
        let mut ns = NamespaceContext::new();
        assert!(BuiltinType::QName.parse("p:x", &ns).is_err());
        ns.add_prefix("p", "urn:p");
        assert_eq!(
            BuiltinType::QName.parse("p:x", &ns),
            Ok(AtomicValue::String("{urn:p}x".to_string()))
        );
    }

    #[test]
    fn test_temporal_ordering() {
        let ns = NamespaceContext::new();
        let a = BuiltinType::DateTime.parse("2024-01-01T10:00:00+01:00", &ns).unwrap();
        let b = BuiltinType::DateTime.parse("2024-01-01T09:30:00Z", &ns).unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        let local = BuiltinType::DateTime.parse("2024-01-01T09:30:00", &ns).unwrap();
        assert_eq!(a.compare(&local), None);
    }

    #[test]
    fn test_decimal_value_equality() {
        let ns = NamespaceContext::new();
        let a = BuiltinType::Decimal.parse("1.50", &ns).unwrap();
        let b = BuiltinType::Decimal.parse("1.5", &ns).unwrap();
        assert!(a.same_value(&b));
    }

    #[test]
    fn test_numbers_beyond_decimal_range() {
        let ns = NamespaceContext::new();
        let huge = BuiltinType::Integer.parse("99999999999999999999999999999999", &ns).unwrap();
        let ten = BuiltinType::Integer.parse("10", &ns).unwrap();
        assert!(matches!(huge, AtomicValue::BigDecimal(_)));
        assert_eq!(huge.compare(&ten), Some(Ordering::Greater));
        assert_eq!(ten.compare(&huge), Some(Ordering::Less));

        let long = BuiltinType::Decimal.parse("123456789012345678901234567890.5", &ns).unwrap();
        assert!(matches!(long, AtomicValue::BigDecimal(_)));
        let longer = BuiltinType::Decimal.parse("+123456789012345678901234567890.50", &ns).unwrap();
        assert!(long.same_value(&longer));

        let negative = BuiltinType::Integer.parse("-99999999999999999999999999999999", &ns).unwrap();
        assert_eq!(negative.compare(&ten), Some(Ordering::Less));
        assert_eq!(negative.compare(&huge), Some(Ordering::Less));
    }

    #[test]
    fn test_decimal_digits_ordering() {
        let d = |s: &str| DecimalDigits::parse(s).unwrap();
        assert!(d("0.05") < d("0.5"));
        assert!(d("0.5") < d("0.51"));
        assert!(d("-2") < d("-1.5"));
        assert!(d("100") > d("99.999"));
        assert_eq!(d("-0.0"), d("0"));
        assert_eq!(d("007.500").digits(), (2, 1));
        assert_eq!(DecimalDigits::parse("."), None);
    }
}
