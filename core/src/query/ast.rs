// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Filter predicate AST.
//!
//! Trees are immutable once parsed; every node owns its children.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Root of a parsed filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BooleanExpr {
    And {
        left: Box<BooleanExpr>,
        right: Box<BooleanExpr>,
    },
    Or {
        left: Box<BooleanExpr>,
        right: Box<BooleanExpr>,
    },
    Not {
        inner: Box<BooleanExpr>,
    },
    Comparison {
        property: PropertyExpr,
        operator: CompareOp,
        value: ValueExpr,
    },
    In {
        property: PropertyExpr,
        values: ValueListExpr,
    },
    Regex {
        property: PropertyExpr,
        pattern: String,
    },
    Like {
        property: PropertyExpr,
        pattern: String,
    },
    NullTest {
        property: PropertyExpr,
        is_null: bool,
    },
    Literal {
        value: bool,
    },
    IntersectsBbox,
    IntersectsGeom {
        wkt: String,
    },
}

impl BooleanExpr {
    pub fn and(left: BooleanExpr, right: BooleanExpr) -> Self {
        BooleanExpr::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: BooleanExpr, right: BooleanExpr) -> Self {
        BooleanExpr::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(inner: BooleanExpr) -> Self {
        BooleanExpr::Not {
            inner: Box::new(inner),
        }
    }

    /// True if any node of the tree is a spatial predicate.
    pub fn is_spatial(&self) -> bool {
        match self {
            BooleanExpr::And { left, right } | BooleanExpr::Or { left, right } => {
                left.is_spatial() || right.is_spatial()
            }
            BooleanExpr::Not { inner } => inner.is_spatial(),
            BooleanExpr::IntersectsBbox | BooleanExpr::IntersectsGeom { .. } => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for BooleanExpr {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::parser::parse(s)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,  // =
    Neq, // !=
    Gt,  // >
    Gte, // >=
    Lt,  // <
    Lte, // <=
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    /// Apply the operator to an ordering of `left` relative to `right`.
    pub fn holds(&self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ord == Equal,
            CompareOp::Neq => ord != Equal,
            CompareOp::Gt => ord == Greater,
            CompareOp::Gte => ord != Less,
            CompareOp::Lt => ord == Less,
            CompareOp::Lte => ord != Greater,
        }
    }
}

/// Dotted attribute path, e.g. `properties.foo`.
///
/// Serialized as its segment list; deserializing goes through
/// [`PropertyExpr::new`] so malformed paths are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PropertyExpr {
    segments: Vec<String>,
}

impl PropertyExpr {
    /// Build a path from segments. Returns `None` if there are no segments or
    /// any segment is empty or holds anything but alphanumerics and `_`.
    pub fn new<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let valid =
            |s: &String| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_');
        if segments.is_empty() || !segments.iter().all(valid) {
            return None;
        }
        Some(Self { segments })
    }

    /// Split a dotted path.
    pub fn from_dotted(path: &str) -> Option<Self> {
        Self::new(path.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl TryFrom<Vec<String>> for PropertyExpr {
    type Error = String;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
            .ok_or_else(|| "property path needs one or more identifier segments".to_string())
    }
}

impl From<PropertyExpr> for Vec<String> {
    fn from(property: PropertyExpr) -> Self {
        property.segments
    }
}

impl fmt::Display for PropertyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Literal on the right-hand side of a predicate.
///
/// Numeric literals keep the exact text they were written with; on
/// deserialize that text must have the same form the parser accepts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "ValueRepr")]
pub enum ValueExpr {
    Integer { text: String },
    Decimal { text: String },
    Text { value: String },
    Boolean { value: bool },
}

static INTEGER_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("static regex"));
static DECIMAL_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").expect("static regex"));

/// Unchecked wire form of [`ValueExpr`].
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ValueRepr {
    Integer { text: String },
    Decimal { text: String },
    Text { value: String },
    Boolean { value: bool },
}

impl TryFrom<ValueRepr> for ValueExpr {
    type Error = String;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        match repr {
            ValueRepr::Integer { text } if INTEGER_TEXT.is_match(&text) => {
                Ok(ValueExpr::Integer { text })
            }
            ValueRepr::Decimal { text } if DECIMAL_TEXT.is_match(&text) => {
                Ok(ValueExpr::Decimal { text })
            }
            ValueRepr::Integer { text } | ValueRepr::Decimal { text } => {
                Err(format!("invalid numeric literal '{}'", text))
            }
            ValueRepr::Text { value } => Ok(ValueExpr::Text { value }),
            ValueRepr::Boolean { value } => Ok(ValueExpr::Boolean { value }),
        }
    }
}

impl ValueExpr {
    pub fn integer(text: impl Into<String>) -> Self {
        ValueExpr::Integer { text: text.into() }
    }

    pub fn decimal(text: impl Into<String>) -> Self {
        ValueExpr::Decimal { text: text.into() }
    }

    pub fn text(value: impl Into<String>) -> Self {
        ValueExpr::Text {
            value: value.into(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        ValueExpr::Boolean { value }
    }

    /// The cast a backend must apply to a property compared with this literal.
    pub fn cast(&self) -> Cast {
        match self {
            ValueExpr::Integer { .. } | ValueExpr::Decimal { .. } => Cast::Decimal,
            ValueExpr::Boolean { .. } => Cast::Bool,
            ValueExpr::Text { .. } => Cast::Text,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValueExpr::Integer { text } | ValueExpr::Decimal { text } => text.parse().ok(),
            _ => None,
        }
    }

    /// Literal as it appears in a rendered predicate.
    pub fn to_literal(&self) -> String {
        match self {
            ValueExpr::Integer { text } | ValueExpr::Decimal { text } => text.clone(),
            ValueExpr::Text { value } => quote(value),
            ValueExpr::Boolean { value } => value.to_string(),
        }
    }
}

/// Single-quoted SQL string literal, embedded quotes doubled.
pub(crate) fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Unordered set of literals for `in (...)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueListExpr {
    values: BTreeSet<ValueExpr>,
}

impl ValueListExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: ValueExpr) -> bool {
        self.values.insert(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValueExpr> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &ValueExpr) -> bool {
        self.values.contains(value)
    }

    /// Shared cast of all members, or text when kinds are mixed.
    pub fn cast(&self) -> Cast {
        let mut casts = self.values.iter().map(ValueExpr::cast);
        match casts.next() {
            Some(first) if casts.all(|c| c == first) => first,
            _ => Cast::Text,
        }
    }
}

impl FromIterator<ValueExpr> for ValueListExpr {
    fn from_iter<I: IntoIterator<Item = ValueExpr>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Backend type cast for a property access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cast {
    Decimal,
    Bool,
    Text,
}

impl Cast {
    pub fn suffix(&self) -> &'static str {
        match self {
            Cast::Decimal => "::decimal",
            Cast::Bool => "::bool",
            Cast::Text => "::text",
        }
    }
}

/// Query parsing error.
#[derive(Debug, Clone, Serialize)]
pub struct QueryError {
    #[serde(rename = "type")]
    pub error_type: QueryErrorType,
    pub message: String,
    pub position: Option<Position>,
}

impl QueryError {
    pub(crate) fn syntax(message: impl Into<String>, position: Position) -> Self {
        Self {
            error_type: QueryErrorType::SyntaxError,
            message: message.into(),
            position: Some(position),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorType {
    SyntaxError,
    InvalidValue,
    InvalidPattern,
    InvalidGeometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = &self.position {
            write!(f, "{} (line {}, column {})", self.message, pos.line, pos.column)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for QueryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_rejects_empty_segments() {
        assert!(PropertyExpr::from_dotted("a..b").is_none());
        assert!(PropertyExpr::from_dotted("").is_none());
        assert!(PropertyExpr::new(Vec::<String>::new()).is_none());
        let p = PropertyExpr::from_dotted("properties.foo").unwrap();
        assert_eq!(p.segments(), ["properties", "foo"]);
        assert_eq!(p.to_string(), "properties.foo");
    }

    #[test]
    fn deserialize_validates_paths_and_literals() {
        use serde_json::{from_value, json};

        assert!(from_value::<PropertyExpr>(json!([])).is_err());
        assert!(from_value::<PropertyExpr>(json!(["a", ""])).is_err());
        assert!(from_value::<PropertyExpr>(json!(["a", "b c"])).is_err());
        assert_eq!(
            from_value::<PropertyExpr>(json!(["properties", "foo"])).unwrap(),
            PropertyExpr::from_dotted("properties.foo").unwrap()
        );

        assert!(from_value::<ValueExpr>(json!({"type": "integer", "text": "x"})).is_err());
        assert!(from_value::<ValueExpr>(json!({"type": "integer", "text": "1.5"})).is_err());
        assert!(from_value::<ValueExpr>(json!({"type": "decimal", "text": "1"})).is_err());
        assert!(from_value::<ValueExpr>(json!({"type": "decimal", "text": "1e3"})).is_err());
        assert_eq!(
            from_value::<ValueExpr>(json!({"type": "decimal", "text": "-2.50"})).unwrap(),
            ValueExpr::decimal("-2.50")
        );
        assert_eq!(
            from_value::<ValueExpr>(json!({"type": "text", "value": "it's"})).unwrap(),
            ValueExpr::text("it's")
        );

        let injected = json!({
            "type": "comparison",
            "property": ["a"],
            "operator": "eq",
            "value": {"type": "integer", "text": "1; DROP TABLE x"}
        });
        assert!(from_value::<BooleanExpr>(injected).is_err());
    }

    #[test]
    fn literal_quotes_are_doubled() {
        assert_eq!(ValueExpr::text("it's").to_literal(), "'it''s'");
        assert_eq!(ValueExpr::integer("-3").to_literal(), "-3");
    }

    #[test]
    fn list_cast_follows_members() {
        let numeric: ValueListExpr = [ValueExpr::integer("1"), ValueExpr::decimal("2.5")]
            .into_iter()
            .collect();
        assert_eq!(numeric.cast(), Cast::Decimal);

        let mixed: ValueListExpr = [ValueExpr::integer("1"), ValueExpr::text("a")]
            .into_iter()
            .collect();
        assert_eq!(mixed.cast(), Cast::Text);

        assert_eq!(ValueListExpr::new().cast(), Cast::Text);
    }

    #[test]
    fn list_collapses_duplicates() {
        let list: ValueListExpr = [ValueExpr::text("a"), ValueExpr::text("a")]
            .into_iter()
            .collect();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn compare_op_holds() {
        use std::cmp::Ordering;
        assert!(CompareOp::Gte.holds(Ordering::Equal));
        assert!(!CompareOp::Gt.holds(Ordering::Equal));
        assert!(CompareOp::Neq.holds(Ordering::Less));
    }
}
