//! `_filters` parser
//!
//! Grammar: `field[__operator]:value[,field[__operator]:value...]` where a
//! value may be an array literal `[a,b,c]`. Commas inside brackets do not
//! separate clauses, and colons after the first one belong to the value.

use std::fmt;

use restlite_common::error::{Error, Result};

const OPERATOR_SEPARATOR: &str = "__";

/// Comparison applied by a filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Null,
    NotNull,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 8] = [
        Self::Lt,
        Self::Gt,
        Self::Lte,
        Self::Gte,
        Self::Eq,
        Self::Neq,
        Self::Null,
        Self::NotNull,
    ];

    /// Resolve the token written after `__`
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.suffix() == suffix)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Lte => "lte",
            Self::Gte => "gte",
            Self::Null => "null",
            Self::NotNull => "notnull",
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Null => "IS NULL",
            Self::NotNull => "IS NOT NULL",
        }
    }

    pub fn takes_value(self) -> bool {
        !matches!(self, Self::Null | Self::NotNull)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of a filter clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    None,
    Scalar(String),
    List(Vec<String>),
}

/// One `field operator value` constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

/// Parse a raw `_filters` string into clauses, preserving their order
pub fn parse_filters(raw: &str) -> Result<Vec<FilterClause>> {
    split_top_level(raw)?
        .into_iter()
        .filter(|segment| !segment.trim().is_empty())
        .map(parse_clause)
        .collect()
}

/// Split on commas that are not inside a `[...]` literal
fn split_top_level(raw: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (index, c) in raw.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::InvalidFilter(format!("Unbalanced ']' in filter '{raw}'"))
                })?;
            }
            ',' if depth == 0 => {
                segments.push(&raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::InvalidFilter(format!(
            "Unbalanced '[' in filter '{raw}'"
        )));
    }
    segments.push(&raw[start..]);
    Ok(segments)
}

fn parse_clause(segment: &str) -> Result<FilterClause> {
    let (key, value) = match segment.split_once(':') {
        // the value is kept exactly as written
        Some((key, value)) => (key.trim(), Some(value)),
        None => (segment.trim(), None),
    };

    let (field, operator) = match key.split_once(OPERATOR_SEPARATOR) {
        Some((field, suffix)) => {
            let operator = FilterOperator::from_suffix(suffix)
                .ok_or_else(|| invalid_operator(field, suffix))?;
            (field, operator)
        }
        None => (key, FilterOperator::Eq),
    };

    if field.is_empty() {
        return Err(Error::InvalidFilter(format!(
            "Missing field name in filter '{segment}'"
        )));
    }

    let value = if operator.takes_value() {
        match value {
            Some(v) if v.starts_with('[') && v.ends_with(']') => {
                if !matches!(operator, FilterOperator::Eq | FilterOperator::Neq) {
                    return Err(Error::InvalidFilter(format!(
                        "Array values can only be used with '__eq' or '__neq', field '{field}' uses '__{}'",
                        operator.suffix()
                    )));
                }
                FilterValue::List(
                    v[1..v.len() - 1]
                        .split(',')
                        .map(|item| item.trim().to_string())
                        .collect(),
                )
            }
            Some(v) => FilterValue::Scalar(v.to_string()),
            None => {
                return Err(Error::InvalidFilter(format!(
                    "Missing value for field '{field}' in filter '{segment}'"
                )))
            }
        }
    } else {
        FilterValue::None
    };

    Ok(FilterClause {
        field: field.to_string(),
        operator,
        value,
    })
}

fn invalid_operator(field: &str, suffix: &str) -> Error {
    let allowed: Vec<String> = FilterOperator::ALL
        .iter()
        .map(|op| format!("__{}", op.suffix()))
        .collect();
    Error::InvalidFilter(format!(
        "Invalid field operator '{suffix}' for field '{field}'. \
         You can only use the following operators after the '{field}' field: {}.",
        allowed.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_clause_with_operator() {
        let clauses = parse_filters("age__gte:18").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].field, "age");
        assert_eq!(clauses[0].operator.to_string(), ">=");
        assert_eq!(clauses[0].value, FilterValue::Scalar("18".to_string()));
    }

    #[test]
    fn test_missing_suffix_defaults_to_eq() {
        let clauses = parse_filters("name:alice,age__lt:30").unwrap();
        assert_eq!(clauses[0].operator, FilterOperator::Eq);
        assert_eq!(clauses[1].operator, FilterOperator::Lt);
        assert_eq!(clauses[1].value, FilterValue::Scalar("30".to_string()));
    }

    #[test]
    fn test_unknown_operator_names_suffix_and_field() {
        let err = parse_filters("age__bogus:18").unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
        let message = err.to_string();
        assert!(message.contains("'bogus'"));
        assert!(message.contains("'age'"));
        assert!(message.contains("__notnull"));
    }

    #[test]
    fn test_array_literal_keeps_inner_commas() {
        let clauses = parse_filters("id:[2, 3],name__neq:bob").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(
            clauses[0].value,
            FilterValue::List(vec!["2".to_string(), "3".to_string()])
        );
        assert_eq!(clauses[1].operator, FilterOperator::Neq);
    }

    #[test]
    fn test_value_with_colons_is_reassembled() {
        let clauses = parse_filters("createdAt__gte:2010-01-01 00:00:00").unwrap();
        assert_eq!(
            clauses[0].value,
            FilterValue::Scalar("2010-01-01 00:00:00".to_string())
        );
    }

    #[test]
    fn test_scalar_value_keeps_whitespace() {
        let clauses = parse_filters(" name: alice ,age__gt:3").unwrap();
        assert_eq!(clauses[0].field, "name");
        assert_eq!(clauses[0].value, FilterValue::Scalar(" alice ".to_string()));
        assert_eq!(clauses[1].value, FilterValue::Scalar("3".to_string()));
    }

    #[test]
    fn test_null_operators_discard_value() {
        let clauses = parse_filters("deletedAt__null:whatever,email__notnull").unwrap();
        assert_eq!(clauses[0].operator, FilterOperator::Null);
        assert_eq!(clauses[0].value, FilterValue::None);
        assert_eq!(clauses[1].operator, FilterOperator::NotNull);
        assert_eq!(clauses[1].operator.as_sql(), "IS NOT NULL");
    }

    #[test]
    fn test_malformed_input() {
        assert!(parse_filters("id:[1,2").is_err());
        assert!(parse_filters("id:1]").is_err());
        assert!(parse_filters("age__gt:[1,2]").is_err());
        assert!(parse_filters("age__gt").is_err());
        assert!(parse_filters(":5").is_err());
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        assert!(parse_filters("").unwrap().is_empty());
        assert_eq!(parse_filters("a:1,,b:2,").unwrap().len(), 2);
    }
}
