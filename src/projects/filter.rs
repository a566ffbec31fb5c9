//! Parsing of user-supplied project filters.
//!
//! A filter has the shape `fieldName <comparator> value`, for example:
//!
//! ```text
//! numMentors >= 2
//! numInterestedUsers = 0
//! ```
//!
//! The field must be on the allow-list in [`super::fields`], and the value is parsed
//! according to the type that field declares. The result is applied to a SeaORM
//! select through [`QueryFilter::to_expr`].

use std::fmt;
use std::sync::LazyLock;

use axum::http::StatusCode;
use regex::Regex;
use sea_orm::{ColumnTrait, sea_query::SimpleExpr};
use serde::Serialize;
use thiserror::Error;

use super::fields::{self, FieldType, QueryableField};

/// Two-character comparators are listed before their one-character prefixes.
static FILTER_QUERY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+ (>=|<=|!=|>|=|<) [^\s]+$").unwrap());

/// Message shown to end users for every filter rejection.
pub const FILTER_USER_MESSAGE: &str = "Unable to query for projects.";

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
}

impl Comparator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "!=" => Some(Self::Ne),
            "=" => Some(Self::Eq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Ne => "!=",
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison value, already converted to the field's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int32(i32),
    Int64(i64),
}

impl FilterValue {
    fn parse(value_type: FieldType, raw: &str) -> Option<Self> {
        match value_type {
            FieldType::Int32 => raw.parse::<i32>().ok().map(Self::Int32),
            FieldType::Int64 => raw.parse::<i64>().ok().map(Self::Int64),
        }
    }
}

impl From<FilterValue> for sea_orm::Value {
    fn from(value: FilterValue) -> Self {
        match value {
            FilterValue::Int32(v) => sea_orm::Value::Int(Some(v)),
            FilterValue::Int64(v) => sea_orm::Value::BigInt(Some(v)),
        }
    }
}

/// Reasons a filter string can be rejected.
///
/// The `Display` text is the developer-facing message; end users only ever see
/// [`FILTER_USER_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryFilterError {
    #[error("Invalid filter query.")]
    InvalidSyntax { input: String },

    #[error("Cannot filter by the field '{field}'.")]
    UnknownField { field: String },

    #[error("Cannot parse the comparison value '{value}' for the field '{field}'.")]
    UnparsableValue { field: String, value: String },
}

impl QueryFilterError {
    pub fn developer_message(&self) -> String {
        self.to_string()
    }

    pub fn user_message(&self) -> &'static str {
        FILTER_USER_MESSAGE
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// A validated `field comparator value` filter.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    /// Field name and comparator, e.g. `"numMentors >="`
    pub condition: String,
    pub field: &'static QueryableField,
    pub comparator: Comparator,
    pub value: FilterValue,
}

impl QueryFilter {
    /// Parse and validate a filter string.
    pub fn parse(input: &str) -> Result<Self, QueryFilterError> {
        if !FILTER_QUERY_REGEX.is_match(input) {
            return Err(QueryFilterError::InvalidSyntax {
                input: input.to_string(),
            });
        }

        let mut parts = input.splitn(3, ' ');
        let (Some(field_name), Some(comparator_token), Some(raw_value)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(QueryFilterError::InvalidSyntax {
                input: input.to_string(),
            });
        };

        let field = fields::lookup(field_name).ok_or_else(|| QueryFilterError::UnknownField {
            field: field_name.to_string(),
        })?;

        let value = FilterValue::parse(field.value_type, raw_value).ok_or_else(|| {
            QueryFilterError::UnparsableValue {
                field: field_name.to_string(),
                value: raw_value.to_string(),
            }
        })?;

        let comparator = Comparator::from_token(comparator_token).ok_or_else(|| {
            QueryFilterError::InvalidSyntax {
                input: input.to_string(),
            }
        })?;

        Ok(Self {
            condition: format!("{} {}", field.name, comparator),
            field,
            comparator,
            value,
        })
    }

    /// Parse every filter, failing on the first invalid one.
    pub fn parse_all<I, S>(inputs: I) -> Result<Vec<Self>, QueryFilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        inputs
            .into_iter()
            .map(|input| Self::parse(input.as_ref()))
            .collect()
    }

    /// Build the SQL predicate for this filter.
    pub fn to_expr(&self) -> SimpleExpr {
        let column = self.field.column;
        let value = sea_orm::Value::from(self.value);
        match self.comparator {
            Comparator::Gt => column.gt(value),
            Comparator::Gte => column.gte(value),
            Comparator::Ne => column.ne(value),
            Comparator::Eq => column.eq(value),
            Comparator::Lt => column.lt(value),
            Comparator::Lte => column.lte(value),
        }
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            FilterValue::Int32(v) => write!(f, "{} {}", self.condition, v),
            FilterValue::Int64(v) => write!(f, "{} {}", self.condition, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Entity as Project;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter as _, QueryTrait};

    #[test]
    fn parses_num_mentors_filter() {
        let filter = QueryFilter::parse("numMentors >= 2").unwrap();
        assert_eq!(filter.condition, "numMentors >=");
        assert_eq!(filter.value, FilterValue::Int32(2));
        assert_eq!(filter.comparator, Comparator::Gte);
        assert_eq!(filter.field.name, "numMentors");
    }

    #[test]
    fn parses_num_interested_users_filter() {
        let filter = QueryFilter::parse("numInterestedUsers = 0").unwrap();
        assert_eq!(filter.condition, "numInterestedUsers =");
        assert_eq!(filter.value, FilterValue::Int32(0));
    }

    #[test]
    fn every_comparator_is_recognised() {
        for (token, expected) in [
            (">", Comparator::Gt),
            (">=", Comparator::Gte),
            ("!=", Comparator::Ne),
            ("=", Comparator::Eq),
            ("<", Comparator::Lt),
            ("<=", Comparator::Lte),
        ] {
            let filter = QueryFilter::parse(&format!("numMentors {} 1", token)).unwrap();
            assert_eq!(filter.comparator, expected);
            assert_eq!(filter.condition, format!("numMentors {}", token));
        }
    }

    #[test]
    fn value_type_follows_the_declared_field_type() {
        let filter = QueryFilter::parse("timeSyncedWithGitHub <= 1700000000000").unwrap();
        assert_eq!(filter.value, FilterValue::Int64(1_700_000_000_000));

        // Too large for i32 even though it is a valid number
        let err = QueryFilter::parse("numMentors > 1700000000000").unwrap_err();
        assert!(matches!(err, QueryFilterError::UnparsableValue { .. }));
    }

    #[test]
    fn malformed_strings_are_invalid_syntax() {
        for input in [
            "",
            "numMentors",
            "numMentors >=",
            "numMentors >= ",
            "numMentors  >= 2",
            "numMentors >=  2",
            "numMentors >= 2 3",
            "numMentors >== 2",
            "numMentors => 2",
            "numMentors ~ 2",
            "num_mentors >= 2",
            "numMentors2 >= 2",
            " numMentors >= 2",
            "numMentors >= 2\n",
            "numMentors\t>= 2",
        ] {
            let err = QueryFilter::parse(input).unwrap_err();
            assert!(
                matches!(err, QueryFilterError::InvalidSyntax { .. }),
                "expected invalid syntax for {:?}, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        for input in ["repositoryId = 5", "mentorIds != x", "numStars > 10"] {
            let err = QueryFilter::parse(input).unwrap_err();
            assert!(matches!(err, QueryFilterError::UnknownField { .. }));
        }
    }

    #[test]
    fn inexact_values_are_unparsable() {
        for input in [
            "numMentors >= 2.0",
            "numMentors >= 2abc",
            "numMentors >= two",
            "numMentors >= 0x10",
            "numContributors < 1e3",
        ] {
            let err = QueryFilter::parse(input).unwrap_err();
            assert!(
                matches!(err, QueryFilterError::UnparsableValue { .. }),
                "expected unparsable value for {:?}",
                input
            );
        }
    }

    #[test]
    fn unknown_field_is_checked_before_value() {
        let err = QueryFilter::parse("secret = notanumber").unwrap_err();
        assert_eq!(
            err,
            QueryFilterError::UnknownField {
                field: "secret".to_string()
            }
        );
    }

    #[test]
    fn errors_carry_developer_and_user_messages() {
        let err = QueryFilter::parse("numMentors >= lots").unwrap_err();
        assert_eq!(
            err.developer_message(),
            "Cannot parse the comparison value 'lots' for the field 'numMentors'."
        );
        assert_eq!(err.user_message(), "Unable to query for projects.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = QueryFilter::parse("bogus").unwrap_err();
        assert_eq!(err.developer_message(), "Invalid filter query.");
    }

    #[test]
    fn parse_all_stops_at_first_failure() {
        let filters = QueryFilter::parse_all(["numMentors > 0", "numContributors <= 10"]).unwrap();
        assert_eq!(filters.len(), 2);

        let err = QueryFilter::parse_all(["numMentors > 0", "nope"]).unwrap_err();
        assert!(matches!(err, QueryFilterError::InvalidSyntax { .. }));
    }

    #[test]
    fn renders_sql_predicate_on_the_mapped_column() {
        let filter = QueryFilter::parse("numInterestedUsers != 3").unwrap();
        let sql = Project::find()
            .filter(filter.to_expr())
            .build(DbBackend::Postgres)
            .to_string();
        assert!(
            sql.contains(r#""projects"."num_interested_users" <> 3"#),
            "unexpected sql: {}",
            sql
        );
    }

    #[test]
    fn display_round_trips_the_filter() {
        let filter = QueryFilter::parse("numContributors < 25").unwrap();
        assert_eq!(filter.to_string(), "numContributors < 25");
    }
}
