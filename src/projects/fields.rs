//! The allow-list of project attributes that clients may filter on.
//!
//! Anything not listed here is rejected by the filter parser before it can reach the
//! database, which keeps internal columns (membership lists, bookkeeping timestamps)
//! out of reach of user-supplied queries.

use crate::models::project::Column;

/// Declared scalar type of a queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int32,
    Int64,
}

/// A field that may appear on the left-hand side of a filter.
#[derive(Debug)]
pub struct QueryableField {
    /// Public attribute name, as used in filter strings and API responses
    pub name: &'static str,
    pub value_type: FieldType,
    pub column: Column,
}

static QUERYABLE_FIELDS: [QueryableField; 4] = [
    QueryableField {
        name: "numMentors",
        value_type: FieldType::Int32,
        column: Column::NumMentors,
    },
    QueryableField {
        name: "numInterestedUsers",
        value_type: FieldType::Int32,
        column: Column::NumInterestedUsers,
    },
    QueryableField {
        name: "numContributors",
        value_type: FieldType::Int32,
        column: Column::NumContributors,
    },
    QueryableField {
        name: "timeSyncedWithGitHub",
        value_type: FieldType::Int64,
        column: Column::TimeSyncedWithGithub,
    },
];

/// Look up a queryable field by its exact (case-sensitive) name.
pub fn lookup(name: &str) -> Option<&'static QueryableField> {
    QUERYABLE_FIELDS.iter().find(|field| field.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::IdenStatic;

    #[test]
    fn lookup_finds_declared_fields() {
        let field = lookup("numMentors").expect("numMentors is queryable");
        assert_eq!(field.value_type, FieldType::Int32);
        assert_eq!(field.column.as_str(), "num_mentors");

        let field = lookup("timeSyncedWithGitHub").expect("sync time is queryable");
        assert_eq!(field.value_type, FieldType::Int64);
        assert_eq!(field.column.as_str(), "time_synced_with_github");
    }

    #[test]
    fn lookup_rejects_unknown_and_internal_fields() {
        assert!(lookup("repositoryId").is_none());
        assert!(lookup("mentorIds").is_none());
        assert!(lookup("nummentors").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn field_names_are_unique() {
        let fields = &QUERYABLE_FIELDS;
        for (i, a) in fields.iter().enumerate() {
            for b in &fields[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }
}
