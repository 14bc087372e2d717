//! Filter planner (C7).
//!
//! Translates a caller-supplied filter map into a [`FilterPredicate`] that
//! every retrieval path (catalog lookups, dense scan, lexical search)
//! consumes identically, so a filtered query never sees different
//! candidate sets depending on which index answered it.

use crate::storage::FilterPredicate;
use chrono::NaiveDate;

/// The filterable fields a query may restrict on. All fields are
/// optional; an absent field applies no restriction.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    /// Restrict to a single controlled framework (e.g. "SOX").
    pub framework: Option<String>,
    /// Restrict to a single controlled jurisdiction (e.g. "US").
    pub jurisdiction: Option<String>,
    /// Restrict to a single controlled document type.
    pub doc_type: Option<String>,
    /// Restrict to a single controlled authority level.
    pub authority_level: Option<String>,
    /// Restrict to documents effective on or before this date.
    pub as_of: Option<NaiveDate>,
    /// Internal-only: restrict to chunks owned by a single document,
    /// used by re-query paths that already know the `source_id` (e.g.
    /// "more like this chunk").
    pub focus_source_id: Option<String>,
}

impl FilterSet {
    /// Builds the SQL predicate for this filter set. Columns are
    /// qualified with the `c.` alias both `ann_search` and
    /// `sparse_search` use for the `chunks` table.
    #[must_use]
    pub fn build(&self) -> FilterPredicate {
        let mut clauses = Vec::new();
        let mut params: Vec<(&'static str, String)> = Vec::new();

        if let Some(v) = &self.framework {
            clauses.push("c.framework = :framework");
            params.push((":framework", v.clone()));
        }
        if let Some(v) = &self.jurisdiction {
            clauses.push("c.jurisdiction = :jurisdiction");
            params.push((":jurisdiction", v.clone()));
        }
        if let Some(v) = &self.doc_type {
            clauses.push("c.doc_type = :doc_type");
            params.push((":doc_type", v.clone()));
        }
        if let Some(v) = &self.authority_level {
            clauses.push("c.authority_level = :authority_level");
            params.push((":authority_level", v.clone()));
        }
        if let Some(v) = &self.as_of {
            clauses.push("c.effective_date <= :as_of");
            params.push((":as_of", v.to_string()));
        }
        if let Some(v) = &self.focus_source_id {
            clauses.push("c.source_id = :focus_source_id");
            params.push((":focus_source_id", v.clone()));
        }

        if clauses.is_empty() {
            return FilterPredicate::none();
        }

        FilterPredicate {
            sql: clauses.join(" AND "),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_set_builds_empty_predicate() {
        let predicate = FilterSet::default().build();
        assert!(predicate.is_empty());
    }

    #[test]
    fn single_field_builds_one_clause() {
        let filters = FilterSet {
            framework: Some("SOX".to_string()),
            ..Default::default()
        };
        let predicate = filters.build();
        assert_eq!(predicate.sql, "c.framework = :framework");
        assert_eq!(predicate.params, vec![(":framework", "SOX".to_string())]);
    }

    #[test]
    fn multiple_fields_join_with_and() {
        let filters = FilterSet {
            framework: Some("SOX".to_string()),
            jurisdiction: Some("US".to_string()),
            as_of: Some(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            ..Default::default()
        };
        let predicate = filters.build();
        assert_eq!(
            predicate.sql,
            "c.framework = :framework AND c.jurisdiction = :jurisdiction AND c.effective_date <= :as_of"
        );
        assert_eq!(predicate.params.len(), 3);
    }

    #[test]
    fn focus_source_id_restricts_to_one_document() {
        let filters = FilterSet {
            focus_source_id: Some("abc123".to_string()),
            ..Default::default()
        };
        let predicate = filters.build();
        assert_eq!(predicate.sql, "c.source_id = :focus_source_id");
    }
}
