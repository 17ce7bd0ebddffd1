//! Parameterized WHERE-clause generation for event filter search.
//!
//! All user-supplied values travel as bind parameters; the generated SQL
//! only ever contains `$n` placeholders and whitelisted column names.

use chrono::{DateTime, Utc};

use mozaika_core::SearchRequest;

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone)]
pub enum QueryParam {
    /// String parameter.
    Text(String),
    /// Boolean parameter.
    Bool(bool),
    /// Timestamp parameter.
    Timestamp(DateTime<Utc>),
    /// Array of strings (for slug ANY() matching).
    TextArray(Vec<String>),
}

/// Generates the WHERE clause for a filter-search request.
///
/// The caller supplies `param_offset`, the number of parameters already in
/// the query; placeholders continue from there.
pub struct EventFilterBuilder<'a> {
    request: &'a SearchRequest,
    param_offset: usize,
}

impl<'a> EventFilterBuilder<'a> {
    pub fn new(request: &'a SearchRequest, param_offset: usize) -> Self {
        Self {
            request,
            param_offset,
        }
    }

    /// Build the WHERE clause fragment and its parameters.
    ///
    /// The fragment always contains at least the active-status predicate,
    /// so it can be appended after `WHERE` unconditionally.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let mut clauses = vec!["e.status = 'active'".to_string()];
        let mut params: Vec<QueryParam> = Vec::new();
        let mut idx = self.param_offset;
        let req = self.request;

        if let Some(q) = req.q.as_deref().filter(|q| !q.trim().is_empty()) {
            idx += 1;
            clauses.push(format!(
                "to_tsvector('simple', e.title || ' ' || e.raw_text) @@ plainto_tsquery('simple', ${})",
                idx
            ));
            params.push(QueryParam::Text(q.trim().to_string()));
        }

        if let Some(city) = &req.city {
            idx += 1;
            clauses.push(format!("e.city = ${}", idx));
            params.push(QueryParam::Text(city.clone()));
        }
        if let Some(country) = &req.country {
            idx += 1;
            clauses.push(format!("e.country = ${}", idx));
            params.push(QueryParam::Text(country.clone()));
        }
        if let Some(language) = &req.language {
            idx += 1;
            clauses.push(format!("e.language = ${}", idx));
            params.push(QueryParam::Text(language.clone()));
        }
        if let Some(is_remote) = req.is_remote {
            idx += 1;
            clauses.push(format!("e.is_remote = ${}", idx));
            params.push(QueryParam::Bool(is_remote));
        }

        if let Some(ts) = req.posted_from {
            idx += 1;
            clauses.push(format!("e.posted_at >= ${}", idx));
            params.push(QueryParam::Timestamp(ts));
        }
        if let Some(ts) = req.posted_to {
            idx += 1;
            clauses.push(format!("e.posted_at <= ${}", idx));
            params.push(QueryParam::Timestamp(ts));
        }
        if let Some(ts) = req.deadline_before {
            idx += 1;
            clauses.push(format!("e.deadline_at <= ${}", idx));
            params.push(QueryParam::Timestamp(ts));
        }
        if let Some(ts) = req.deadline_after {
            idx += 1;
            clauses.push(format!("e.deadline_at >= ${}", idx));
            params.push(QueryParam::Timestamp(ts));
        }

        // Occurrence window: both bounds mean interval overlap, a single
        // bound means the event has not ended / has not started yet.
        match (req.occurs_from, req.occurs_to) {
            (Some(from), Some(to)) => {
                clauses.push(format!(
                    "(e.occurs_from <= ${} AND e.occurs_to >= ${})",
                    idx + 1,
                    idx + 2
                ));
                params.push(QueryParam::Timestamp(to));
                params.push(QueryParam::Timestamp(from));
                idx += 2;
            }
            (Some(from), None) => {
                idx += 1;
                clauses.push(format!("e.occurs_to >= ${}", idx));
                params.push(QueryParam::Timestamp(from));
            }
            (None, Some(to)) => {
                idx += 1;
                clauses.push(format!("e.occurs_from <= ${}", idx));
                params.push(QueryParam::Timestamp(to));
            }
            (None, None) => {}
        }

        if !req.category.is_empty() {
            idx += 1;
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM event_categories ec \
                 JOIN categories c ON c.id = ec.category_id \
                 WHERE ec.event_id = e.id AND c.slug = ANY(${}))",
                idx
            ));
            params.push(QueryParam::TextArray(req.category.clone()));
        }

        (clauses.join(" AND "), params)
    }
}

/// Build the ORDER BY clause from validated sort parameters.
///
/// Callers must validate the request first; anything unrecognized falls
/// back to the default ordering rather than reaching the SQL string.
pub fn build_order_clause(sort_by: &str, order: &str) -> String {
    let column = match sort_by {
        "deadline_at" => "e.deadline_at",
        "occurs_from" => "e.occurs_from",
        _ => "e.posted_at",
    };
    let direction = match order {
        "asc" => "ASC",
        _ => "DESC",
    };
    format!("ORDER BY {} {} NULLS LAST, e.id", column, direction)
}
