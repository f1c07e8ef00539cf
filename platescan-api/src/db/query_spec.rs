//! Constrained query descriptions for the vehicle registry
//!
//! The language-model planner emits untrusted JSON describing a single-table
//! filtered read. Everything here runs before any datastore call: the table
//! must be on the allow-list, operators outside the fixed set are silently
//! dropped, null-valued filters are dropped, and the row limit is clamped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tables the planner is allowed to read
pub const ALLOWED_TABLES: [&str; 2] = ["license_plates", "detection_logs"];

/// Default row limit when the planner gives none
pub const DEFAULT_LIMIT: i64 = 10;

/// Hard cap on rows per query
pub const MAX_LIMIT: i64 = 100;

/// Query spec validation errors
#[derive(Debug, Error)]
pub enum QuerySpecError {
    #[error("Table not allowed: {0}")]
    TableNotAllowed(String),

    #[error("Malformed query spec: {0}")]
    Malformed(String),
}

/// Raw, untrusted query description as emitted by the planner
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawQuerySpec {
    pub table: String,
    #[serde(default)]
    pub select: Option<Value>,
    #[serde(default)]
    pub filters: Vec<RawFilter>,
    #[serde(default)]
    pub limit: Option<Value>,
}

/// Raw filter clause; the planner uses short keys but long forms are accepted
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawFilter {
    #[serde(alias = "column")]
    pub col: String,
    #[serde(alias = "operator")]
    pub op: String,
    #[serde(default, alias = "value")]
    pub val: Option<Value>,
}

/// Comparison operators accepted in filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    Ilike,
}

impl FilterOp {
    /// Parse an operator name; anything outside the fixed set is `None`.
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim().to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "gte" => Some(Self::Gte),
            "lte" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "ilike" => Some(Self::Ilike),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
        }
    }

    /// Pattern-matching operators take `*` wildcards in the wire format.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Like | Self::Ilike)
    }
}

/// Validated filter clause
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Validated column selection
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    Columns(Vec<String>),
}

impl Selection {
    /// Wire form of the selection (`*` or comma-joined columns).
    pub fn to_wire(&self) -> String {
        match self {
            Selection::All => "*".to_string(),
            Selection::Columns(cols) => cols.join(","),
        }
    }
}

/// Validated, bounded single-table read
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub table: String,
    pub select: Selection,
    pub filters: Vec<Filter>,
    pub limit: i64,
}

impl QuerySpec {
    /// Lookup-by-plate convenience used by the detection pipeline.
    pub fn plate_lookup(plate_number: &str) -> Self {
        Self {
            table: "license_plates".to_string(),
            select: Selection::All,
            filters: vec![Filter {
                column: "plate_number".to_string(),
                op: FilterOp::Eq,
                value: Value::String(plate_number.to_string()),
            }],
            limit: 1,
        }
    }
}

/// Validate an untrusted query description.
///
/// Fails closed on the table; fails safe (by omission) on filters: a clause
/// with an unrecognized operator or a null value is excluded, never an error.
pub fn validate(raw: RawQuerySpec) -> Result<QuerySpec, QuerySpecError> {
    let table = raw.table.trim().to_string();
    if !ALLOWED_TABLES.contains(&table.as_str()) {
        return Err(QuerySpecError::TableNotAllowed(table));
    }

    let select = parse_selection(raw.select.as_ref());

    let mut filters = Vec::new();
    for clause in raw.filters {
        let Some(op) = FilterOp::parse(&clause.op) else {
            tracing::debug!(op = %clause.op, column = %clause.col, "Dropping filter with unknown operator");
            continue;
        };
        let value = match clause.val {
            Some(Value::Null) | None => {
                tracing::debug!(column = %clause.col, "Dropping filter with null value");
                continue;
            }
            Some(v) => v,
        };
        filters.push(Filter {
            column: clause.col.trim().to_string(),
            op,
            value,
        });
    }

    let limit = coerce_limit(raw.limit.as_ref());

    Ok(QuerySpec {
        table,
        select,
        filters,
        limit,
    })
}

fn parse_selection(select: Option<&Value>) -> Selection {
    match select {
        None | Some(Value::Null) => Selection::All,
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s == "*" {
                Selection::All
            } else {
                Selection::Columns(s.split(',').map(|c| c.trim().to_string()).collect())
            }
        }
        Some(Value::Array(items)) => {
            let cols: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if cols.is_empty() {
                Selection::All
            } else {
                Selection::Columns(cols)
            }
        }
        Some(_) => Selection::All,
    }
}

fn coerce_limit(limit: Option<&Value>) -> i64 {
    let parsed = match limit {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n >= 1 => n.min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> RawQuerySpec {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn rejects_unknown_table() {
        let spec = raw(json!({"table": "pg_catalog"}));
        assert!(matches!(
            validate(spec),
            Err(QuerySpecError::TableNotAllowed(_))
        ));
    }

    #[test]
    fn accepts_both_allowed_tables() {
        for table in ALLOWED_TABLES {
            let spec = validate(raw(json!({"table": table}))).unwrap();
            assert_eq!(spec.table, table);
            assert_eq!(spec.limit, DEFAULT_LIMIT);
            assert_eq!(spec.select, Selection::All);
        }
    }

    #[test]
    fn drops_unknown_operator_without_error() {
        let spec = validate(raw(json!({
            "table": "license_plates",
            "filters": [
                {"col": "vehicle_make", "op": "ilike", "val": "Ford"},
                {"col": "plate_number", "op": "regex", "val": ".*"}
            ]
        })))
        .unwrap();
        assert_eq!(spec.filters.len(), 1);
        assert_eq!(spec.filters[0].op, FilterOp::Ilike);
    }

    #[test]
    fn drops_null_valued_filter() {
        let spec = validate(raw(json!({
            "table": "detection_logs",
            "filters": [
                {"col": "plate_number", "op": "eq", "val": null},
                {"col": "plate_number", "op": "eq"}
            ]
        })))
        .unwrap();
        assert!(spec.filters.is_empty());
    }

    #[test]
    fn accepts_long_form_filter_keys() {
        let spec = validate(raw(json!({
            "table": "license_plates",
            "filters": [{"column": "driver_name", "operator": "eq", "value": "Sami"}]
        })))
        .unwrap();
        assert_eq!(spec.filters[0].column, "driver_name");
    }

    #[test]
    fn limit_defaults_and_clamps() {
        let table = json!("license_plates");
        let no_limit = validate(raw(json!({"table": table}))).unwrap();
        assert_eq!(no_limit.limit, 10);

        let big = validate(raw(json!({"table": table, "limit": 5000}))).unwrap();
        assert_eq!(big.limit, 100);

        let string = validate(raw(json!({"table": table, "limit": "25"}))).unwrap();
        assert_eq!(string.limit, 25);

        let junk = validate(raw(json!({"table": table, "limit": "soon"}))).unwrap();
        assert_eq!(junk.limit, 10);

        let negative = validate(raw(json!({"table": table, "limit": -3}))).unwrap();
        assert_eq!(negative.limit, 10);
    }

    #[test]
    fn select_list_and_wildcard() {
        let table = json!("license_plates");
        let star = validate(raw(json!({"table": table, "select": "*"}))).unwrap();
        assert_eq!(star.select.to_wire(), "*");

        let list = validate(raw(json!({"table": table, "select": ["plate_number", "driver_name"]}))).unwrap();
        assert_eq!(list.select.to_wire(), "plate_number,driver_name");

        let csv = validate(raw(json!({"table": table, "select": "plate_number, driver_name"}))).unwrap();
        assert_eq!(csv.select.to_wire(), "plate_number,driver_name");
    }
}
