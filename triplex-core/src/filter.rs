//! Metadata filter expression tree (spec §4.2, §9 redesign note).
//!
//! Replaces a runtime-string operator-keyed DSL (`{"$gt": 4}`-style) with a
//! tagged expression tree, plus a small parser that accepts both canonical
//! operator names and the legacy shorthand aliases the source system used.

use crate::scalar::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FilterExpr {
    Equals { field: String, value: Scalar },
    GreaterThan { field: String, value: Scalar },
    GreaterOrEqual { field: String, value: Scalar },
    LessThan { field: String, value: Scalar },
    LessOrEqual { field: String, value: Scalar },
    Between { field: String, lo: Scalar, hi: Scalar },
    OneOf { field: String, values: Vec<Scalar> },
    Contains { field: String, value: Scalar },
    Exists { field: String, expected: bool },
    Not { expr: Box<FilterExpr> },
    AllOf { exprs: Vec<FilterExpr> },
    AnyOf { exprs: Vec<FilterExpr> },
}

impl FilterExpr {
    pub fn equals(field: impl Into<String>, value: Scalar) -> Self {
        FilterExpr::Equals {
            field: field.into(),
            value,
        }
    }

    pub fn all_of(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::AllOf { exprs }
    }

    pub fn any_of(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::AnyOf { exprs }
    }

    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not {
            expr: Box::new(expr),
        }
    }

    /// Every field name this expression touches, for selectivity lookups.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            FilterExpr::Equals { field, .. }
            | FilterExpr::GreaterThan { field, .. }
            | FilterExpr::GreaterOrEqual { field, .. }
            | FilterExpr::LessThan { field, .. }
            | FilterExpr::LessOrEqual { field, .. }
            | FilterExpr::Between { field, .. }
            | FilterExpr::OneOf { field, .. }
            | FilterExpr::Contains { field, .. }
            | FilterExpr::Exists { field, .. } => vec![field.as_str()],
            FilterExpr::Not { expr } => expr.fields(),
            FilterExpr::AllOf { exprs } | FilterExpr::AnyOf { exprs } => {
                exprs.iter().flat_map(|e| e.fields()).collect()
            }
        }
    }
}

/// Canonical operator name for a shorthand alias accepted at the parse
/// layer (spec §4.2: "legacy shorthand accepted at the parse layer").
/// Unknown aliases pass through unchanged so the caller can surface a
/// precise `InvalidArgument` error at the construction site.
pub fn canonical_operator(alias: &str) -> &str {
    match alias {
        "is" => "equals",
        "$eq" | "eq" => "equals",
        "$gt" | "gt" => "greaterThan",
        "$gte" | "gte" => "greaterOrEqual",
        "$lt" | "lt" => "lessThan",
        "$lte" | "lte" => "lessOrEqual",
        "$in" | "in" => "oneOf",
        "$between" => "between",
        "$contains" => "contains",
        "$exists" => "exists",
        "$not" => "not",
        "$and" | "and" => "allOf",
        "$or" | "or" => "anyOf",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_operator_maps_shorthand() {
        assert_eq!(canonical_operator("$gt"), "greaterThan");
        assert_eq!(canonical_operator("is"), "equals");
        assert_eq!(canonical_operator("$and"), "allOf");
    }

    #[test]
    fn canonical_operator_passes_through_unknown() {
        assert_eq!(canonical_operator("bogus"), "bogus");
    }

    #[test]
    fn fields_collects_nested_composition() {
        let expr = FilterExpr::all_of(vec![
            FilterExpr::equals("category", Scalar::String("tech".into())),
            FilterExpr::not(FilterExpr::equals(
                "archived",
                Scalar::Bool(true),
            )),
        ]);
        let mut fields = expr.fields();
        fields.sort();
        assert_eq!(fields, vec!["archived", "category"]);
    }
}
