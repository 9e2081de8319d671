//! The logical-view compiler: a declarative view definition compiles to a
//! SQL string, which the executor wraps as a subquery for view-backed
//! checks.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{Error, Result};

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap())
}

/// Validates a table or column identifier against the grammar
/// `^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$`.
fn validate_ident(name: &str) -> Result<()> {
    if ident_re().is_match(name) {
        Ok(())
    } else {
        Err(Error::Invalid(format!("invalid identifier: {name:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Like,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl Default for LogicalOp {
    fn default() -> Self {
        LogicalOp::And
    }
}

impl LogicalOp {
    fn as_sql(self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedColumn {
    pub name: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub logical_op: LogicalOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub kind: JoinKind,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub on: Option<Vec<(String, String)>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredView {
    pub base_table: String,
    #[serde(default)]
    pub columns: Vec<ProjectedColumn>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionView {
    pub union_tables: Vec<String>,
    #[serde(default)]
    pub distinct: bool,
}

/// The top-level view shape: exactly one of `sql`/`structured`/`union` is
/// populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub structured: Option<StructuredView>,
    #[serde(default)]
    pub union: Option<UnionView>,
}

impl ViewDefinition {
    /// Structural validation: exactly one top-level shape, join/filter
    /// shapes are well-formed, and every identifier position obeys the
    /// identifier grammar.
    pub fn validate(&self) -> Result<()> {
        let populated = [self.sql.is_some(), self.structured.is_some(), self.union.is_some()]
            .iter()
            .filter(|x| **x)
            .count();
        if populated != 1 {
            return Err(Error::Invalid("exactly one of {sql, base_table, union_tables} must be populated".to_owned()));
        }

        if let Some(structured) = &self.structured {
            validate_ident(&structured.base_table)?;
            for column in &structured.columns {
                if column.expression.is_none() {
                    validate_ident(&column.name)?;
                }
                if let Some(alias) = &column.alias {
                    validate_ident(alias)?;
                }
            }
            for join in &structured.joins {
                validate_ident(&join.table)?;
                if join.kind != JoinKind::Cross && join.condition.is_none() && join.on.is_none() {
                    return Err(Error::Invalid(format!(
                        "join on {:?} requires a condition unless kind is cross",
                        join.table
                    )));
                }
                if let Some(pairs) = &join.on {
                    for (left, right) in pairs {
                        validate_ident(left)?;
                        validate_ident(right)?;
                    }
                }
            }
            for filter in &structured.filters {
                validate_ident(&filter.column)?;
                match filter.operator {
                    FilterOperator::In | FilterOperator::NotIn => {
                        if filter.values.as_ref().is_none_or(|v| v.is_empty()) {
                            return Err(Error::Invalid(format!(
                                "filter on {:?} with in/not_in requires non-empty values",
                                filter.column
                            )));
                        }
                    }
                    FilterOperator::IsNull | FilterOperator::IsNotNull => {}
                    _ => {
                        if filter.value.is_none() {
                            return Err(Error::Invalid(format!("filter on {:?} requires a value", filter.column)));
                        }
                    }
                }
            }
            for column in &structured.group_by {
                validate_ident(column)?;
            }
            for column in &structured.order_by {
                validate_ident(column.split_whitespace().next().unwrap_or(column))?;
            }
        }

        if let Some(union) = &self.union {
            if union.union_tables.is_empty() {
                return Err(Error::Invalid("union_tables must be non-empty".to_owned()));
            }
            for table in &union.union_tables {
                validate_ident(table)?;
            }
        }

        Ok(())
    }

    /// Compiles this definition to a SQL string.
    pub fn to_sql(&self) -> Result<String> {
        self.validate()?;

        if let Some(sql) = &self.sql {
            return Ok(sql.clone());
        }

        if let Some(union) = &self.union {
            let op = if union.distinct { "UNION" } else { "UNION ALL" };
            let parts: Vec<String> = union.union_tables.iter().map(|t| format!("SELECT * FROM {t}")).collect();
            return Ok(parts.join(&format!(" {op} ")));
        }

        let structured = self.structured.as_ref().expect("validated: structured must be present");
        let mut sql = String::from("SELECT ");
        sql.push_str(&emit_columns(&structured.columns));
        sql.push_str(" FROM ");
        sql.push_str(&structured.base_table);

        for join in &structured.joins {
            sql.push(' ');
            sql.push_str(join.kind.as_sql());
            sql.push(' ');
            sql.push_str(&join.table);
            if join.kind != JoinKind::Cross {
                sql.push_str(" ON ");
                sql.push_str(&emit_join_condition(join));
            }
        }

        if !structured.filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&emit_filters(&structured.filters));
        }

        if !structured.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&structured.group_by.join(", "));
        }

        if !structured.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&structured.order_by.join(", "));
        }

        if let Some(limit) = structured.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        Ok(sql)
    }

    /// Wraps this view's SQL as a subquery for a view-backed check target.
    pub fn as_target(&self) -> Result<String> {
        Ok(format!("({}) _view", self.to_sql()?))
    }

    /// The validation probe run against the datasource on create/update.
    pub fn validation_probe(&self) -> Result<String> {
        Ok(format!("SELECT * FROM ({}) x LIMIT 0", self.to_sql()?))
    }
}

fn emit_columns(columns: &[ProjectedColumn]) -> String {
    if columns.is_empty() {
        return "*".to_owned();
    }
    columns
        .iter()
        .map(|c| match (&c.expression, &c.alias) {
            (Some(expr), Some(alias)) => format!("{expr} AS {alias}"),
            (Some(expr), None) => format!("{expr} AS {}", c.name),
            (None, Some(alias)) => format!("{} AS {alias}", c.name),
            (None, None) => c.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn emit_join_condition(join: &Join) -> String {
    if let Some(condition) = &join.condition {
        return condition.clone();
    }
    join.on
        .as_ref()
        .map(|pairs| {
            pairs
                .iter()
                .map(|(l, r)| format!("{l} = {r}"))
                .collect::<Vec<_>>()
                .join(" AND ")
        })
        .unwrap_or_default()
}

fn emit_filters(filters: &[Filter]) -> String {
    filters
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let clause = emit_filter(f);
            if i == 0 {
                clause
            } else {
                format!("{} {clause}", f.logical_op.as_sql())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn emit_filter(filter: &Filter) -> String {
    let quote = |v: &str| format!("'{v}'");
    match filter.operator {
        FilterOperator::Eq => format!("{} = {}", filter.column, quote(filter.value.as_deref().unwrap_or(""))),
        FilterOperator::Ne => format!("{} != {}", filter.column, quote(filter.value.as_deref().unwrap_or(""))),
        FilterOperator::Lt => format!("{} < {}", filter.column, quote(filter.value.as_deref().unwrap_or(""))),
        FilterOperator::Lte => format!("{} <= {}", filter.column, quote(filter.value.as_deref().unwrap_or(""))),
        FilterOperator::Gt => format!("{} > {}", filter.column, quote(filter.value.as_deref().unwrap_or(""))),
        FilterOperator::Gte => format!("{} >= {}", filter.column, quote(filter.value.as_deref().unwrap_or(""))),
        FilterOperator::Like => format!("{} LIKE {}", filter.column, quote(filter.value.as_deref().unwrap_or(""))),
        FilterOperator::IsNull => format!("{} IS NULL", filter.column),
        FilterOperator::IsNotNull => format!("{} IS NOT NULL", filter.column),
        FilterOperator::In => {
            let values = filter.values.as_deref().unwrap_or_default();
            format!("{} IN ({})", filter.column, values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", "))
        }
        FilterOperator::NotIn => {
            let values = filter.values.as_deref().unwrap_or_default();
            format!("{} NOT IN ({})", filter.column, values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_sql_emits_verbatim() {
        let def = ViewDefinition {
            sql: Some("SELECT id FROM orders".to_owned()),
            structured: None,
            union: None,
        };
        assert_eq!(def.to_sql().unwrap(), "SELECT id FROM orders");
    }

    #[test]
    fn rejects_multiple_top_level_shapes() {
        let def = ViewDefinition {
            sql: Some("SELECT 1".to_owned()),
            structured: Some(StructuredView {
                base_table: "orders".to_owned(),
                ..Default::default()
            }),
            union: None,
        };
        assert!(matches!(def.validate(), Err(Error::Invalid(_))));
    }

    #[test]
    fn rejects_no_top_level_shape() {
        let def = ViewDefinition {
            sql: None,
            structured: None,
            union: None,
        };
        assert!(def.validate().is_err());
    }

    #[test]
    fn structured_view_emits_select_from_where() {
        let def = ViewDefinition {
            sql: None,
            structured: Some(StructuredView {
                base_table: "orders".to_owned(),
                columns: vec![
                    ProjectedColumn {
                        name: "id".to_owned(),
                        expression: None,
                        alias: None,
                    },
                    ProjectedColumn {
                        name: "amount".to_owned(),
                        expression: None,
                        alias: None,
                    },
                ],
                filters: vec![Filter {
                    column: "amount".to_owned(),
                    operator: FilterOperator::Gt,
                    value: Some("100".to_owned()),
                    values: None,
                    logical_op: LogicalOp::And,
                }],
                ..Default::default()
            }),
            union: None,
        };
        assert_eq!(def.to_sql().unwrap(), "SELECT id, amount FROM orders WHERE amount > '100'");
    }

    #[test]
    fn structured_view_with_join_and_group_order_limit() {
        let def = ViewDefinition {
            sql: None,
            structured: Some(StructuredView {
                base_table: "orders".to_owned(),
                joins: vec![Join {
                    table: "users".to_owned(),
                    kind: JoinKind::Inner,
                    condition: None,
                    on: Some(vec![("orders.user_id".to_owned(), "users.id".to_owned())]),
                }],
                group_by: vec!["orders.user_id".to_owned()],
                order_by: vec!["orders.user_id".to_owned()],
                limit: Some(10),
                ..Default::default()
            }),
            union: None,
        };
        let sql = def.to_sql().unwrap();
        assert!(sql.contains("INNER JOIN users ON orders.user_id = users.id"));
        assert!(sql.contains("GROUP BY orders.user_id"));
        assert!(sql.contains("ORDER BY orders.user_id"));
        assert!(sql.ends_with("LIMIT 10"));
    }

    #[test]
    fn cross_join_requires_no_condition() {
        let def = ViewDefinition {
            sql: None,
            structured: Some(StructuredView {
                base_table: "a".to_owned(),
                joins: vec![Join {
                    table: "b".to_owned(),
                    kind: JoinKind::Cross,
                    condition: None,
                    on: None,
                }],
                ..Default::default()
            }),
            union: None,
        };
        assert_eq!(def.to_sql().unwrap(), "SELECT * FROM a CROSS JOIN b");
    }

    #[test]
    fn non_cross_join_without_condition_is_invalid() {
        let def = ViewDefinition {
            sql: None,
            structured: Some(StructuredView {
                base_table: "a".to_owned(),
                joins: vec![Join {
                    table: "b".to_owned(),
                    kind: JoinKind::Inner,
                    condition: None,
                    on: None,
                }],
                ..Default::default()
            }),
            union: None,
        };
        assert!(def.validate().is_err());
    }

    #[test]
    fn in_filter_requires_non_empty_values() {
        let def = ViewDefinition {
            sql: None,
            structured: Some(StructuredView {
                base_table: "a".to_owned(),
                filters: vec![Filter {
                    column: "status".to_owned(),
                    operator: FilterOperator::In,
                    value: None,
                    values: Some(vec![]),
                    logical_op: LogicalOp::And,
                }],
                ..Default::default()
            }),
            union: None,
        };
        assert!(def.validate().is_err());
    }

    #[test]
    fn union_emits_union_all_by_default() {
        let def = ViewDefinition {
            sql: None,
            structured: None,
            union: Some(UnionView {
                union_tables: vec!["t1".to_owned(), "t2".to_owned()],
                distinct: false,
            }),
        };
        assert_eq!(def.to_sql().unwrap(), "SELECT * FROM t1 UNION ALL SELECT * FROM t2");
    }

    #[test]
    fn union_distinct_emits_union() {
        let def = ViewDefinition {
            sql: None,
            structured: None,
            union: Some(UnionView {
                union_tables: vec!["t1".to_owned(), "t2".to_owned()],
                distinct: true,
            }),
        };
        assert_eq!(def.to_sql().unwrap(), "SELECT * FROM t1 UNION SELECT * FROM t2");
    }

    #[test]
    fn rejects_non_identifier_base_table() {
        let def = ViewDefinition {
            sql: None,
            structured: Some(StructuredView {
                base_table: "orders; DROP TABLE users".to_owned(),
                ..Default::default()
            }),
            union: None,
        };
        assert!(matches!(def.validate(), Err(Error::Invalid(_))));
    }

    #[test]
    fn as_target_wraps_sql_as_subquery() {
        let def = ViewDefinition {
            sql: Some("SELECT id FROM orders".to_owned()),
            structured: None,
            union: None,
        };
        assert_eq!(def.as_target().unwrap(), "(SELECT id FROM orders) _view");
    }

    #[test]
    fn validation_probe_wraps_with_limit_zero() {
        let def = ViewDefinition {
            sql: Some("SELECT id FROM orders".to_owned()),
            structured: None,
            union: None,
        };
        assert_eq!(def.validation_probe().unwrap(), "SELECT * FROM (SELECT id FROM orders) x LIMIT 0");
    }
}
