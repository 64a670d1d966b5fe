//! Structural query summary used for cost heuristics, never enforcement.

use std::ops::ControlFlow;

use serde::Serialize;
use sqlparser::ast::{
    visit_expressions, visit_relations, Expr, GroupByExpr, Query, SetExpr, Statement, TableFactor,
};

/// Aggregate functions recognized when classifying a query as aggregating.
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "sum", "count", "avg", "min", "max", "median", "mode", "stddev", "stddev_pop", "stddev_samp",
    "variance", "var_pop", "var_samp", "string_agg", "array_agg", "list", "first", "last",
    "bool_and", "bool_or",
];

/// A coarse structural summary of a validated query. Not a full AST:
/// table/column extraction is best-effort and the complexity score is a
/// heuristic, monotonic in join count + aggregation count + nesting depth.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedQueryShape {
    pub statement_kind: String,
    pub referenced_tables: Vec<String>,
    pub referenced_columns: Vec<String>,
    pub has_joins: bool,
    pub has_aggregations: bool,
    pub complexity_score: u32,
}

#[derive(Default)]
struct ShapeStats {
    join_count: u32,
    aggregation_count: u32,
    has_group_by: bool,
    max_depth: u32,
    subquery_exprs: u32,
}

/// Summarize a query statement. `statement` must be the owning
/// `Statement::Query` wrapper so expression visitors see the whole tree.
pub fn extract(statement: &Statement, query: &Query) -> ParsedQueryShape {
    let mut stats = ShapeStats::default();
    walk_query(query, 0, &mut stats);

    let mut tables = Vec::new();
    let _ = visit_relations(statement, |relation| {
        let name = relation.to_string();
        if !tables.contains(&name) {
            tables.push(name);
        }
        ControlFlow::<()>::Continue(())
    });

    let mut columns = Vec::new();
    let _ = visit_expressions(statement, |expr| {
        match expr {
            Expr::Identifier(ident) => push_unique(&mut columns, ident.value.clone()),
            Expr::CompoundIdentifier(idents) => {
                if let Some(last) = idents.last() {
                    push_unique(&mut columns, last.value.clone());
                }
            }
            Expr::Function(func) => {
                let name = func.name.to_string().to_lowercase();
                if AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
                    stats.aggregation_count += 1;
                }
            }
            Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => {
                stats.subquery_exprs += 1;
            }
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });

    let has_aggregations = stats.aggregation_count > 0 || stats.has_group_by;
    let nesting = stats.max_depth + stats.subquery_exprs;
    let complexity_score = stats.join_count + stats.aggregation_count + nesting;

    ParsedQueryShape {
        statement_kind: statement_kind(query),
        referenced_tables: tables,
        referenced_columns: columns,
        has_joins: stats.join_count > 0,
        has_aggregations,
        complexity_score,
    }
}

fn statement_kind(query: &Query) -> String {
    match query.body.as_ref() {
        SetExpr::Select(_) => "select",
        SetExpr::Values(_) => "values",
        SetExpr::SetOperation { .. } => "set_operation",
        _ => "query",
    }
    .to_string()
}

fn push_unique(items: &mut Vec<String>, value: String) {
    if !items.contains(&value) {
        items.push(value);
    }
}

fn walk_query(query: &Query, depth: u32, stats: &mut ShapeStats) {
    stats.max_depth = stats.max_depth.max(depth);
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            walk_query(&cte.query, depth + 1, stats);
        }
    }
    walk_set_expr(&query.body, depth, stats);
}

fn walk_set_expr(body: &SetExpr, depth: u32, stats: &mut ShapeStats) {
    match body {
        SetExpr::Select(select) => {
            if select.from.len() > 1 {
                // Comma-separated FROM items are implicit cross joins
                stats.join_count += (select.from.len() - 1) as u32;
            }
            for item in &select.from {
                stats.join_count += item.joins.len() as u32;
                walk_table_factor(&item.relation, depth, stats);
                for join in &item.joins {
                    walk_table_factor(&join.relation, depth, stats);
                }
            }
            match &select.group_by {
                GroupByExpr::Expressions(exprs, _) => {
                    if !exprs.is_empty() {
                        stats.has_group_by = true;
                    }
                }
                GroupByExpr::All(_) => stats.has_group_by = true,
            }
        }
        SetExpr::Query(inner) => walk_query(inner, depth + 1, stats),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(left, depth, stats);
            walk_set_expr(right, depth, stats);
        }
        _ => {}
    }
}

fn walk_table_factor(factor: &TableFactor, depth: u32, stats: &mut ShapeStats) {
    match factor {
        TableFactor::Derived { subquery, .. } => walk_query(subquery, depth + 1, stats),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            stats.join_count += table_with_joins.joins.len() as u32;
            walk_table_factor(&table_with_joins.relation, depth, stats);
            for join in &table_with_joins.joins {
                walk_table_factor(&join.relation, depth, stats);
            }
        }
        _ => {}
    }
}
