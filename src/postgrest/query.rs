//! Table-scoped query description

use serde_json::Value;
use std::cmp::Ordering;

use crate::postgrest::filter::{Filter, IsValue};
use crate::postgrest::types::SortOrder;

/// A select/update/delete target: table, projection, filters, ordering
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    columns: String,
    filters: Vec<Filter>,
    order: Option<(String, SortOrder)>,
    limit: Option<usize>,
}

impl Query {
    /// Start a query on a table, selecting every column
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Select specific columns
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    /// Add a raw filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Filter rows where column equals a value
    pub fn eq<T: ToString>(self, column: &str, value: T) -> Self {
        self.filter(Filter::Eq(column.to_string(), value.to_string()))
    }

    /// Filter rows where column does not equal a value
    pub fn neq<T: ToString>(self, column: &str, value: T) -> Self {
        self.filter(Filter::Neq(column.to_string(), value.to_string()))
    }

    /// Filter rows where column is in a list of values
    pub fn in_list<T: ToString>(self, column: &str, values: &[T]) -> Self {
        let values = values.iter().map(ToString::to_string).collect();
        self.filter(Filter::In(column.to_string(), values))
    }

    /// Filter rows where column matches a pattern (case insensitive)
    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.filter(Filter::ILike(column.to_string(), pattern.to_string()))
    }

    /// Filter rows where column is null/true/false
    pub fn is(self, column: &str, value: IsValue) -> Self {
        self.filter(Filter::Is(column.to_string(), value))
    }

    /// Keep rows matching any of the given filters
    pub fn or(self, filters: Vec<Filter>) -> Self {
        self.filter(Filter::Or(filters))
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &str {
        &self.columns
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Filter parameters only, for update and delete
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.iter().map(Filter::to_param).collect()
    }

    /// Every query parameter for a select
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filter_params());
        if let Some((column, order)) = &self.order {
            params.push(("order".to_string(), format!("{}.{}", column, order.as_str())));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Whether a row passes every filter
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Applies ordering and limit to rows that already passed the filters.
    /// The sort is stable, so ties keep their insertion order.
    pub fn arrange(&self, mut rows: Vec<Value>) -> Vec<Value> {
        if let Some((column, order)) = &self.order {
            rows.sort_by(|a, b| {
                let ord = compare_cells(a.get(column), b.get(column));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last, as in Postgres
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
