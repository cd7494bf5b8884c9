//! Row filters for queries

use serde_json::Value;

/// Operator for filter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equal to
    Eq(String, String),

    /// Not equal to
    Neq(String, String),

    /// In a list of values
    In(String, Vec<String>),

    /// Like (case insensitive), `%` is the wildcard and `\` escapes
    ILike(String, String),

    /// `IS NULL`, `IS TRUE`, `IS FALSE`
    Is(String, IsValue),

    /// Any of the nested filters
    Or(Vec<Filter>),
}

/// Right-hand side of an `is` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsValue {
    Null,
    True,
    False,
}

impl IsValue {
    fn as_str(&self) -> &'static str {
        match self {
            IsValue::Null => "null",
            IsValue::True => "true",
            IsValue::False => "false",
        }
    }
}

impl Filter {
    /// Column the filter applies to, `None` for `or` groups
    pub fn column(&self) -> Option<&str> {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::In(c, _)
            | Filter::ILike(c, _)
            | Filter::Is(c, _) => Some(c),
            Filter::Or(_) => None,
        }
    }

    /// Operator and operand as PostgREST expects them after `column=`
    pub fn operand(&self) -> String {
        match self {
            Filter::Eq(_, v) => format!("eq.{}", v),
            Filter::Neq(_, v) => format!("neq.{}", v),
            Filter::In(_, values) => format!("in.({})", values.join(",")),
            Filter::ILike(_, pattern) => format!("ilike.{}", pattern.replace('%', "*")),
            Filter::Is(_, v) => format!("is.{}", v.as_str()),
            Filter::Or(filters) => format!(
                "({})",
                filters
                    .iter()
                    .map(Filter::inline)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }

    /// The `(key, value)` query parameter for this filter
    pub fn to_param(&self) -> (String, String) {
        match self.column() {
            Some(column) => (column.to_string(), self.operand()),
            None => ("or".to_string(), self.operand()),
        }
    }

    /// `column.op.value` form used inside logical groups
    fn inline(&self) -> String {
        match self {
            Filter::Or(_) => format!("or{}", self.operand()),
            other => format!("{}.{}", other.column().unwrap_or_default(), other.operand()),
        }
    }

    /// Evaluates the filter against a JSON row
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Eq(c, v) => cell(row, c).map_or(false, |cell| cell == *v),
            Filter::Neq(c, v) => cell(row, c).map_or(false, |cell| cell != *v),
            Filter::In(c, values) => {
                cell(row, c).map_or(false, |cell| values.iter().any(|v| *v == cell))
            }
            Filter::ILike(c, pattern) => cell(row, c).map_or(false, |cell| {
                like(&cell.to_lowercase(), &pattern.to_lowercase())
            }),
            Filter::Is(c, v) => {
                let value = row.get(c).unwrap_or(&Value::Null);
                match v {
                    IsValue::Null => value.is_null(),
                    IsValue::True => value.as_bool() == Some(true),
                    IsValue::False => value.as_bool() == Some(false),
                }
            }
            Filter::Or(filters) => filters.iter().any(|f| f.matches(row)),
        }
    }
}

/// Text form of a cell, as PostgREST compares it
fn cell(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// SQL `LIKE` with `%` (any run) and `_` (one char); `\` makes the next
/// char literal
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        let width = match pattern.get(p) {
            Some(&'%') => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some(&'\\') => pattern.get(p + 1).filter(|&&c| c == text[t]).map(|_| 2),
            Some(&'_') => Some(1),
            Some(&c) if c == text[t] => Some(1),
            _ => None,
        };
        match (width, backtrack) {
            (Some(width), _) => {
                t += 1;
                p += width;
            }
            (None, Some((bp, bt))) => {
                p = bp + 1;
                t = bt + 1;
                backtrack = Some((bp, bt + 1));
            }
            (None, None) => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}

/// Escapes `\`, `%` and `_` so `term` matches itself literally in a like pattern
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_postgrest_params() {
        assert_eq!(
            Filter::Eq("status".into(), "available".into()).to_param(),
            ("status".to_string(), "eq.available".to_string())
        );
        assert_eq!(
            Filter::In("status".into(), vec!["審核中".into(), "已通過".into()]).to_param(),
            ("status".to_string(), "in.(審核中,已通過)".to_string())
        );
        let or = Filter::Or(vec![
            Filter::ILike("name".into(), "%mo%".into()),
            Filter::ILike("breed".into(), "%mo%".into()),
        ]);
        assert_eq!(
            or.to_param(),
            ("or".to_string(), "(name.ilike.*mo*,breed.ilike.*mo*)".to_string())
        );
    }

    #[test]
    fn evaluates_against_rows() {
        let row = json!({"name": "Momo", "breed": "柴犬", "is_new": true, "notes": null});
        assert!(Filter::Eq("is_new".into(), "true".into()).matches(&row));
        assert!(Filter::ILike("name".into(), "%MO%".into()).matches(&row));
        assert!(!Filter::ILike("name".into(), "%x%".into()).matches(&row));
        assert!(Filter::Is("notes".into(), IsValue::Null).matches(&row));
        assert!(Filter::Neq("breed".into(), "貴賓".into()).matches(&row));
        assert!(!Filter::Neq("missing".into(), "a".into()).matches(&row));
    }

    #[test]
    fn escaped_wildcards_match_literally() {
        assert_eq!(escape_like(r"50%_off\"), r"50\%\_off\\");
        assert!(like("a_c", r"a\_c"));
        assert!(!like("abc", r"a\_c"));
        assert!(like("save 50% now", r"%50\%%"));
        assert!(!like("save 50 now", r"%50\%%"));
        assert!(like(r"c:\pets", &format!("%{}%", escape_like(r":\"))));
        let row = json!({ "name": "Momo" });
        assert!(!Filter::ILike("name".into(), format!("%{}%", escape_like("_"))).matches(&row));
    }

    #[test]
    fn like_wildcards() {
        assert!(like("golden retriever", "%retr%"));
        assert!(like("abc", "a_c"));
        assert!(like("abc", "%"));
        assert!(!like("abc", "b%"));
        assert!(like("aab", "%ab"));
    }
}
