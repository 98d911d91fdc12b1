//! Filter-and-select queries
//!
//! Describes a read against one table: the projected columns, equality and
//! membership filters, ordering, and a row limit. The HTTP client renders it
//! as REST query parameters; the in-memory backend evaluates it directly.

/// A single row filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq(String, String),
    /// `column IN (values...)`
    In(String, Vec<String>),
}

/// Sort order on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    /// Select all columns
    pub fn new() -> Self {
        Self {
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_in<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Projected column names, or `None` when every column is selected
    pub fn projected_columns(&self) -> Option<Vec<&str>> {
        if self.columns.trim() == "*" {
            return None;
        }
        Some(
            self.columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    /// Render as REST query parameters (`select=..`, `col=eq.v`, `col=in.(a,b)`)
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.replace(' ', ""))];

        for filter in &self.filters {
            match filter {
                Filter::Eq(column, value) => {
                    params.push((column.clone(), format!("eq.{}", value)));
                }
                Filter::In(column, values) => {
                    let quoted: Vec<String> = values.iter().map(|v| quote_value(v)).collect();
                    params.push((column.clone(), format!("in.({})", quoted.join(","))));
                }
            }
        }

        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}

/// Values containing list delimiters must be double-quoted inside `in.(...)`
fn quote_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_dashboard_memories_query() {
        let query = Query::new()
            .select("id, title, created_at, photo_url, emotion_tags")
            .is_in("family_tree_id", ["t1", "t2"])
            .order("created_at", false)
            .limit(5);

        assert_eq!(
            query.to_params(),
            vec![
                (
                    "select".to_string(),
                    "id,title,created_at,photo_url,emotion_tags".to_string()
                ),
                ("family_tree_id".to_string(), "in.(t1,t2)".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_renders_eq_filter_and_default_select() {
        let query = Query::new().eq("created_by", "u1").order("name", true);

        assert_eq!(
            query.to_params(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("created_by".to_string(), "eq.u1".to_string()),
                ("order".to_string(), "name.asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_quotes_values_with_delimiters() {
        let query = Query::new().is_in("name", ["a,b", "c"]);
        assert_eq!(query.to_params()[1].1, "in.(\"a,b\",c)");
    }

    #[test]
    fn test_projected_columns() {
        assert_eq!(Query::new().projected_columns(), None);
        assert_eq!(
            Query::new().select("id, name").projected_columns(),
            Some(vec!["id", "name"])
        );
    }
}
