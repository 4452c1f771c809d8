//! Row query model and its PostgREST rendering.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Title,
    Uploader,
    Category,
    Tags,
    CreatedAt,
    Likes,
    Downloads,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Title => "title",
            Column::Uploader => "uploader",
            Column::Category => "category",
            Column::Tags => "tags",
            Column::CreatedAt => "created_at",
            Column::Likes => "likes",
            Column::Downloads => "downloads",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact equality.
    Eq(Column, String),
    /// Case-insensitive substring match; the value is the bare needle.
    ILike(Column, String),
    /// Array column contains every listed value.
    Contains(Column, Vec<String>),
    /// At least one of the nested filters matches.
    Or(Vec<Filter>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: Column,
    pub descending: bool,
}

impl Order {
    pub fn desc(column: Column) -> Self {
        Order { column, descending: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    #[default]
    Exact,
    Planned,
    None,
}

/// A filtered, ordered slice of the media table. Filters are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct RowQuery {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub offset: usize,
    pub limit: usize,
    pub count: CountMode,
}

impl RowQuery {
    pub fn new(offset: usize, limit: usize) -> Self {
        RowQuery {
            filters: Vec::new(),
            order: Vec::new(),
            offset,
            limit,
            count: CountMode::Exact,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    /// Query-string pairs for a PostgREST `GET /rest/v1/<table>` request.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for filter in &self.filters {
            params.push(render_top_level(filter));
        }
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    format!(
                        "{}.{}",
                        o.column.as_str(),
                        if o.descending { "desc" } else { "asc" }
                    )
                })
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }
        params.push(("offset".to_string(), self.offset.to_string()));
        params.push(("limit".to_string(), self.limit.to_string()));
        params
    }

    /// Value of the `Prefer` header requesting a row count, if any.
    pub fn prefer_header(&self) -> Option<&'static str> {
        match self.count {
            CountMode::Exact => Some("count=exact"),
            CountMode::Planned => Some("count=planned"),
            CountMode::None => None,
        }
    }
}

fn render_top_level(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(c, v) => (c.as_str().to_string(), format!("eq.{}", v)),
        Filter::ILike(c, v) => (c.as_str().to_string(), format!("ilike.*{}*", v)),
        Filter::Contains(c, vs) => (c.as_str().to_string(), format!("cs.{}", array_literal(vs))),
        Filter::Or(inner) => {
            let parts: Vec<String> = inner.iter().map(render_nested).collect();
            ("or".to_string(), format!("({})", parts.join(",")))
        }
    }
}

fn render_nested(filter: &Filter) -> String {
    match filter {
        Filter::Eq(c, v) => format!("{}.eq.{}", c.as_str(), quote(v)),
        Filter::ILike(c, v) => format!("{}.ilike.{}", c.as_str(), quote(&format!("*{}*", v))),
        Filter::Contains(c, vs) => format!("{}.cs.{}", c.as_str(), array_literal(vs)),
        Filter::Or(inner) => {
            let parts: Vec<String> = inner.iter().map(render_nested).collect();
            format!("or({})", parts.join(","))
        }
    }
}

// Values inside logical operators may contain PostgREST delimiters, so they
// are always double-quoted.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn array_literal(values: &[String]) -> String {
    let inner: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("{{{}}}", inner.join(","))
}

/// Total row count from a `Content-Range` header such as `0-11/15` or `*/0`.
/// Returns `None` when the total is unknown (`0-11/*`) or the header is malformed.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_render_search_query() {
        let query = RowQuery::new(12, 12)
            .filter(Filter::Or(vec![
                Filter::ILike(Column::Title, "red car".into()),
                Filter::ILike(Column::Uploader, "red car".into()),
                Filter::Contains(Column::Tags, vec!["red".into()]),
                Filter::Contains(Column::Tags, vec!["car".into()]),
            ]))
            .filter(Filter::Eq(Column::Category, "Art".into()))
            .order_by(Order::desc(Column::Likes))
            .order_by(Order::desc(Column::Id));

        let params = query.to_params();
        assert_eq!(param(&params, "select"), Some("*"));
        assert_eq!(
            param(&params, "or"),
            Some(r#"(title.ilike."*red car*",uploader.ilike."*red car*",tags.cs.{"red"},tags.cs.{"car"})"#)
        );
        assert_eq!(param(&params, "category"), Some("eq.Art"));
        assert_eq!(param(&params, "order"), Some("likes.desc,id.desc"));
        assert_eq!(param(&params, "offset"), Some("12"));
        assert_eq!(param(&params, "limit"), Some("12"));
    }

    #[test]
    fn test_quote_escapes_delimiters() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn test_prefer_header() {
        let mut query = RowQuery::new(0, 12);
        assert_eq!(query.prefer_header(), Some("count=exact"));
        query.count = CountMode::None;
        assert_eq!(query.prefer_header(), None);
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-11/15"), Some(15));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-11/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }
}
