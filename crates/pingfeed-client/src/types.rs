//! Types for the backend client API

use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the hosted backend project
    pub base_url: String,
    /// Public (anon) API key, sent with every request
    pub anon_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Account returned by the auth API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Account identifier (profile rows share it)
    pub id: String,
    /// Account email, if the provider exposes one
    #[serde(default)]
    pub email: Option<String>,
}

/// Exact-match filter on a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Query parameter form: `column=eq.value`
    pub fn to_param(&self) -> String {
        format!(
            "{}=eq.{}",
            urlencoding::encode(&self.column),
            urlencoding::encode(&self.value)
        )
    }
}

/// Result ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Select query against a table
///
/// ```rust
/// use pingfeed_client::Query;
///
/// let query = Query::new()
///     .select("pings")
///     .eq("title", "Turnen")
///     .order("created_at", false);
/// assert_eq!(query.to_query_string(), "select=pings&title=eq.Turnen&order=created_at.desc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    columns: String,
    filters: Vec<Filter>,
    order: Option<Order>,
    limit: Option<u32>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column projection (comma separated, `*` for all)
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Encode as a URL query string (without the leading `?`)
    pub fn to_query_string(&self) -> String {
        let mut params = vec![format!("select={}", urlencoding::encode(&self.columns))];
        params.extend(self.filters.iter().map(Filter::to_param));
        if let Some(ref order) = self.order {
            params.push(format!(
                "order={}.{}",
                urlencoding::encode(&order.column),
                if order.ascending { "asc" } else { "desc" }
            ));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={}", limit));
        }
        params.join("&")
    }
}

/// Options for object uploads
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// MIME type of the object
    pub content_type: String,
    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

impl UploadOptions {
    /// Overwriting upload of `content_type`
    pub fn upsert(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            upsert: true,
        }
    }

    pub fn jpeg() -> Self {
        Self::upsert("image/jpeg")
    }
}

/// Response from the object upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Storage key of the object (`bucket/path`)
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
}
