use lambda_http::http::response::Builder;

pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Origins permitted to call the endpoint, from a comma-separated list where `*` allows any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    pub fn parse(raw: Option<&str>) -> Self {
        let origins: Vec<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();
        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        }
    }

    /// The `Access-Control-Allow-Origin` value to send back for a request from `origin`.
    ///
    /// Allowed origins are echoed. Anything else gets the first configured origin, which the
    /// browser will then refuse to match.
    pub fn resolve(&self, origin: Option<&str>) -> String {
        match self {
            AllowedOrigins::Any => origin.unwrap_or("*").into(),
            AllowedOrigins::List(origins) => match origin {
                Some(origin) if origins.iter().any(|allowed| allowed == origin) => origin.into(),
                _ => origins.first().cloned().unwrap_or_else(|| "*".into()),
            },
        }
    }
}

/// The CORS headers attached to every response of the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsHeaders {
    pub allow_origin: String,
}

impl CorsHeaders {
    pub fn for_origin(allowed_origins: &AllowedOrigins, origin: Option<&str>) -> Self {
        Self {
            allow_origin: allowed_origins.resolve(origin),
        }
    }

    pub fn apply(&self, builder: Builder) -> Builder {
        builder
            .header("Access-Control-Allow-Origin", self.allow_origin.as_str())
            .header("Access-Control-Allow-Methods", ALLOW_METHODS)
            .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
    }
}
