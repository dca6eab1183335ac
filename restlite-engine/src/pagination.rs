//! Page window arithmetic and next/previous links

use serde::Serialize;
use url::form_urlencoded::byte_serialize;

use restlite_common::config::NextLinkPolicy;
use restlite_common::error::{Error, Result};

/// Validated `_page` / `_limit` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl PageRequest {
    /// Parse raw query values; absent values fall back to page 1 and `default_limit`
    pub fn parse(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: u64,
        max_limit: u64,
    ) -> Result<Self> {
        let page = parse_positive("_page", page)?.unwrap_or(1);
        let limit = parse_positive("_limit", limit)?.unwrap_or(default_limit);

        if limit > max_limit {
            return Err(Error::InvalidQueryParam(format!(
                "_limit must not exceed {max_limit}, got {limit}"
            )));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> u64 {
        self.limit.saturating_mul(self.page - 1)
    }
}

fn parse_positive(name: &str, raw: Option<&str>) -> Result<Option<u64>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(value) if value >= 1 => Ok(Some(value)),
        _ => Err(Error::InvalidQueryParam(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

/// Navigation links for a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Build next/previous links
///
/// `params` are the caller's listing parameters in the order they should
/// appear; `_limit` and `_page` are appended last.
pub fn page_links(
    base: &str,
    params: &[(&str, &str)],
    request: PageRequest,
    returned: usize,
    total: u64,
    policy: NextLinkPolicy,
) -> PageLinks {
    let has_next = match policy {
        NextLinkPolicy::Heuristic => returned as u64 == request.limit,
        NextLinkPolicy::Count => total > request.page.saturating_mul(request.limit),
    };

    let link = |page: u64| {
        let mut query = String::new();
        for (key, value) in params {
            query.push_str(key);
            query.push('=');
            query.extend(byte_serialize(value.as_bytes()));
            query.push('&');
        }
        format!("{base}?{query}_limit={}&_page={page}", request.limit)
    };

    PageLinks {
        next: has_next.then(|| link(request.page + 1)),
        previous: (request.page > 1).then(|| link(request.page - 1)),
    }
}
