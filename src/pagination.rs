use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ApiError;

/// Page
///
/// The page-number pagination envelope returned by every list endpoint.
/// `next` and `previous` are relative references (`?page=K`) to be resolved
/// against the requested path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// PageRequest
///
/// A resolved `?page=N` against the configured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    /// Page 0 does not exist; an absent page means the first one.
    pub fn new(page: Option<u32>, size: u32) -> Result<Self, ApiError> {
        let number = page.unwrap_or(1);
        if number == 0 {
            return Err(ApiError::NotFound("Invalid page.".to_string()));
        }
        Ok(Self {
            number,
            size: size.max(1),
        })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }

    /// Wraps one page of results. The first page always exists, even when
    /// empty; any later page past the end of the data is a 404.
    pub fn into_page<T>(self, results: Vec<T>, count: i64) -> Result<Page<T>, ApiError> {
        if self.number > 1 && self.offset() >= count {
            return Err(ApiError::NotFound("Invalid page.".to_string()));
        }

        let next = (self.offset() + self.limit() < count)
            .then(|| format!("?page={}", self.number + 1));
        let previous = (self.number > 1).then(|| format!("?page={}", self.number - 1));

        Ok(Page {
            count,
            next,
            previous,
            results,
        })
    }
}

