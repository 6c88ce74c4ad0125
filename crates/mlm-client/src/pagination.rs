//! Page-number pagination.

use serde_json::Value;
use tracing::debug;

use crate::client::MlmClient;
use crate::error::{Error, ErrorKind, Result};
use crate::request::ApiCall;
use crate::response::{NormalizedResponse, Shape};

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Query parameters used to page through a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Name of the page number parameter. Pages start at 1.
    pub page_param: String,
    /// Name of the page size parameter.
    pub page_size_param: String,
    /// Items requested per page.
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            page_size_param: "page_size".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Default parameter names with the given page size.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }
}

impl MlmClient {
    /// Fetch every page of `path` with the default page size.
    pub fn collect_all(&mut self, path: &str) -> Result<Vec<Value>> {
        self.paginate(path, &Pagination::default())
    }

    /// Fetch every page of `path`, `page_size` items at a time.
    pub fn get_paginated(&mut self, path: &str, page_size: usize) -> Result<Vec<Value>> {
        self.paginate(path, &Pagination::with_page_size(page_size))
    }

    /// Fetch pages until one comes back shorter than the page size.
    pub fn paginate(&mut self, path: &str, pagination: &Pagination) -> Result<Vec<Value>> {
        if pagination.page_size == 0 {
            return Err(Error::new(ErrorKind::Configuration(
                "page size must be greater than zero".to_string(),
            ))
            .with_parameter(pagination.page_size_param.as_str()));
        }

        let mut all_items = Vec::new();
        let mut page = 1usize;

        loop {
            let call = ApiCall::get(path)
                .param(pagination.page_param.as_str(), page)
                .param(pagination.page_size_param.as_str(), pagination.page_size);
            let items = page_items(self.send(call)?)
                .map_err(|e| e.in_operation("GET", path))?;

            let count = items.len();
            all_items.extend(items);
            debug!(page, count, total = all_items.len(), "Fetched page");

            if count < pagination.page_size {
                break;
            }
            page += 1;
        }

        Ok(all_items)
    }
}

/// Items of one page: a bare list, or the `items` or `results` list of a record.
fn page_items(response: NormalizedResponse) -> Result<Vec<Value>> {
    match response {
        NormalizedResponse::Records(items) => Ok(items),
        NormalizedResponse::Empty => Ok(Vec::new()),
        NormalizedResponse::Record(mut map) => {
            for key in ["items", "results"] {
                match map.remove(key) {
                    Some(Value::Array(items)) => return Ok(items),
                    Some(Value::Null) | None => {}
                    Some(_) => {
                        return Err(Error::new(ErrorKind::TypeMismatch {
                            expected: Shape::List.to_string(),
                            actual: format!("record with non-list '{}'", key),
                        })
                        .with_parameter(key))
                    }
                }
            }
            if map.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![Value::Object(map)])
            }
        }
        NormalizedResponse::Scalar(value) => Err(Error::new(ErrorKind::TypeMismatch {
            expected: Shape::List.to_string(),
            actual: match value {
                Value::String(_) => "string",
                Value::Number(_) => "number",
                Value::Bool(_) => "boolean",
                _ => "scalar",
            }
            .to_string(),
        })),
    }
}
