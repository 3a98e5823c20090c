//! Offset/limit pagination

use crate::error::{CloudError, Result};
use std::future::Future;

/// Default page size for list calls
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// One page of a list response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u64,
    pub limit: u64,
    /// Number of records the provider returned for this page. Usually
    /// `items.len()`, but an adapter that drops records while converting keeps
    /// the raw count here so pagination still advances correctly.
    pub returned_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, offset: u64, limit: u64) -> Self {
        let returned_count = items.len() as u64;
        Self {
            items,
            offset,
            limit,
            returned_count,
        }
    }

    pub fn with_returned_count(mut self, returned_count: u64) -> Self {
        self.returned_count = returned_count;
        self
    }

    /// A short page is the provider's only "no more data" signal
    pub fn is_last(&self) -> bool {
        self.returned_count < self.limit
    }
}

/// Fetch every page starting at offset 0 and return all items in order.
///
/// Stops at the first page with fewer than `limit` records. A zero `limit` is
/// rejected up front since it would never produce a short page.
pub async fn collect<T, F, Fut>(limit: u64, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    if limit == 0 {
        return Err(CloudError::InvalidPageLimit);
    }

    let mut items = Vec::new();
    let mut offset = 0;
    let mut pages = 0;

    loop {
        let page = fetch_page(offset, limit).await?;
        pages += 1;
        let returned = page.returned_count;
        items.extend(page.items);
        if returned < limit {
            break;
        }
        offset += returned;
    }

    tracing::debug!("Collected {} items in {} pages", items.len(), pages);
    Ok(items)
}
