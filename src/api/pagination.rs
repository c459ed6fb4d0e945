use serde::Deserialize;

use crate::config::PageSettings;
use crate::domain::order::{OrderError, OrderStatus, ValidationErrors};
use crate::store::{OrderFilter, Page};

// ============================================================================
// List Query + Content-Range
// ============================================================================
//
// `GET /orders?external_id=..&status=..&limit=..&offset=..`
//
// The body carries only the page of orders; the window and the total number
// of matches travel in `Content-Range: {start}-{end}/{total}` (inclusive end),
// or `-/{total}` when the offset is past the last match.
//
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub external_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListQuery {
    /// Resolve filter and page window, collecting every invalid parameter.
    pub fn resolve(&self, settings: PageSettings) -> Result<(OrderFilter, Page), OrderError> {
        let mut errors = ValidationErrors::default();

        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(raw) => match raw.parse::<OrderStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    errors.add(
                        "status",
                        format!("Select a valid choice. {raw} is not one of the available choices."),
                    );
                    None
                }
            },
        };

        let limit = match self.limit {
            None => settings.default_limit,
            Some(0) => {
                errors.add("limit", "Ensure this value is greater than or equal to 1.");
                settings.default_limit
            }
            Some(limit) => limit.min(settings.max_limit),
        };

        let filter = OrderFilter {
            external_id: self.external_id.clone().filter(|id| !id.is_empty()),
            status,
        };
        let page = Page {
            offset: self.offset.unwrap_or(0),
            limit,
        };
        errors.into_result((filter, page))
    }
}

/// Value of the `Content-Range` header for a page of `count` orders.
pub fn content_range(page: Page, count: usize, total: usize) -> String {
    if page.offset >= total || count == 0 {
        return format!("-/{total}");
    }
    let end = page.offset + count - 1;
    format!("{}-{}/{}", page.offset, end, total)
}
