use chrono::NaiveDate;

use super::client::{Sa360Client, Sa360ClientError};
use super::models::SearchPage;
use super::query::build_metrics_query;

/// A lazy, finite sequence of metric pages for one customer.
///
/// Each call to [`next_page`](Self::next_page) issues one search request and
/// threads the API's `pageToken` cursor; the sequence ends when the API stops
/// returning a `nextPageToken`. The driver consumes pages one at a time so it
/// can checkpoint between them without buffering a whole result set.
pub struct SearchPages<'a> {
    client: &'a Sa360Client,
    customer_id: String,
    query: String,
    next_token: Option<String>,
    page_index: usize,
    done: bool,
}

impl<'a> SearchPages<'a> {
    /// Start a paginated metrics fetch for `customer_id` over dates in
    /// `[start_date, end_date]`.
    pub fn new(
        client: &'a Sa360Client,
        customer_id: &str,
        column_ids: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, Sa360ClientError> {
        let query = build_metrics_query(column_ids, start_date, end_date)?;
        Ok(Self {
            client,
            customer_id: customer_id.to_string(),
            query,
            next_token: None,
            page_index: 0,
            done: false,
        })
    }

    /// Fetch the next page, or `None` after the final page.
    pub async fn next_page(&mut self) -> Result<Option<SearchPage>, Sa360ClientError> {
        if self.done {
            return Ok(None);
        }

        tracing::info!(
            customer_id = %self.customer_id,
            page = self.page_index,
            "fetching search page"
        );

        let page = self
            .client
            .search_page(&self.customer_id, &self.query, self.next_token.as_deref())
            .await?;

        self.page_index += 1;
        self.next_token = page.next_page_token.clone();
        if self.next_token.is_none() {
            self.done = true;
        }

        Ok(Some(page))
    }
}
