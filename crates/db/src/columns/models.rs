use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One custom-column definition, keyed by (column_id, customer_id).
///
/// Definitions are re-fetched every run and emitted once per managed account;
/// the upsert keeps the warehouse copy current without history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomColumn {
    pub column_id: String,
    pub customer_id: String,
    pub name: String,
    pub description: String,
    pub render_type: String,
    pub value_type: String,
}

/// One (campaign, date, custom-column) observation with keyword context.
///
/// Produced, never mutated; delivered at-least-once, deduplicated by the
/// destination's primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomColumnMetric {
    pub column_id: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub date: NaiveDate,
    pub keyword_text: String,
    pub keyword_match_type: String,
    pub value: Option<f64>,
    pub campaign_name: String,
    pub account_name: String,
    pub currency_code: String,
    pub clicks: String,
    pub impressions: String,
    pub cost: String,
}
