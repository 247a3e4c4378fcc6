use chrono::NaiveDate;

use super::client::Sa360ClientError;

/// The account-hierarchy query: every client visible under a manager.
pub const CUSTOMER_CLIENT_QUERY: &str = "SELECT customer_client.id FROM customer_client";

/// Build the keyword-view metrics query for a set of custom columns.
///
/// Column ids are validated numeric before being spliced into the field
/// list — the query language has no parameter binding, so this is the only
/// barrier against a malformed id corrupting the statement. Ascending date
/// order is required: the driver's resumption frontier assumes every date
/// below it is fully processed.
pub fn build_metrics_query(
    column_ids: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<String, Sa360ClientError> {
    let column_fields = custom_column_fields(column_ids)?;

    Ok(format!(
        "SELECT campaign.id, campaign.name, \
         ad_group_criterion.keyword.text, ad_group_criterion.keyword.match_type, \
         metrics.clicks, metrics.impressions, metrics.cost_micros, \
         customer.currency_code, customer.descriptive_name, segments.date, {column_fields} \
         FROM keyword_view \
         WHERE segments.date BETWEEN '{start}' AND '{end}' \
         ORDER BY segments.date ASC",
        start = start_date.format("%Y-%m-%d"),
        end = end_date.format("%Y-%m-%d"),
    ))
}

/// Build the `custom_columns.id[...]` field list from validated ids.
fn custom_column_fields(column_ids: &[String]) -> Result<String, Sa360ClientError> {
    let mut fields = Vec::with_capacity(column_ids.len());
    for id in column_ids {
        fields.push(format!("custom_columns.id[{}]", validate_numeric_id(id)?));
    }
    Ok(fields.join(","))
}

/// Accept only non-empty all-digit ids.
pub fn validate_numeric_id(id: &str) -> Result<&str, Sa360ClientError> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id)
    } else {
        Err(Sa360ClientError::DataShape(format!(
            "expected numeric id, got {id:?}"
        )))
    }
}
