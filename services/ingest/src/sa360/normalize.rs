use chrono::NaiveDate;

use adsync_db::columns::models::CustomColumnMetric;

use super::client::Sa360ClientError;
use super::models::{CustomColumnHeader, SearchRow};

/// Flatten one result row into one record per custom column.
///
/// The API returns the row's `customColumns` values positionally parallel to
/// the page's `customColumnHeaders`; a length mismatch means the arrays no
/// longer line up and the row is rejected rather than silently pairing values
/// with the wrong columns.
pub fn normalize_row(
    customer_id: &str,
    row: &SearchRow,
    headers: &[CustomColumnHeader],
) -> Result<Vec<CustomColumnMetric>, Sa360ClientError> {
    let base = extract_row(customer_id, row)?;

    let cells = row
        .custom_columns
        .as_ref()
        .ok_or_else(|| Sa360ClientError::DataShape("result row missing customColumns".into()))?;
    if cells.len() != headers.len() {
        return Err(Sa360ClientError::DataShape(format!(
            "row has {} custom-column values but page has {} headers",
            cells.len(),
            headers.len()
        )));
    }

    Ok(cells
        .iter()
        .zip(headers)
        .map(|(cell, header)| CustomColumnMetric {
            column_id: header.id.clone(),
            value: cell.double_value,
            ..base.clone()
        })
        .collect())
}

/// Pull the shared per-row fields out once. Required nested fields missing
/// from the payload are schema drift; optional metric and keyword fields get
/// the documented defaults.
fn extract_row(customer_id: &str, row: &SearchRow) -> Result<CustomColumnMetric, Sa360ClientError> {
    let campaign = row
        .campaign
        .as_ref()
        .ok_or_else(|| Sa360ClientError::DataShape("result row missing campaign".into()))?;
    let campaign_id = campaign
        .id
        .clone()
        .ok_or_else(|| Sa360ClientError::DataShape("campaign missing id".into()))?;
    let campaign_name = campaign
        .name
        .clone()
        .ok_or_else(|| Sa360ClientError::DataShape("campaign missing name".into()))?;

    let customer = row
        .customer
        .as_ref()
        .ok_or_else(|| Sa360ClientError::DataShape("result row missing customer".into()))?;
    let account_name = customer
        .descriptive_name
        .clone()
        .ok_or_else(|| Sa360ClientError::DataShape("customer missing descriptiveName".into()))?;
    let currency_code = customer
        .currency_code
        .clone()
        .ok_or_else(|| Sa360ClientError::DataShape("customer missing currencyCode".into()))?;

    let date = parse_row_date(row)?;

    let metrics = row.metrics.clone().unwrap_or_default();
    let keyword = row
        .ad_group_criterion
        .clone()
        .unwrap_or_default()
        .keyword
        .unwrap_or_default();

    Ok(CustomColumnMetric {
        column_id: String::new(),
        customer_id: customer_id.to_string(),
        campaign_id,
        date,
        keyword_text: keyword.text.unwrap_or_default(),
        keyword_match_type: keyword.match_type.unwrap_or_default(),
        value: None,
        campaign_name,
        account_name,
        currency_code,
        clicks: metrics.clicks.unwrap_or_else(|| "0".to_string()),
        impressions: metrics.impressions.unwrap_or_else(|| "0".to_string()),
        cost: metrics.cost_micros.unwrap_or_else(|| "0".to_string()),
    })
}

/// The segment date of one result row, parsed.
pub fn parse_row_date(row: &SearchRow) -> Result<NaiveDate, Sa360ClientError> {
    let raw = row
        .segments
        .as_ref()
        .and_then(|s| s.date.as_deref())
        .ok_or_else(|| Sa360ClientError::DataShape("result row missing segments.date".into()))?;

    raw.parse()
        .map_err(|_| Sa360ClientError::DataShape(format!("unparseable segments.date {raw:?}")))
}
