use serde::{Deserialize, Serialize};

/// OAuth2 token-endpoint response (only the field we consume).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// One page from `customers/{id}/searchAds360:search`.
///
/// `custom_column_headers` is positionally parallel to each result row's
/// `custom_columns` values; the normalizer enforces that alignment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub results: Vec<SearchRow>,
    #[serde(default)]
    pub custom_column_headers: Vec<CustomColumnHeader>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRow {
    pub campaign: Option<Campaign>,
    pub metrics: Option<Metrics>,
    pub ad_group_criterion: Option<AdGroupCriterion>,
    pub customer: Option<Customer>,
    pub segments: Option<Segments>,
    pub custom_columns: Option<Vec<CustomColumnValue>>,
    pub customer_client: Option<CustomerClient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Metric counters come back as decimal strings; `cost_micros` stays in
/// micro-units the way the API reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub clicks: Option<String>,
    pub impressions: Option<String>,
    pub cost_micros: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdGroupCriterion {
    pub keyword: Option<Keyword>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    pub text: Option<String>,
    pub match_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub descriptive_name: Option<String>,
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segments {
    pub date: Option<String>,
}

/// One cell of a row's custom-column array. The API omits `doubleValue`
/// entirely for sparse metrics, so the whole cell can be `{}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumnValue {
    pub double_value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumnHeader {
    pub id: String,
    pub name: Option<String>,
}

/// Hierarchy-query row payload (`SELECT customer_client.id FROM customer_client`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerClient {
    pub id: String,
}

/// One definition from `customers/{id}/customColumns`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumnMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub render_type: Option<String>,
    pub value_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumnsResponse {
    #[serde(default)]
    pub custom_columns: Vec<CustomColumnMetadata>,
}
