pub mod clips;
pub mod montages;
pub mod queue;

use serde::Deserialize;

/// Optional `?requestedBy=<discord id>` attribution for audit records.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestorQuery {
    pub requested_by: Option<String>,
}
