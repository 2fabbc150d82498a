//! Request and response types for the ibr-daemon HTTP endpoints that are
//! not already façade types. No business logic lives here.

use ibr_schemas::args::OrderArgs;
use ibr_schemas::Identifier;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// /order
// ---------------------------------------------------------------------------

/// `POST /order` accepts one order or a list (parent first, for brackets).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OrderBody {
    Many(Vec<OrderArgs>),
    One(Box<OrderArgs>),
}

impl OrderBody {
    pub fn into_items(self) -> Vec<OrderArgs> {
        match self {
            OrderBody::Many(items) => items,
            OrderBody::One(item) => vec![*item],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelQuery {
    #[serde(rename = "orderId")]
    pub order_id: Identifier,
}

// ---------------------------------------------------------------------------
// /account
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdateQuery {
    #[serde(rename = "acctCode")]
    pub acct_code: String,
}

pub const MISSING_TAGS_MSG: &str = "Must provide 1 or more `tag` args, and/or a CSV `tags` arg";

/// 400 body for a summary request without any tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentErrorResponse {
    pub message: ArgumentMessages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentMessages {
    pub tags: String,
}

/// Merge repeated `tag` params with CSV `tags` params, in request order,
/// dropping blanks and duplicates.
pub fn summary_tags(params: &[(String, String)]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for (key, value) in params {
        let parts: Vec<&str> = match key.as_str() {
            "tag" => vec![value.as_str()],
            "tags" => value.split(',').collect(),
            _ => continue,
        };
        for part in parts {
            let tag = part.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn summary_tags_merge_and_dedupe_in_order() {
        let params = pairs(&[
            ("tag", "NetLiquidation"),
            ("tags", "BuyingPower, NetLiquidation,,Leverage-S"),
            ("other", "x"),
            ("tag", "BuyingPower"),
        ]);
        assert_eq!(
            summary_tags(&params),
            vec!["NetLiquidation", "BuyingPower", "Leverage-S"]
        );
    }

    #[test]
    fn summary_tags_empty_without_tag_params() {
        assert!(summary_tags(&pairs(&[("tags", " , ")])).is_empty());
    }

    #[test]
    fn order_body_accepts_object_or_list() {
        let one: OrderBody = serde_json::from_str(
            r#"{"symbol":"AAPL","action":"BUY","totalQuantity":1,"orderType":"MKT"}"#,
        )
        .unwrap();
        assert_eq!(one.into_items().len(), 1);

        let many: OrderBody =
            serde_json::from_str(r#"[{"symbol":"AAPL"},{"symbol":"MSFT"}]"#).unwrap();
        let items = many.into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].symbol.as_deref(), Some("MSFT"));
    }
}
