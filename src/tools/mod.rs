//! Tool dispatch
//!
//! The two callable tools the oracle may request, as a closed enum mapped
//! to handlers at compile time. Unknown names fall through to a failed
//! result instead of being invoked.

use crate::catalog::CatalogSearch;
use crate::models::{SearchCriteria, ToolCallRequest, ToolExecution};
use crate::oracle::{FunctionSchema, ToolSchema};
use crate::rates::ExchangeRateClient;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Page size forced onto every oracle-requested product search.
const SEARCH_TOOL_LIMIT: usize = 2;

/// The closed set of tools declared to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SearchProducts,
    ConvertCurrencies,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "searchProducts" => Some(Self::SearchProducts),
            "convertCurrencies" => Some(Self::ConvertCurrencies),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchProducts => "searchProducts",
            Self::ConvertCurrencies => "convertCurrencies",
        }
    }
}

/// The tool declarations sent to the oracle on every first call.
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: "searchProducts".to_string(),
                description: "Search the product catalog by text, category, price range and discount status".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Free-text query matched against product titles and descriptions"
                        },
                        "category": {
                            "type": "string",
                            "description": "Exact category label, case-insensitive"
                        },
                        "minPrice": { "type": "number", "description": "Inclusive lower price bound" },
                        "maxPrice": { "type": "number", "description": "Inclusive upper price bound" },
                        "discount": { "type": "boolean", "description": "Only discounted products" },
                        "hasVariants": { "type": "boolean", "description": "Only products with variants" }
                    }
                }),
            },
        },
        ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: "convertCurrencies".to_string(),
                description: "Convert an amount between two currencies using live exchange rates".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "amount": { "type": "number", "description": "Amount to convert, positive" },
                        "fromCurrency": { "type": "string", "description": "3-letter source currency code" },
                        "toCurrency": { "type": "string", "description": "3-letter target currency code" }
                    },
                    "required": ["amount", "fromCurrency", "toCurrency"]
                }),
            },
        },
    ]
}

#[derive(Debug, Deserialize)]
struct ConversionArgs {
    amount: f64,
    #[serde(rename = "fromCurrency")]
    from_currency: String,
    #[serde(rename = "toCurrency")]
    to_currency: String,
}

/// Executes oracle-requested tool calls against the catalog search engine
/// and the exchange rate client.
pub struct ToolExecutor {
    catalog: Arc<CatalogSearch>,
    rates: Arc<ExchangeRateClient>,
}

impl ToolExecutor {
    pub fn new(catalog: Arc<CatalogSearch>, rates: Arc<ExchangeRateClient>) -> Self {
        Self { catalog, rates }
    }

    /// Execute one requested call. Never raises: decode failures,
    /// validation failures, dependency failures and unknown tool names all
    /// become ordinary failed results.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolExecution {
        debug!(call_id = %call.id, tool = %call.name, "Executing tool call");

        let Some(kind) = ToolKind::from_name(&call.name) else {
            warn!(tool = %call.name, "Oracle requested an unsupported tool");
            return ToolExecution {
                call_id: call.id.clone(),
                tool: call.name.clone(),
                success: false,
                data: None,
                error: Some(format!("Unsupported tool: {}", call.name)),
            };
        };

        let result = match kind {
            ToolKind::SearchProducts => self.run_search(&call.arguments).await,
            ToolKind::ConvertCurrencies => self.run_conversion(&call.arguments).await,
        };

        match result {
            Ok(data) => ToolExecution {
                call_id: call.id.clone(),
                tool: kind.as_str().to_string(),
                success: true,
                data: Some(data),
                error: None,
            },
            Err(message) => {
                warn!(call_id = %call.id, tool = %call.name, error = %message, "Tool call failed");
                ToolExecution {
                    call_id: call.id.clone(),
                    tool: kind.as_str().to_string(),
                    success: false,
                    data: None,
                    error: Some(message),
                }
            }
        }
    }

    async fn run_search(&self, arguments: &str) -> std::result::Result<serde_json::Value, String> {
        let mut criteria: SearchCriteria = serde_json::from_str(arguments)
            .map_err(|e| format!("Invalid searchProducts arguments: {}", e))?;

        // The oracle only ever sees a fixed page of results.
        criteria.limit = Some(SEARCH_TOOL_LIMIT);
        criteria.offset = Some(0);

        let page = self.catalog.search(&criteria).map_err(|e| e.to_string())?;
        serde_json::to_value(page).map_err(|e| e.to_string())
    }

    async fn run_conversion(&self, arguments: &str) -> std::result::Result<serde_json::Value, String> {
        let args: ConversionArgs = serde_json::from_str(arguments)
            .map_err(|e| format!("Invalid convertCurrencies arguments: {}", e))?;

        let conversion = self
            .rates
            .convert(args.amount, &args.from_currency, &args.to_currency)
            .await
            .map_err(|e| e.to_string())?;

        serde_json::to_value(conversion).map_err(|e| e.to_string())
    }
}
