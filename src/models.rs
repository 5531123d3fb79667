//! Core data models for the shopping assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Catalog =================
//

/// One catalog entry, loaded once at startup and immutable thereafter.
///
/// `url` is the unique key. `price` is free text such as "13.0 - 15.0 USD";
/// only its first numeric token is ever used for filtering and sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub category: String,
    /// Coerced to exactly 0 or 1 at load time.
    pub discount: u8,
    pub price: String,
    /// Comma-separated variant descriptor, when the product has variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn has_variants(&self) -> bool {
        self.variant
            .as_deref()
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Structured search request against the loaded catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "minPrice")]
    pub min_price: Option<f64>,
    #[serde(default, rename = "maxPrice")]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub discount: Option<bool>,
    #[serde(default, rename = "hasVariants")]
    pub has_variants: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// One page of sorted, filtered search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub products: Vec<Product>,
    /// Filtered count before pagination.
    pub total: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

//
// ================= Currency =================
//

/// Result of converting one amount into another currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConversion {
    pub amount: f64,
    #[serde(rename = "fromCurrency")]
    pub from_currency: String,
    #[serde(rename = "toCurrency")]
    pub to_currency: String,
    #[serde(rename = "convertedAmount")]
    pub converted_amount: f64,
    #[serde(rename = "exchangeRate")]
    pub exchange_rate: f64,
    pub timestamp: String,
    /// "direct" for same-currency conversions, otherwise the provider id.
    pub source: String,
}

/// One supported currency as reported by the rate provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the ordered conversation list sent to the oracle.
///
/// Assistant messages may carry tool-call requests; tool messages carry the
/// result of one request, linked back by `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant_with_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
        }
    }
}

/// A structured tool invocation requested by the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Serialized JSON object of call arguments.
    pub arguments: String,
}

//
// ================= Outcome =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    /// Answered directly, no tools invoked.
    Completed,
    /// Answered after executing at least one tool call.
    CompletedWithTools,
    /// The orchestration flow itself failed; a fallback answer was returned.
    Stopped,
}

/// Final answer object the orchestrator always returns, even on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub text: String,
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    #[serde(rename = "toolUsed", skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
    #[serde(rename = "toolCalls")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(rename = "toolResults")]
    pub tool_results: Vec<ToolExecution>,
    pub status: ChatStatus,
}

/// Outcome of executing a single requested tool call.
///
/// Failures never raise past the executor; they become ordinary results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub tool: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_variants() {
        let mut product = Product {
            title: "Phone".to_string(),
            description: "A phone".to_string(),
            url: "https://shop.example/phone".to_string(),
            image_url: String::new(),
            category: "Electronics".to_string(),
            discount: 0,
            price: "900.0 USD".to_string(),
            variant: None,
            created_at: Utc::now(),
        };
        assert!(!product.has_variants());

        product.variant = Some("  ".to_string());
        assert!(!product.has_variants());

        product.variant = Some("Black, White".to_string());
        assert!(product.has_variants());
    }

    #[test]
    fn test_message_ordering_fields_serialize() {
        let msg = ChatMessage::tool_result("call_1", "searchProducts", "{}");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["name"], "searchProducts");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_search_criteria_accepts_camel_case() {
        let criteria: SearchCriteria = serde_json::from_str(
            r#"{"query":"phone","minPrice":10,"maxPrice":100,"hasVariants":true}"#,
        )
        .unwrap();
        assert_eq!(criteria.query.as_deref(), Some("phone"));
        assert_eq!(criteria.min_price, Some(10.0));
        assert_eq!(criteria.max_price, Some(100.0));
        assert_eq!(criteria.has_variants, Some(true));
    }
}
