//! Chat orchestrator
//!
//! Drives the multi-step exchange between the caller, the reasoning oracle
//! and the two tools: send the query plus tool schemas, execute whatever
//! calls the oracle requests, feed the results back, and obtain a final
//! natural-language answer. Always returns a well-formed answer object.

use crate::models::{ChatMessage, ChatOutcome, ChatStatus, ToolExecution};
use crate::oracle::ChatOracle;
use crate::tools::{tool_schemas, ToolExecutor, ToolKind};
use crate::Result;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const SYSTEM_PROMPT: &str = "You are a helpful shopping assistant for an online store. \
You can search the product catalog and convert currency amounts using live exchange rates. \
Use the available tools when the user asks about products or currency conversions; answer \
directly otherwise. Keep answers concise and grounded in the tool results.";

const FALLBACK_ANSWER: &str =
    "I'm sorry, I ran into a problem while processing your request. Please try again.";

const SEARCH_ACK: &str = "I looked up matching products in the catalog for you.";
const CONVERT_ACK: &str = "I converted the requested amount using the latest exchange rates.";

/// Single-pass pipeline over the oracle and the tools. Stateless across
/// requests beyond the caller-supplied message history.
pub struct ChatOrchestrator {
    oracle: Arc<dyn ChatOracle>,
    executor: ToolExecutor,
}

impl ChatOrchestrator {
    pub fn new(oracle: Arc<dyn ChatOracle>, executor: ToolExecutor) -> Self {
        Self { oracle, executor }
    }

    /// Answer a user query, consulting the oracle and executing any tool
    /// calls it requests.
    ///
    /// Infallible by contract: any failure of the orchestration flow is
    /// converted into a fixed apologetic answer with status `Stopped`.
    pub async fn chat(
        &self,
        query: &str,
        conversation_id: Option<String>,
        prior_messages: Vec<ChatMessage>,
    ) -> ChatOutcome {
        let conversation_id =
            conversation_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        match self.run_pipeline(query, prior_messages).await {
            Ok(outcome) => ChatOutcome {
                conversation_id,
                ..outcome
            },
            Err(e) => {
                error!("Chat pipeline failed: {}", e);
                ChatOutcome {
                    text: FALLBACK_ANSWER.to_string(),
                    conversation_id,
                    tool_used: None,
                    tool_calls: Vec::new(),
                    tool_results: Vec::new(),
                    status: ChatStatus::Stopped,
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        query: &str,
        prior_messages: Vec<ChatMessage>,
    ) -> Result<ChatOutcome> {
        // System instructions, then prior history, then the current turn.
        let mut messages = Vec::with_capacity(prior_messages.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(prior_messages);
        messages.push(ChatMessage::user(query));

        let schemas = tool_schemas();
        let reply = self.oracle.complete(&messages, &schemas).await?;

        if reply.tool_calls.is_empty() {
            info!("Oracle answered without tools");
            return Ok(ChatOutcome {
                text: reply.content.unwrap_or_default(),
                conversation_id: String::new(),
                tool_used: None,
                tool_calls: Vec::new(),
                tool_results: Vec::new(),
                status: ChatStatus::Completed,
            });
        }

        let tool_calls = reply.tool_calls;
        info!(count = tool_calls.len(), "Oracle requested tool calls");

        // Requested calls are independent reads; fire all, wait for all.
        // Each result stays correlated to its call id.
        let results: Vec<ToolExecution> = join_all(
            tool_calls.iter().map(|call| self.executor.execute(call)),
        )
        .await;

        messages.push(ChatMessage::assistant_with_calls(tool_calls.clone()));
        for (call, result) in tool_calls.iter().zip(results.iter()) {
            messages.push(ChatMessage::tool_result(
                &call.id,
                &call.name,
                render_tool_content(result),
            ));
        }

        let final_reply = self.oracle.complete(&messages, &[]).await?;
        let text = match final_reply.content.filter(|c| !c.trim().is_empty()) {
            Some(content) => content,
            None => acknowledge_first_success(&results),
        };

        // Quirk kept from the original service: when several tools ran,
        // only the first requested tool's name is reported.
        let tool_used = tool_calls.first().map(|call| call.name.clone());

        Ok(ChatOutcome {
            text,
            conversation_id: String::new(),
            tool_used,
            tool_calls,
            tool_results: results,
            status: ChatStatus::CompletedWithTools,
        })
    }

    /// Liveness of the oracle dependency. Never errors.
    pub async fn is_available(&self) -> bool {
        let probe = vec![ChatMessage::user("ping")];
        match self.oracle.complete(&probe, &[]).await {
            Ok(_) => true,
            Err(e) => {
                info!("Oracle liveness probe failed: {}", e);
                false
            }
        }
    }
}

/// Serialize one execution into tool-result message content. Failures
/// become ordinary textual content the oracle can acknowledge.
fn render_tool_content(result: &ToolExecution) -> String {
    if result.success {
        result
            .data
            .as_ref()
            .map(|data| data.to_string())
            .unwrap_or_else(|| "{}".to_string())
    } else {
        format!(
            "Error: {}",
            result.error.as_deref().unwrap_or("tool execution failed")
        )
    }
}

/// Minimal acknowledgement when the oracle returns no usable final text.
fn acknowledge_first_success(results: &[ToolExecution]) -> String {
    let first_success = results
        .iter()
        .find(|r| r.success)
        .and_then(|r| ToolKind::from_name(&r.tool));

    match first_success {
        Some(ToolKind::SearchProducts) => SEARCH_ACK.to_string(),
        Some(ToolKind::ConvertCurrencies) => CONVERT_ACK.to_string(),
        None => FALLBACK_ANSWER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSearch, CatalogStore};
    use crate::models::{MessageRole, Product, ToolCallRequest};
    use crate::oracle::{OracleReply, ToolSchema};
    use crate::rates::{ExchangeRateClient, RateProvider, RatesSnapshot};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Oracle fake that replays a fixed script of replies and records the
    /// message lists it was called with.
    struct ScriptedOracle {
        script: Mutex<Vec<Result<OracleReply>>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedOracle {
        fn new(script: Vec<Result<OracleReply>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn seen_messages(&self, turn: usize) -> Vec<ChatMessage> {
            self.calls.lock().unwrap()[turn].clone()
        }
    }

    #[async_trait]
    impl ChatOracle for ScriptedOracle {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolSchema],
        ) -> Result<OracleReply> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(OracleReply {
                    content: Some("done".to_string()),
                    tool_calls: Vec::new(),
                })
            } else {
                script.remove(0)
            }
        }
    }

    struct FixedProvider {
        fail: bool,
    }

    #[async_trait]
    impl RateProvider for FixedProvider {
        fn name(&self) -> &str {
            "mock-provider"
        }

        async fn fetch_latest(&self, symbols: &[&str]) -> Result<RatesSnapshot> {
            if self.fail {
                return Err(crate::error::AgentError::Dependency(
                    "provider down".to_string(),
                ));
            }
            let mut rates = HashMap::new();
            for symbol in symbols {
                let rate = match *symbol {
                    "USD" => 1.0,
                    "EUR" => 0.9,
                    "CAD" => 1.35,
                    _ => continue,
                };
                rates.insert((*symbol).to_string(), rate);
            }
            Ok(RatesSnapshot {
                base: "USD".to_string(),
                rates,
            })
        }

        async fn fetch_currencies(&self) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }

    fn product(title: &str, discount: u8, price: &str) -> Product {
        Product {
            title: title.to_string(),
            description: format!("{} description", title),
            url: format!(
                "https://shop.example/{}",
                title.to_lowercase().replace(' ', "-")
            ),
            image_url: String::new(),
            category: "Electronics".to_string(),
            discount,
            price: price.to_string(),
            variant: None,
            created_at: Utc::now(),
        }
    }

    fn executor(fail_rates: bool) -> ToolExecutor {
        let store = CatalogStore::from_products(vec![
            product("Phone Alpha", 0, "900.0 USD"),
            product("Phone Beta", 1, "700.0 USD"),
            product("Phone Gamma", 0, "500.0 USD"),
        ]);
        let catalog = Arc::new(CatalogSearch::new(Arc::new(store)));
        let rates = Arc::new(ExchangeRateClient::new(
            Arc::new(FixedProvider { fail: fail_rates }),
            Duration::from_secs(3600),
        ));
        ToolExecutor::new(catalog, rates)
    }

    fn orchestrator(
        script: Vec<Result<OracleReply>>,
        fail_rates: bool,
    ) -> (ChatOrchestrator, Arc<ScriptedOracle>) {
        let oracle = Arc::new(ScriptedOracle::new(script));
        let orchestrator = ChatOrchestrator::new(oracle.clone(), executor(fail_rates));
        (orchestrator, oracle)
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    fn text_reply(text: &str) -> Result<OracleReply> {
        Ok(OracleReply {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
        })
    }

    fn calls_reply(calls: Vec<ToolCallRequest>) -> Result<OracleReply> {
        Ok(OracleReply {
            content: None,
            tool_calls: calls,
        })
    }

    #[tokio::test]
    async fn test_direct_answer_without_tools() {
        let (orchestrator, oracle) =
            orchestrator(vec![text_reply("Hello! How can I help?")], false);

        let outcome = orchestrator.chat("hi", None, Vec::new()).await;
        assert_eq!(outcome.status, ChatStatus::Completed);
        assert_eq!(outcome.text, "Hello! How can I help?");
        assert!(outcome.tool_used.is_none());
        assert!(!outcome.conversation_id.is_empty());

        // system prompt first, user message last
        let messages = oracle.seen_messages(0);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages.last().unwrap().content.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_product_search_scenario() {
        let (orchestrator, oracle) = orchestrator(
            vec![
                calls_reply(vec![tool_call(
                    "call_1",
                    "searchProducts",
                    r#"{"query":"phone"}"#,
                )]),
                text_reply("Here are two phones you might like."),
            ],
            false,
        );

        let outcome = orchestrator
            .chat("I am looking for a phone", None, Vec::new())
            .await;

        assert_eq!(outcome.status, ChatStatus::CompletedWithTools);
        assert_eq!(outcome.tool_used.as_deref(), Some("searchProducts"));
        assert!(!outcome.text.is_empty());

        let result = &outcome.tool_results[0];
        assert!(result.success);
        let payload = result.data.as_ref().unwrap();
        assert_eq!(payload["products"].as_array().unwrap().len(), 2);

        // Second turn: assistant message with the requests, then one tool
        // result per call, in request order.
        let messages = oracle.seen_messages(1);
        let assistant = &messages[messages.len() - 2];
        assert_eq!(assistant.role, MessageRole::Assistant);
        assert_eq!(assistant.tool_calls.as_ref().unwrap()[0].id, "call_1");
        let tool_msg = messages.last().unwrap();
        assert_eq!(tool_msg.role, MessageRole::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_msg.name.as_deref(), Some("searchProducts"));
    }

    #[tokio::test]
    async fn test_currency_conversion_scenario() {
        let (orchestrator, _) = orchestrator(
            vec![
                calls_reply(vec![tool_call(
                    "call_1",
                    "convertCurrencies",
                    r#"{"amount":350,"fromCurrency":"EUR","toCurrency":"CAD"}"#,
                )]),
                text_reply("350 EUR is 525 CAD."),
            ],
            false,
        );

        let outcome = orchestrator
            .chat("How many Canadian Dollars are 350 Euros?", None, Vec::new())
            .await;

        assert_eq!(outcome.tool_used.as_deref(), Some("convertCurrencies"));
        let payload = outcome.tool_results[0].data.as_ref().unwrap();
        let expected = (350.0 * (1.35 / 0.9) * 10_000.0_f64).round() / 10_000.0;
        assert_eq!(payload["convertedAmount"].as_f64().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_failed_tool_becomes_result_content() {
        let (orchestrator, oracle) = orchestrator(
            vec![
                calls_reply(vec![tool_call(
                    "call_1",
                    "convertCurrencies",
                    r#"{"amount":10,"fromCurrency":"USD","toCurrency":"EUR"}"#,
                )]),
                text_reply("Sorry, rates are unavailable right now."),
            ],
            true,
        );

        let outcome = orchestrator.chat("10 usd in eur?", None, Vec::new()).await;

        // Still a well-formed answer, not an exception.
        assert_eq!(outcome.status, ChatStatus::CompletedWithTools);
        assert!(!outcome.tool_results[0].success);
        assert!(outcome.tool_results[0].error.is_some());

        let messages = oracle.seen_messages(1);
        let content = messages.last().unwrap().content.as_deref().unwrap();
        assert!(content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_oracle_failure_yields_apologetic_answer() {
        let (orchestrator, _) = orchestrator(
            vec![Err(crate::error::AgentError::Oracle(
                "oracle unreachable".to_string(),
            ))],
            false,
        );

        let outcome = orchestrator.chat("hello", None, Vec::new()).await;
        assert_eq!(outcome.status, ChatStatus::Stopped);
        assert_eq!(outcome.text, FALLBACK_ANSWER);
        assert!(outcome.tool_used.is_none());
    }

    #[tokio::test]
    async fn test_empty_final_answer_falls_back_to_acknowledgement() {
        let (orchestrator, _) = orchestrator(
            vec![
                calls_reply(vec![tool_call(
                    "call_1",
                    "searchProducts",
                    r#"{"query":"phone"}"#,
                )]),
                text_reply("   "),
            ],
            false,
        );

        let outcome = orchestrator.chat("phones?", None, Vec::new()).await;
        assert_eq!(outcome.text, SEARCH_ACK);
    }

    #[tokio::test]
    async fn test_multiple_calls_report_first_tool_name() {
        let (orchestrator, oracle) = orchestrator(
            vec![
                calls_reply(vec![
                    tool_call("call_1", "searchProducts", r#"{"query":"phone"}"#),
                    tool_call(
                        "call_2",
                        "convertCurrencies",
                        r#"{"amount":1,"fromCurrency":"USD","toCurrency":"EUR"}"#,
                    ),
                ]),
                text_reply("Done."),
            ],
            false,
        );

        let outcome = orchestrator.chat("phones and rates", None, Vec::new()).await;
        assert_eq!(outcome.tool_used.as_deref(), Some("searchProducts"));
        assert_eq!(outcome.tool_results.len(), 2);
        assert_eq!(outcome.tool_results[1].call_id, "call_2");

        // Tool-result messages follow request order.
        let messages = oracle.seen_messages(1);
        let ids: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .map(|m| m.tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["call_1", "call_2"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_name_contained() {
        let (orchestrator, _) = orchestrator(
            vec![
                calls_reply(vec![tool_call("call_1", "launchRockets", "{}")]),
                text_reply("I can't do that."),
            ],
            false,
        );

        let outcome = orchestrator.chat("launch the rockets", None, Vec::new()).await;
        assert_eq!(outcome.status, ChatStatus::CompletedWithTools);
        assert!(!outcome.tool_results[0].success);
        assert!(outcome.tool_results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("launchRockets"));
    }

    #[tokio::test]
    async fn test_caller_supplied_history_and_id_preserved() {
        let (orchestrator, oracle) = orchestrator(vec![text_reply("ok")], false);

        let prior = vec![
            ChatMessage::user("earlier question"),
            ChatMessage {
                role: MessageRole::Assistant,
                content: Some("earlier answer".to_string()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            },
        ];

        let outcome = orchestrator
            .chat("follow-up", Some("conv-123".to_string()), prior)
            .await;
        assert_eq!(outcome.conversation_id, "conv-123");

        let messages = oracle.seen_messages(0);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content.as_deref(), Some("earlier question"));
    }

    #[tokio::test]
    async fn test_is_available() {
        let (orch, _) = orchestrator(vec![text_reply("pong")], false);
        assert!(orch.is_available().await);

        let (orch, _) = orchestrator(
            vec![Err(crate::error::AgentError::Oracle("down".to_string()))],
            false,
        );
        assert!(!orch.is_available().await);
    }
}
