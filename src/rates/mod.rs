//! Exchange rate client
//!
//! Provides currency rates and metadata backed by a remote rate provider,
//! with TTL-based caching to bound request volume and graceful fallback
//! when the provider is unreachable.

use crate::error::AgentError;
use crate::models::{CurrencyConversion, CurrencyInfo};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Upper bound on convertible amounts.
const MAX_AMOUNT: f64 = 1_000_000_000.0;

/// Latest rates relative to the provider's base currency, restricted to the
/// requested symbol subset.
#[derive(Debug, Clone)]
pub struct RatesSnapshot {
    pub base: String,
    pub rates: HashMap<String, f64>,
}

/// Seam over the remote rate provider; one HTTP implementation, in-memory
/// fakes in tests.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Provider identifier used as the conversion source label.
    fn name(&self) -> &str;

    async fn fetch_latest(&self, symbols: &[&str]) -> Result<RatesSnapshot>;

    /// Full currency directory, code to display name.
    async fn fetch_currencies(&self) -> Result<HashMap<String, String>>;
}

// =============================
// HTTP provider
// =============================

#[derive(Debug, Deserialize)]
struct LatestRatesBody {
    base: String,
    rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct SymbolsBody {
    symbols: HashMap<String, String>,
}

/// Rate provider backed by an exchangerate-style JSON API.
pub struct HttpRateProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpRateProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.exchangerate.host".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[("access_key", self.api_key.clone())])
            .query(query)
            .send()
            .await
            .map_err(|e| AgentError::Dependency(format!("Rate provider request failed for {}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Dependency(format!(
                "Rate provider returned {} for {}",
                status, path
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::Dependency(format!("Invalid rate provider response for {}: {}", path, e)))
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    async fn fetch_latest(&self, symbols: &[&str]) -> Result<RatesSnapshot> {
        debug!(?symbols, "Fetching latest rates");
        let body: LatestRatesBody = self
            .get_json("/latest", &[("symbols", symbols.join(","))])
            .await?;

        Ok(RatesSnapshot {
            base: body.base,
            rates: body.rates,
        })
    }

    async fn fetch_currencies(&self) -> Result<HashMap<String, String>> {
        debug!("Fetching currency directory");
        let body: SymbolsBody = self.get_json("/symbols", &[]).await?;
        Ok(body.symbols)
    }
}

// =============================
// Client
// =============================

struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

struct CachedCurrencies {
    currencies: Vec<CurrencyInfo>,
    fetched_at: Instant,
}

/// Caching client over a [`RateProvider`].
///
/// Cache entries are replaced as whole units under a write lock, so readers
/// never observe a torn value; last writer wins on refresh races.
pub struct ExchangeRateClient {
    provider: Arc<dyn RateProvider>,
    ttl: Duration,
    rate_cache: RwLock<HashMap<String, CachedRate>>,
    currency_cache: RwLock<Option<CachedCurrencies>>,
}

impl ExchangeRateClient {
    pub fn new(provider: Arc<dyn RateProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            rate_cache: RwLock::new(HashMap::new()),
            currency_cache: RwLock::new(None),
        }
    }

    /// Current exchange rate between two 3-letter currency codes.
    ///
    /// A fresh cached entry is returned without any network call; otherwise
    /// the provider is called exactly once and the result cached. Failures
    /// surface once, naming both codes, and are never retried internally.
    pub async fn get_exchange_rate(&self, from: &str, to: &str) -> Result<f64> {
        if from.len() != 3 || to.len() != 3 {
            return Err(AgentError::Validation(format!(
                "Currency codes must be exactly 3 characters, got '{}' and '{}'",
                from, to
            )));
        }

        let from = from.to_uppercase();
        let to = to.to_uppercase();
        let cache_key = format!("{}-{}", from, to);

        {
            let cache = self.rate_cache.read().await;
            if let Some(entry) = cache.get(&cache_key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.rate);
                }
            }
        }

        let rate = self.fetch_rate(&from, &to).await?;

        let mut cache = self.rate_cache.write().await;
        cache.insert(
            cache_key,
            CachedRate {
                rate,
                fetched_at: Instant::now(),
            },
        );

        Ok(rate)
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<f64> {
        let snapshot = self
            .provider
            .fetch_latest(&[from, to])
            .await
            .map_err(|e| {
                AgentError::Dependency(format!(
                    "Failed to fetch exchange rate {} -> {}: {}",
                    from, to, e
                ))
            })?;

        let rate = derive_rate(&snapshot, from, to)?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(AgentError::Dependency(format!(
                "Rate provider returned an invalid rate for {} -> {}: {}",
                from, to, rate
            )));
        }

        Ok(rate)
    }

    /// Convert an amount between currencies.
    ///
    /// Same-currency conversions short-circuit with rate 1 and source
    /// "direct", skipping the network entirely.
    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<CurrencyConversion> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AgentError::Validation(format!(
                "Amount must be a positive finite number, got {}",
                amount
            )));
        }
        if amount > MAX_AMOUNT {
            return Err(AgentError::Validation(format!(
                "Amount exceeds the maximum of {}",
                MAX_AMOUNT
            )));
        }
        if !is_currency_code(from) || !is_currency_code(to) {
            return Err(AgentError::Validation(format!(
                "Currency codes must be exactly 3 letters, got '{}' and '{}'",
                from, to
            )));
        }

        let from = from.to_uppercase();
        let to = to.to_uppercase();

        if from == to {
            return Ok(CurrencyConversion {
                amount,
                converted_amount: amount,
                exchange_rate: 1.0,
                from_currency: from,
                to_currency: to,
                timestamp: chrono::Utc::now().to_rfc3339(),
                source: "direct".to_string(),
            });
        }

        let rate = self.get_exchange_rate(&from, &to).await?;

        Ok(CurrencyConversion {
            amount,
            converted_amount: round4(amount * rate),
            exchange_rate: rate,
            from_currency: from,
            to_currency: to,
            timestamp: chrono::Utc::now().to_rfc3339(),
            source: self.provider.name().to_string(),
        })
    }

    /// Supported currencies, from cache or the provider's directory.
    ///
    /// On fetch failure the fixed fallback list is returned without being
    /// cached, so the next call retries the real provider.
    pub async fn get_supported_currencies(&self) -> Vec<CurrencyInfo> {
        {
            let cache = self.currency_cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return entry.currencies.clone();
                }
            }
        }

        match self.provider.fetch_currencies().await {
            Ok(directory) => {
                let mut currencies: Vec<CurrencyInfo> = directory
                    .into_iter()
                    .map(|(code, name)| CurrencyInfo {
                        symbol: known_symbol(&code).map(str::to_string),
                        code,
                        name,
                    })
                    .collect();
                currencies.sort_by(|a, b| a.code.cmp(&b.code));

                let mut cache = self.currency_cache.write().await;
                *cache = Some(CachedCurrencies {
                    currencies: currencies.clone(),
                    fetched_at: Instant::now(),
                });

                currencies
            }
            Err(e) => {
                warn!("Currency directory fetch failed, using fallback list: {}", e);
                fallback_currencies()
            }
        }
    }

    /// Whether a currency code is supported.
    ///
    /// Degrades to a small hardcoded common-currency check rather than
    /// surfacing an error.
    pub async fn is_currency_supported(&self, code: &str) -> bool {
        if !is_currency_code(code) {
            return false;
        }
        let code = code.to_uppercase();

        let currencies = self.get_supported_currencies().await;
        if !currencies.is_empty() {
            return currencies.iter().any(|c| c.code == code);
        }

        COMMON_CURRENCIES.contains(&code.as_str())
    }

    /// Liveness probe: one uncached USD -> EUR fetch. Never errors.
    pub async fn is_available(&self) -> bool {
        match self.fetch_rate("USD", "EUR").await {
            Ok(_) => true,
            Err(e) => {
                info!("Rate provider liveness probe failed: {}", e);
                false
            }
        }
    }
}

/// Derive the from -> to rate out of a base-denominated snapshot.
fn derive_rate(snapshot: &RatesSnapshot, from: &str, to: &str) -> Result<f64> {
    let missing = |code: &str| {
        AgentError::Dependency(format!(
            "Rate provider response is missing a rate for {} ({} -> {})",
            code, from, to
        ))
    };

    if from == snapshot.base {
        return snapshot.rates.get(to).copied().ok_or_else(|| missing(to));
    }
    if to == snapshot.base {
        let from_rate = snapshot.rates.get(from).copied().ok_or_else(|| missing(from))?;
        return Ok(1.0 / from_rate);
    }

    let from_rate = snapshot.rates.get(from).copied().ok_or_else(|| missing(from))?;
    let to_rate = snapshot.rates.get(to).copied().ok_or_else(|| missing(to))?;
    Ok(to_rate / from_rate)
}

/// Round to 4 decimal places, half away from zero.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Currencies assumed supported when even the fallback list is unavailable.
const COMMON_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "INR", "SEK",
];

fn known_symbol(code: &str) -> Option<&'static str> {
    let symbol = match code {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "CAD" => "C$",
        "AUD" => "A$",
        "CHF" => "CHF",
        "CNY" => "¥",
        "INR" => "₹",
        "KRW" => "₩",
        "BRL" => "R$",
        "MXN" => "$",
        "RUB" => "₽",
        "TRY" => "₺",
        "ZAR" => "R",
        "NGN" => "₦",
        "PLN" => "zł",
        "SEK" => "kr",
        "NOK" => "kr",
        "DKK" => "kr",
        _ => return None,
    };
    Some(symbol)
}

/// Fixed fallback returned when the currency directory is unreachable.
fn fallback_currencies() -> Vec<CurrencyInfo> {
    let entries: &[(&str, &str)] = &[
        ("USD", "United States Dollar"),
        ("EUR", "Euro"),
        ("GBP", "British Pound Sterling"),
        ("JPY", "Japanese Yen"),
        ("CAD", "Canadian Dollar"),
        ("AUD", "Australian Dollar"),
        ("CHF", "Swiss Franc"),
        ("CNY", "Chinese Yuan"),
        ("INR", "Indian Rupee"),
        ("KRW", "South Korean Won"),
        ("BRL", "Brazilian Real"),
        ("MXN", "Mexican Peso"),
        ("RUB", "Russian Ruble"),
        ("TRY", "Turkish Lira"),
        ("ZAR", "South African Rand"),
        ("NGN", "Nigerian Naira"),
        ("PLN", "Polish Zloty"),
        ("SEK", "Swedish Krona"),
        ("NOK", "Norwegian Krone"),
        ("DKK", "Danish Krone"),
    ];

    entries
        .iter()
        .map(|(code, name)| CurrencyInfo {
            code: (*code).to_string(),
            name: (*name).to_string(),
            symbol: known_symbol(code).map(str::to_string),
        })
        .collect()
}
