use crate::domain::error::DomainError;
use crate::domain::values::price_series::PriceSeries;
use async_trait::async_trait;

/// Supplies already-fetched price/volume windows, one instrument at a time.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    async fn fetch_series(&self, instrument: &str) -> Result<PriceSeries, FeedError>;
}

#[derive(Debug)]
pub enum FeedError {
    /// HTTP or network error
    Network(String),
    /// Response parsing error
    Parse(String),
    /// Unknown instrument or missing provider settings
    Config(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Network(msg) => write!(f, "Network error: {msg}"),
            FeedError::Parse(msg) => write!(f, "Parse error: {msg}"),
            FeedError::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {}

impl From<FeedError> for DomainError {
    fn from(e: FeedError) -> Self {
        DomainError::MarketData(e.to_string())
    }
}
