use crate::domain::ports::market_data::{FeedError, MarketDataProvider};
use crate::domain::values::price_series::{PriceSeries, Sample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Intraday bars from the Yahoo Finance v8 chart API (no auth required).
pub struct YahooMarketData {
    range: String,
    interval: String,
    client: reqwest::Client,
}

impl YahooMarketData {
    pub fn new(range: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            interval: interval.into(),
            client: reqwest::Client::builder()
                .user_agent(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                     AppleWebKit/537.36 (KHTML, like Gecko) \
                     Chrome/120.0.0.0 Safari/537.36",
                )
                .build()
                .unwrap_or_default(),
        }
    }

    /// The instrument is pushed as one path segment, so reserved characters
    /// in a symbol are percent-encoded.
    fn url(&self, instrument: &str) -> Result<Url, FeedError> {
        let mut url = Url::parse(CHART_URL).map_err(|e| FeedError::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| FeedError::Config(format!("{CHART_URL} cannot take path segments")))?
            .push(instrument);
        url.query_pairs_mut()
            .append_pair("range", &self.range)
            .append_pair("interval", &self.interval);
        Ok(url)
    }
}

#[derive(Debug, serde::Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, serde::Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, serde::Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Zips timestamps with closes and volumes, dropping bars without a close.
/// A missing volume counts as zero.
fn to_series(instrument: &str, data: &ChartData) -> Result<PriceSeries, FeedError> {
    let quote = data
        .indicators
        .quote
        .first()
        .ok_or_else(|| FeedError::Parse(format!("No quote data for {instrument}")))?;

    let samples: Vec<Sample> = data
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let price = quote.close.get(i).copied().flatten()?;
            let timestamp = DateTime::<Utc>::from_timestamp(*ts, 0)?;
            let volume = quote.volume.get(i).copied().flatten().unwrap_or_default();
            Some(Sample { timestamp, price, volume })
        })
        .collect();

    if samples.is_empty() {
        return Err(FeedError::Parse(format!("No price bars for {instrument}")));
    }
    let series = PriceSeries::from_samples(instrument, &samples);
    series
        .validate()
        .map_err(|e| FeedError::Parse(e.to_string()))?;
    Ok(series)
}

#[async_trait]
impl MarketDataProvider for YahooMarketData {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    async fn fetch_series(&self, instrument: &str) -> Result<PriceSeries, FeedError> {
        let resp = self
            .client
            .get(self.url(instrument)?)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FeedError::Network(format!(
                "Yahoo API returned {} for {instrument}",
                resp.status()
            )));
        }

        let data: ChartResponse = resp
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;

        if let Some(err) = data.chart.error {
            return Err(FeedError::Parse(format!("Yahoo error: {err}")));
        }

        let results = data
            .chart
            .result
            .ok_or_else(|| FeedError::Parse("No chart results".into()))?;
        let first = results
            .first()
            .ok_or_else(|| FeedError::Parse("Empty chart results".into()))?;
        to_series(instrument, first)
    }
}
