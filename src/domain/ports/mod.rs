pub mod market_data;
pub mod notifier;
pub mod trade_store;
