pub mod static_data;
pub mod yahoo;
