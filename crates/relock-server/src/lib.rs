pub mod config;
pub mod indexer_http;
pub mod rest;
