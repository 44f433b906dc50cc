//! Integration tests run against a mock API server

mod api_tests;
mod crawl_tests;
