pub mod executor;
pub mod matching_api_client;
