pub mod extraction_api_client;
