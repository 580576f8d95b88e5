pub mod u101_extract_document;
pub mod u102_match_products;
