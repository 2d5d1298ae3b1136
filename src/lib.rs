pub mod article;
pub mod download;
pub mod fetcher;
pub mod images;
pub mod pipeline;
pub mod sanitize;
