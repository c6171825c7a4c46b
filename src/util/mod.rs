//! Utility functions shared by the fetch and output layers.
//!
//! - **URL validation**: reject unusable feed source URLs before any request
//! - **Text sanitizing**: strip characters XML cannot represent

mod text;
mod url_validator;

pub use text::strip_control_chars;
pub use url_validator::{validate_feed_url, UrlValidationError};
