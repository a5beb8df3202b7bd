pub mod curl;

pub use curl::{looks_like_curl, parse_curl, CurlCredentials};
