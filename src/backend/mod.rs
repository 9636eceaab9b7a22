//! Transport backends implementing the HTTP capability.

mod curl_request;

pub use curl_request::{CurlClient, CurlRequest};
