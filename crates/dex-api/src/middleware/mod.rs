//! HTTP middleware shared by every route
//!
//! Author: hephaex@gmail.com

pub mod security_headers;

pub use security_headers::security_headers_middleware;
