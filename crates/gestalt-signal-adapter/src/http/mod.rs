/*
[INPUT]:  HTTP client configuration and auth API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;

pub use error::{GestaltError, Result};

pub use client::{ClientConfig, GestaltClient};
