/*
[INPUT]:  Auth API request schema
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When auth request bodies change
*/

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/challenge`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub address: String,
}

/// Body of `POST /auth/verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub address: String,
    pub signature: String,
}
