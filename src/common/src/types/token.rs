use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored credential record: username plus the PHC-encoded password
/// hash, loaded once at startup and immutable thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub encrypted_password: String,
}

/// Short-lived bearer credential issued on successful login. Valid while
/// `now < expire_at`; validity is re-checked on every lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub username: String,
    pub expire_at: DateTime<Utc>,
}
