use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use uuid::Uuid;

use warden_common::constants::TOKEN_TTL_MINUTES;
use warden_common::types::{Account, Token};

/// Verifying against this precomputed hash gives unknown usernames the
/// same work profile as real ones, so auth timing does not reveal
/// whether an account exists.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy", &salt)
        .expect("hashing a fixed password with a fresh salt")
        .to_string()
});

/// Account lookup, credential checks and bearer-token issuance.
///
/// Accounts are immutable after construction. Tokens are evicted lazily:
/// the first lookup that finds one expired removes it, and nothing else
/// does.
pub struct AuthStore {
    password_hashes: HashMap<String, String>,
    tokens: Mutex<HashMap<String, Token>>,
}

pub fn load_accounts(shadow_path: &Path) -> Result<Vec<Account>> {
    let data = std::fs::read_to_string(shadow_path)
        .with_context(|| format!("read shadow file {}", shadow_path.display()))?;
    parse_shadow(&data).with_context(|| format!("parse shadow file {}", shadow_path.display()))
}

pub fn parse_shadow(data: &str) -> Result<Vec<Account>> {
    data.lines().map(parse_shadow_line).collect()
}

fn parse_shadow_line(line: &str) -> Result<Account> {
    let Some((username, hash)) = line.split_once(':') else {
        bail!("bad shadow line {line}");
    };
    Ok(Account {
        username: username.to_string(),
        encrypted_password: hash.to_string(),
    })
}

impl AuthStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        let password_hashes = accounts
            .into_iter()
            .map(|account| (account.username, account.encrypted_password))
            .collect();
        AuthStore {
            password_hashes,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Checks a password. Every call performs exactly one argon2
    /// verification; for unknown usernames it runs against [`DUMMY_HASH`]
    /// and the answer is unconditionally `false`. A mismatch on a known
    /// account is `Ok(false)`; any other verifier failure propagates.
    pub fn auth(&self, username: &str, password: &str) -> Result<bool> {
        let stored = self.password_hashes.get(username);
        let hash = stored.map(String::as_str).unwrap_or_else(|| &DUMMY_HASH);
        let parsed = PasswordHash::new(hash)
            .map_err(|err| anyhow!("stored hash for {username} is unusable: {err}"))?;
        let outcome = Argon2::default().verify_password(password.as_bytes(), &parsed);
        if stored.is_none() {
            return Ok(false);
        }
        match outcome {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(err) => Err(anyhow!("verify password for {username}: {err}")),
        }
    }

    pub fn create_token(&self, username: &str) -> Token {
        self.create_token_at(username, Utc::now())
    }

    pub fn find_valid_token(&self, id: &str) -> Option<Token> {
        self.find_valid_token_at(id, Utc::now())
    }

    fn expire_at(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(TOKEN_TTL_MINUTES)
    }

    fn create_token_at(&self, username: &str, now: DateTime<Utc>) -> Token {
        let token = Token {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            expire_at: Self::expire_at(now),
        };
        self.tokens
            .lock()
            .unwrap()
            .insert(token.id.clone(), token.clone());
        token
    }

    fn find_valid_token_at(&self, id: &str, now: DateTime<Utc>) -> Option<Token> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens.get(id)?;
        if token.expire_at <= now {
            // Lookup is the only place expiry is enforced.
            tokens.remove(id);
            return None;
        }
        Some(token.clone())
    }
}

/// Offline provisioning helper: a storable `username:hash` line for the
/// shadow file. Not reachable over the operation surface.
pub fn register(username: &str, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("hash password: {err}"))?;
    Ok(format!("{username}:{hash}"))
}
