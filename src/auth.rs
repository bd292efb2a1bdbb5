//! Credentials for accounts created by the importers. Nobody logs in with them: imported
//! users reset their password before first use.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

const PASSWORD_LEN: usize = 32;
const SALT_LEN: usize = 12;

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Hash stored in `account.password`, in the `sha256$salt$digest` layout.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("sha256${salt}${}", STANDARD.encode(hasher.finalize()))
}

/// A fresh random password, hashed. The plain text is discarded.
pub fn generate_password_hash() -> String {
    hash_password(&random_string(PASSWORD_LEN), &random_string(SALT_LEN))
}
