use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;
use rand::rngs::OsRng;

use taskwarden_core::id::UserId;

pub const KEY_PREFIX: &str = "taskwarden";

const KEY_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const KEY_ID_LEN: usize = 8;
const SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid api key format")]
    InvalidKeyFormat,

    #[error("unknown api key")]
    UnknownKey,

    #[error("api key has been revoked")]
    RevokedKey,

    #[error("unknown user")]
    UnknownUser,

    #[error("internal authentication error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub key_id: String,
    pub key_hash: String,
    pub user_id: UserId,
    pub revoked: bool,
}

/// The user an API key belongs to. The role is resolved separately from the
/// current user record.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: UserId,
    pub key_id: String,
}

/// Splits `taskwarden_<key_id>_<secret>`. The secret may itself contain `_`.
pub fn parse_api_key(raw_key: &str) -> Result<(&str, &str), AuthError> {
    let mut parts = raw_key.splitn(3, '_');
    let (Some(prefix), Some(key_id), Some(secret)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidKeyFormat);
    };
    if prefix != KEY_PREFIX || key_id.is_empty() || secret.is_empty() {
        return Err(AuthError::InvalidKeyFormat);
    }
    Ok((key_id, secret))
}

pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// Returns `(full_key, key_id, secret)`. Only the argon2 hash of the secret is
/// ever persisted.
pub fn generate_api_key() -> (String, String, String) {
    let key_id = random_token(KEY_ID_LEN);
    let secret = random_token(SECRET_LEN);
    let full_key = format!("{KEY_PREFIX}_{key_id}_{secret}");
    (full_key, key_id, secret)
}

pub fn authenticate(
    raw_key: &str,
    lookup: impl FnOnce(&str) -> Option<ApiKeyRecord>,
) -> Result<Principal, AuthError> {
    let (key_id, secret) = parse_api_key(raw_key)?;

    let record = lookup(key_id).ok_or(AuthError::UnknownKey)?;

    if record.revoked {
        return Err(AuthError::RevokedKey);
    }

    if !verify_secret(secret, &record.key_hash)? {
        return Err(AuthError::UnknownKey);
    }

    Ok(Principal {
        user_id: record.user_id,
        key_id: record.key_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_for(key_id: &str, secret: &str, revoked: bool) -> ApiKeyRecord {
        ApiKeyRecord {
            key_id: key_id.to_string(),
            key_hash: hash_secret(secret).unwrap(),
            user_id: UserId::generate(),
            revoked,
        }
    }

    #[test]
    fn parse_valid_api_key() {
        let (key_id, secret) = parse_api_key("taskwarden_abc123_secretvalue").unwrap();
        assert_eq!(key_id, "abc123");
        assert_eq!(secret, "secretvalue");
    }

    #[test]
    fn parse_keeps_underscores_in_secret() {
        let (_, secret) = parse_api_key("taskwarden_abc_sec_ret").unwrap();
        assert_eq!(secret, "sec_ret");
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        let result = parse_api_key("kraken_abc_secret");
        assert!(matches!(result, Err(AuthError::InvalidKeyFormat)));
    }

    #[test]
    fn parse_rejects_too_few_parts() {
        let result = parse_api_key("taskwarden_onlyone");
        assert!(matches!(result, Err(AuthError::InvalidKeyFormat)));
    }

    #[test]
    fn parse_rejects_empty_key_id() {
        let result = parse_api_key("taskwarden__secret");
        assert!(matches!(result, Err(AuthError::InvalidKeyFormat)));
    }

    #[test]
    fn hash_and_verify_secret() {
        let hash = hash_secret("mysecret").unwrap();
        assert!(verify_secret("mysecret", &hash).unwrap());
        assert!(!verify_secret("wrongsecret", &hash).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_secret("x", "not-a-phc-string"),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn generated_key_parses_back_into_its_parts() {
        let (full_key, key_id, secret) = generate_api_key();
        assert!(full_key.starts_with("taskwarden_"));
        assert_eq!(key_id.len(), KEY_ID_LEN);
        assert_eq!(secret.len(), SECRET_LEN);

        let (parsed_id, parsed_secret) = parse_api_key(&full_key).unwrap();
        assert_eq!(parsed_id, key_id);
        assert_eq!(parsed_secret, secret);
    }

    #[test]
    fn authenticate_resolves_owning_user() {
        let (full_key, key_id, secret) = generate_api_key();
        let record = record_for(&key_id, &secret, false);
        let owner = record.user_id;

        let principal = authenticate(&full_key, |_| Some(record)).unwrap();
        assert_eq!(principal.user_id, owner);
        assert_eq!(principal.key_id, key_id);
    }

    #[test]
    fn authenticate_rejects_revoked_key() {
        let (full_key, key_id, secret) = generate_api_key();
        let record = record_for(&key_id, &secret, true);

        let result = authenticate(&full_key, |_| Some(record));
        assert!(matches!(result, Err(AuthError::RevokedKey)));
    }

    #[test]
    fn authenticate_rejects_unknown_key() {
        let result = authenticate("taskwarden_unknown_secret", |_| None);
        assert!(matches!(result, Err(AuthError::UnknownKey)));
    }

    #[test]
    fn authenticate_rejects_wrong_secret() {
        let record = record_for("testid", "correct_secret", false);

        let result = authenticate("taskwarden_testid_wrong_secret", |_| Some(record));
        assert!(matches!(result, Err(AuthError::UnknownKey)));
    }
}
