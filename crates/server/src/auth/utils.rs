use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::RequestError;
use crate::models::session::SessionId;

pub const SESSION_TOKEN_BYTES: usize = 32;

pub fn hash_password(password: &str) -> Result<String, RequestError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| RequestError::BadCredentials)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn generate_token() -> [u8; SESSION_TOKEN_BYTES] {
    rand::random()
}

/// Only digests are stored, a leaked sessions table cannot be replayed
pub fn token_digest(token: &[u8]) -> Vec<u8> {
    let mut hash = Sha256::new();
    hash.update(token);
    hash.finalize().to_vec()
}

pub fn digests_match(provided: &[u8], stored: &[u8]) -> bool {
    provided.ct_eq(stored).into()
}

pub fn pack_session_id_and_token(session_id: &SessionId, token: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(16 + token.len());
    packed.extend_from_slice(session_id.as_bytes());
    packed.extend_from_slice(token);
    packed
}

pub fn unpack_session_id_and_token(packed: &[u8]) -> Option<(SessionId, &[u8])> {
    if packed.len() <= 16 {
        return None;
    }
    let sid = Uuid::from_slice(&packed[..16]).ok()?;
    Some((sid, &packed[16..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        let sid = Uuid::new_v4();
        let token = generate_token();
        let packed = pack_session_id_and_token(&sid, &token);
        let (unpacked_sid, unpacked_token) = unpack_session_id_and_token(&packed).unwrap();
        assert_eq!(unpacked_sid, sid);
        assert_eq!(unpacked_token, token);
    }

    #[test]
    fn unpack_rejects_truncated_input() {
        assert!(unpack_session_id_and_token(&[]).is_none());
        assert!(unpack_session_id_and_token(&[0u8; 16]).is_none());
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("kobrabor42").unwrap();
        assert!(verify_password("kobrabor42", &hash));
        assert!(!verify_password("bobrabor42", &hash));
        assert!(!verify_password("kobrabor42", "not-a-phc-string"));
    }

    #[test]
    fn digest_comparison() {
        let token = generate_token();
        let digest = token_digest(&token);
        assert!(digests_match(&token_digest(&token), &digest));
        assert!(!digests_match(&token_digest(&generate_token()), &digest));
    }
}
