use crate::error::{StoreError, StoreResult};
use crate::policy::{resolve_principal, Principal};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rusqlite::{Connection, OptionalExtension};
use std::sync::OnceLock;

pub fn hash_password(password: &str) -> StoreResult<String> {
    if password.is_empty() {
        return Err(StoreError::validation("password must not be empty"));
    }
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| StoreError::Credential(format!("salt generation failed: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| StoreError::Credential(format!("salt encoding failed: {e}")))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::Credential(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// A hash with the live parameters, verified against when the username is
/// unknown so both rejections cost one argon2 run.
fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password("rollbook-decoy").ok())
        .as_deref()
}

/// Checks a username/password pair. Unknown users and bad passwords are
/// indistinguishable to the caller.
pub fn login(conn: &Connection, username: &str, password: &str) -> StoreResult<Option<Principal>> {
    let hash: Option<String> = conn
        .query_row(
            "SELECT password_hash FROM accounts WHERE username = ?",
            [username],
            |r| r.get(0),
        )
        .optional()?;
    let Some(hash) = hash else {
        if let Some(decoy) = decoy_hash() {
            let _ = verify_password(decoy, password);
        }
        tracing::info!(user = username, "login rejected: unknown user");
        return Ok(None);
    };
    if !verify_password(&hash, password) {
        tracing::info!(user = username, "login rejected: bad password");
        return Ok(None);
    }
    resolve_principal(conn, username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_phc_strings() {
        let a = hash_password("hunter2").expect("hash");
        let b = hash_password("hunter2").expect("hash");
        assert!(a.starts_with("$argon2"));
        assert_ne!(a, b);
        assert!(!a.contains("hunter2"));
        assert!(verify_password(&a, "hunter2"));
        assert!(verify_password(&b, "hunter2"));
        assert!(!verify_password(&a, "hunter3"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("hunter2", "hunter2"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(matches!(hash_password(""), Err(StoreError::Validation(_))));
    }

    fn params_of(phc: &str) -> String {
        // $argon2id$v=19$m=..,t=..,p=..$salt$hash
        phc.split('$').take(4).collect::<Vec<_>>().join("$")
    }

    #[test]
    fn unknown_users_are_checked_against_a_same_cost_hash() {
        let decoy = decoy_hash().expect("decoy hash");
        let real = hash_password("anything").expect("hash");
        assert_eq!(params_of(decoy), params_of(&real));
        assert!(PasswordHash::new(decoy).is_ok());
        assert!(std::ptr::eq(decoy, decoy_hash().expect("decoy hash")));
    }

    #[test]
    fn login_checks_the_stored_hash() {
        let conn = Connection::open_in_memory().expect("memory db");
        crate::db::init_schema(&conn).expect("schema");
        let hash = hash_password("s3cret").expect("hash");
        conn.execute(
            "INSERT INTO accounts(username, password_hash, role) VALUES('boss', ?, 'principal')",
            [&hash],
        )
        .expect("insert account");

        let p = login(&conn, "boss", "s3cret").expect("login").expect("principal");
        assert_eq!(p.username, "boss");
        assert!(login(&conn, "boss", "wrong").expect("login").is_none());
        assert!(login(&conn, "ghost", "s3cret").expect("login").is_none());
    }
}
