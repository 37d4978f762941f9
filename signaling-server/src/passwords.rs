//! Password hashing and verification using a modern, salted scheme.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

pub fn hash_password(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("argon2 hashing of a user-supplied password never fails")
        .to_string()
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verify_correctly() {
        let hash_a = hash_password("hunter2");
        let hash_b = hash_password("hunter2");
        assert_ne!(hash_a, hash_b, "identical passwords should get distinct salts");
        assert!(verify_password("hunter2", &hash_a));
        assert!(verify_password("hunter2", &hash_b));
        assert!(!verify_password("wrong", &hash_a));
    }
}
