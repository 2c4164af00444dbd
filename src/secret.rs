//! Root Key Password Generation
//!
//! Generates the high-entropy password protecting the CA root key. Every
//! enabled character class is guaranteed to appear at least once.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
pub const NUMERIC: &str = "0123456789";
pub const SPECIAL: &str = "!@#$%&*()-_=+[]{}<>:?";

/// Length of the CA root key password
pub const ROOT_KEY_PASSWORD_LENGTH: usize = 32;

/// Which characters a generated password may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub length: usize,
    #[serde(default = "enabled")]
    pub upper: bool,
    #[serde(default = "enabled")]
    pub lower: bool,
    #[serde(default = "enabled")]
    pub numeric: bool,
    #[serde(default = "enabled")]
    pub special: bool,
}

fn enabled() -> bool {
    true
}

impl PasswordPolicy {
    /// All character classes enabled
    pub fn new(length: usize) -> Self {
        Self {
            length,
            upper: true,
            lower: true,
            numeric: true,
            special: true,
        }
    }

    /// Policy used for the CA root key
    pub fn root_key() -> Self {
        Self::new(ROOT_KEY_PASSWORD_LENGTH)
    }

    pub fn special(mut self, special: bool) -> Self {
        self.special = special;
        self
    }

    fn classes(&self) -> Vec<&'static str> {
        [
            (self.upper, UPPER),
            (self.lower, LOWER),
            (self.numeric, NUMERIC),
            (self.special, SPECIAL),
        ]
        .into_iter()
        .filter_map(|(on, set)| on.then_some(set))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password policy enables no character classes")]
    NoCharacterClasses,

    #[error("password length {length} cannot hold one of each of {classes} character classes")]
    TooShort { length: usize, classes: usize },
}

/// Generate a password from `rng`
pub fn generate_password<R: Rng + ?Sized>(
    policy: &PasswordPolicy,
    rng: &mut R,
) -> Result<String, PasswordError> {
    let classes = policy.classes();
    if classes.is_empty() {
        return Err(PasswordError::NoCharacterClasses);
    }
    if policy.length < classes.len() {
        return Err(PasswordError::TooShort {
            length: policy.length,
            classes: classes.len(),
        });
    }

    let pick = |set: &str, rng: &mut R| -> char {
        let bytes = set.as_bytes();
        char::from(bytes[rng.gen_range(0..bytes.len())])
    };

    let mut chars: Vec<char> = classes.iter().map(|set| pick(*set, rng)).collect();
    let alphabet: String = classes.concat();
    while chars.len() < policy.length {
        chars.push(pick(&alphabet, rng));
    }
    chars.shuffle(rng);

    debug!(length = policy.length, classes = classes.len(), "Generated password");
    Ok(chars.into_iter().collect())
}

/// Generate a password from the operating system's RNG
pub fn generate_secure_password(policy: &PasswordPolicy) -> Result<String, PasswordError> {
    generate_password(policy, &mut OsRng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn has_any(password: &str, set: &str) -> bool {
        password.chars().any(|c| set.contains(c))
    }

    #[test]
    fn test_root_key_password_shape() {
        let password = generate_secure_password(&PasswordPolicy::root_key()).unwrap();
        assert_eq!(password.len(), 32);
        assert!(has_any(&password, UPPER));
        assert!(has_any(&password, LOWER));
        assert!(has_any(&password, NUMERIC));
        assert!(has_any(&password, SPECIAL));
    }

    #[test]
    fn test_minimum_length_still_covers_every_class() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let password = generate_password(&PasswordPolicy::new(4), &mut rng).unwrap();
            assert!(has_any(&password, UPPER));
            assert!(has_any(&password, LOWER));
            assert!(has_any(&password, NUMERIC));
            assert!(has_any(&password, SPECIAL));
        }
    }

    #[test]
    fn test_special_disabled() {
        let mut rng = StdRng::seed_from_u64(1);
        let password = generate_password(&PasswordPolicy::new(64).special(false), &mut rng).unwrap();
        assert!(!has_any(&password, SPECIAL));
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generate_password(&PasswordPolicy::root_key(), &mut StdRng::seed_from_u64(42));
        let b = generate_password(&PasswordPolicy::root_key(), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_policies() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            generate_password(&PasswordPolicy::new(3), &mut rng),
            Err(PasswordError::TooShort {
                length: 3,
                classes: 4
            })
        );

        let none = PasswordPolicy {
            length: 8,
            upper: false,
            lower: false,
            numeric: false,
            special: false,
        };
        assert_eq!(
            generate_password(&none, &mut rng),
            Err(PasswordError::NoCharacterClasses)
        );
    }
}
