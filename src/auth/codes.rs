use rand::{distributions::Alphanumeric, Rng};

pub const CODE_LENGTH: usize = 4;
pub const VERIFICATION_CODE_MINUTES: i64 = 30;
pub const LOGIN_CODE_MINUTES: i64 = 10;

/// Code accepted for registration confirmation when running in debug mode.
pub const DEBUG_BYPASS_CODE: &str = "0000";

pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Random slug made of ASCII letters and digits.
pub fn random_slug(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_short_and_alphanumeric() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn slugs_have_requested_length() {
        assert_eq!(random_slug(10).len(), 10);
    }
}
