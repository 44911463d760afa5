//! Masking helpers for showing secrets in logs and terminals
//!
//! The secret itself travels as `secrecy::SecretString`; `mask_secret`
//! produces the redacted form that is safe to print.

/// Secrets shorter than this are fully masked
const MIN_PARTIAL_LEN: usize = 10;

/// Characters kept visible at each end of a long secret
const VISIBLE_CHARS: usize = 3;

/// Masks a secret for safe display
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Secrets shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use passask::mask_secret;
///
/// assert_eq!(mask_secret("abcdef123456"), "abc...456");
/// assert_eq!(mask_secret("short"), "****");
/// ```
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < MIN_PARTIAL_LEN {
        return "****".to_string();
    }

    let prefix: String = chars[..VISIBLE_CHARS].iter().collect();
    let suffix: String = chars[chars.len() - VISIBLE_CHARS..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret_with_short_secret() {
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret(""), "****");
    }

    #[test]
    fn test_mask_secret_with_long_secret() {
        assert_eq!(mask_secret("abcdef123456"), "abc...456");
        assert_eq!(mask_secret("very-long-token-string"), "ver...ing");
    }

    #[test]
    fn test_mask_secret_counts_characters_not_bytes() {
        assert_eq!(mask_secret("пароль-секрет"), "пар...рет");
    }
}
