//! Secret masking for log output.

/// Masks a credential for safe logging: shows the first 2 chars + "***" + the last 2 chars.
/// If length <= 8, returns "***" so short passwords leak nothing.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();
    if len <= 8 {
        "***".to_string()
    } else {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[len - 2..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
