//! VM name generation

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Length of the random part of generated VM names
pub const SUFFIX_LEN: usize = 8;

/// Random lowercase alphanumeric string of exactly `size` characters.
///
/// Drawn from the URL-safe base64 alphabet with `-` and `_` removed and
/// letters folded to lowercase, which is safe for VM and host names.
pub fn random_suffix(size: usize) -> String {
    let mut rng = rand::rng();
    loop {
        let mut bytes = vec![0u8; size];
        rng.fill_bytes(&mut bytes);

        let candidate: String = URL_SAFE_NO_PAD
            .encode(&bytes)
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if candidate.len() >= size {
            return candidate[..size].to_string();
        }
    }
}

/// `<prefix>-<8 random chars>`; collisions are not checked
pub fn vm_name(prefix: &str) -> String {
    format!("{}-{}", prefix, random_suffix(SUFFIX_LEN))
}
