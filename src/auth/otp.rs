use rand::Rng;

pub const DEFAULT_OTP_LENGTH: usize = 6;
pub const DEFAULT_OTP_CHARSET: &str = "0123456789";

/// Generate a one-time code of `length` characters drawn uniformly, with
/// replacement, from `charset`.
///
/// Not hardened: storage, expiry and attempt limits belong to the host's
/// `on_otp_request` / `verify_otp` callbacks. An empty charset yields an
/// empty string.
pub fn generate_otp(length: usize, charset: &str) -> String {
    let alphabet: Vec<char> = charset.chars().collect();
    if alphabet.is_empty() {
        return String::new();
    }

    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// Six decimal digits.
pub fn generate_default_otp() -> String {
    generate_otp(DEFAULT_OTP_LENGTH, DEFAULT_OTP_CHARSET)
}
