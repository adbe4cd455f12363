use log::warn;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use totp_rs::{Algorithm, Secret, TOTP};
use url::Url;

/// Length of one TOTP window in seconds.
pub const PERIOD: u64 = 30;
/// Number of digits in a generated code.
pub const DIGITS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("invalid OTP secret: {0}")]
    InvalidSecret(String),
    #[error("unsupported OTP parameters: {0}")]
    Unsupported(String),
}

/// Code for one secret at one instant.
///
/// `period_start` is the first second of the window the code belongs to,
/// `time_remaining` counts the seconds left in that window (1..=30).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpResult {
    pub current_otp: String,
    pub time_remaining: u64,
    pub period_start: u64,
}

/// Source of wall-clock time in whole Unix seconds.
pub trait Clock {
    fn unix_now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> u64 {
        unix_seconds(OffsetDateTime::now_utc().unix_timestamp())
    }
}

fn unix_seconds(timestamp: i64) -> u64 {
    u64::try_from(timestamp).unwrap_or_else(|_| {
        warn!("system clock reads {timestamp}, before the Unix epoch; using 0");
        0
    })
}

pub fn window_index(at: u64) -> u64 {
    at / PERIOD
}

/// Seconds left in the window containing `at`. A value of 30 means the
/// window has just started.
pub fn time_remaining(at: u64) -> u64 {
    (PERIOD - at % PERIOD).min(PERIOD)
}

/// Computes the TOTP code (SHA1, 6 digits, 30 s step) for a Base32 secret.
pub fn compute(secret: &str, at: u64) -> Result<OtpResult, OtpError> {
    let bytes = decode_secret(secret)?;

    // unchecked: 80-bit secrets handed out by many providers are shorter
    // than the RFC 4226 recommendation but still valid TOTP seeds
    let totp = TOTP::new_unchecked(Algorithm::SHA1, DIGITS, 1, PERIOD, bytes);

    Ok(OtpResult {
        current_otp: totp.generate(at),
        time_remaining: time_remaining(at),
        period_start: window_index(at) * PERIOD,
    })
}

/// Canonical form of a Base32 secret: no whitespace, upper case, no padding.
pub fn normalize_secret(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect::<String>()
        .trim_end_matches('=')
        .to_string()
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, OtpError> {
    let normalized = normalize_secret(secret);
    if normalized.is_empty() {
        return Err(OtpError::InvalidSecret("secret is empty".to_string()));
    }

    // unpadded RFC 4648 groups end after 2, 4, 5, 7 or 8 characters
    if matches!(normalized.len() % 8, 1 | 3 | 6) {
        return Err(OtpError::InvalidSecret(format!(
            "base32 length {} is not a whole number of bytes",
            normalized.len()
        )));
    }

    let bytes = Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|e| OtpError::InvalidSecret(format!("not valid base32 ({e:?})")))?;

    if bytes.is_empty() {
        return Err(OtpError::InvalidSecret(
            "secret decoded to empty byte string".to_string(),
        ));
    }

    Ok(bytes)
}

/// Accepts either a raw Base32 secret or an `otpauth://totp/...` URL and
/// returns the normalized Base32 secret, validated against [`compute`].
pub fn parse_secret_input(input: &str) -> Result<String, OtpError> {
    let input = input.trim();

    let secret = if input.starts_with("otpauth://") {
        secret_from_url(input)?
    } else {
        input.to_string()
    };

    let secret = normalize_secret(&secret);
    decode_secret(&secret)?;
    Ok(secret)
}

fn secret_from_url(input: &str) -> Result<String, OtpError> {
    let url =
        Url::parse(input).map_err(|e| OtpError::InvalidSecret(format!("bad otpauth URL: {e}")))?;

    let kind = url.host_str().unwrap_or("").to_lowercase();
    if kind != "totp" {
        return Err(OtpError::Unsupported(format!(
            "otpauth type '{kind}', only 'totp' is supported"
        )));
    }

    let mut secret = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "secret" => secret = Some(v.to_string()),
            "algorithm" if !v.eq_ignore_ascii_case("SHA1") => {
                return Err(OtpError::Unsupported(format!("algorithm '{v}'")));
            }
            "digits" if v.parse::<usize>() != Ok(DIGITS) => {
                return Err(OtpError::Unsupported(format!("{v} digits")));
            }
            "period" if v.parse::<u64>() != Ok(PERIOD) => {
                return Err(OtpError::Unsupported(format!("period of {v}s")));
            }
            _ => {}
        }
    }

    secret.ok_or_else(|| OtpError::InvalidSecret("otpauth URL missing 'secret' param".to_string()))
}
