//! Canonical message construction and `Authorization` header formatting.
//!
//! Every APIv3 signature, outbound or inbound, covers a canonical message:
//! an ordered list of string fields, each terminated by a line feed. The
//! request message carries five fields (method, request-target, timestamp,
//! nonce, body) and the response message three (timestamp, nonce, body). No
//! escaping is performed; the signature covers the exact bytes that were sent
//! or received, so callers are responsible for byte fidelity.

use rand::{distributions::Alphanumeric, Rng};

/// Authorization scheme name of the APIv3 protocol.
pub const AUTH_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Default length of a generated nonce string.
pub const DEFAULT_NONCE_LENGTH: usize = 32;

/// Joins the given fields with a line feed, appending a trailing line feed.
///
/// `["a", "b"]` becomes `"a\nb\n"`. This is the only canonicalization the
/// protocol performs; raw bytes pass through untouched.
pub fn joined_by_line_feed<I, S>(pieces: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for piece in pieces {
        joined.push_str(piece.as_ref());
        joined.push('\n');
    }
    joined
}

/// Builds the canonical message an outbound request signature covers.
///
/// `body` must be the empty string for requests without a replayable body
/// (GET requests, streamed uploads).
///
/// # Examples
///
/// ```
/// use wechatpay_apiv3::formatter;
///
/// let message = formatter::request_message("POST", "/v3/pay", "1700000000", "abc", "{}");
/// assert_eq!(message, "POST\n/v3/pay\n1700000000\nabc\n{}\n");
/// ```
#[must_use]
pub fn request_message(
    method: &str,
    target: &str,
    timestamp: &str,
    nonce: &str,
    body: &str,
) -> String {
    joined_by_line_feed([method, target, timestamp, nonce, body])
}

/// Builds the canonical message an inbound response signature covers.
///
/// `timestamp` and `nonce` are the raw header values, not re-rendered
/// integers, since the signature covers the bytes the platform sent.
#[must_use]
pub fn response_message(timestamp: &str, nonce: &str, body: &str) -> String {
    joined_by_line_feed([timestamp, nonce, body])
}

/// Generates a random alphanumeric nonce of the given length.
///
/// Drawn from a cryptographically secure generator over `[0-9a-zA-Z]`.
#[must_use]
pub fn nonce(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Returns the current Unix timestamp in seconds.
#[must_use]
pub fn timestamp() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        // Pre-epoch clocks only occur on badly misconfigured hosts; the
        // signed value still round-trips through the header as a string.
        Err(backwards) => -(backwards.duration().as_secs() as i64),
    }
}

/// Renders the `Authorization` header value.
///
/// Field order is part of the wire contract:
/// `mchid`, `nonce_str`, `signature`, `timestamp`, `serial_no`.
#[must_use]
pub fn authorization(
    mchid: &str,
    nonce: &str,
    signature: &str,
    timestamp: &str,
    serial_no: &str,
) -> String {
    format!(
        "{AUTH_SCHEME} mchid=\"{mchid}\",nonce_str=\"{nonce}\",signature=\"{signature}\",\
         timestamp=\"{timestamp}\",serial_no=\"{serial_no}\""
    )
}

/// Renders sorted key/value pairs as `k1=v1&k2=v2`, the canonical form the
/// legacy APIv2 keyed-hash signature covers.
///
/// Pairs with an empty value and the reserved `sign` key are skipped, and the
/// caller-supplied order must already be bytewise-sorted (a `BTreeMap`
/// guarantees this).
pub fn query_string_like<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut rendered = String::new();
    for (key, value) in pairs {
        if value.is_empty() || key == "sign" {
            continue;
        }
        if !rendered.is_empty() {
            rendered.push('&');
        }
        rendered.push_str(key);
        rendered.push('=');
        rendered.push_str(value);
    }
    rendered
}

/// Truncates a signature or other long credential for log output.
pub(crate) fn redact(value: &str) -> String {
    const VISIBLE: usize = 8;
    if value.len() <= VISIBLE {
        value.to_owned()
    } else {
        let head: String = value.chars().take(VISIBLE).collect();
        format!("{head}…")
    }
}
