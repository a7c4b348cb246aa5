//! OAuth 1.0a request signing (HMAC-SHA1, `Authorization` header).
//!
//! The signature base string covers the request method, the base URL and every
//! query and form parameter, as laid out in RFC 5849 section 3.4.1.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Key/secret pair identifying this application to the wiki farm.
#[derive(Debug, Clone)]
pub struct ConsumerToken {
    pub key: String,
    pub secret: String,
}

/// Key/secret pair granted to the caller after the OAuth handshake.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub key: String,
    pub secret: String,
}

/// Everything needed to sign calls on behalf of one caller.
///
/// Built per inbound request and handed to the remote caller; never stored globally.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub consumer: ConsumerToken,
    pub access: AccessToken,
}

impl CallerContext {
    pub fn new(consumer: ConsumerToken, access: AccessToken) -> Self {
        Self { consumer, access }
    }

    pub fn signer(&self) -> OAuthSigner {
        OAuthSigner {
            context: self.clone(),
        }
    }
}

/// Produces `Authorization: OAuth ...` header values.
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    context: CallerContext,
}

impl OAuthSigner {
    /// Sign a request. Query parameters are read from `url`; `form` holds body parameters.
    pub fn authorization_header(&self, method: &str, url: &Url, form: &[(&str, &str)]) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, form, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        form: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth_params = vec![
            ("oauth_consumer_key", self.context.consumer.key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.context.access.key.as_str()),
            ("oauth_version", "1.0"),
        ];

        let base = signature_base_string(method, url, form, &oauth_params);
        let signature = self.sign(&base);
        oauth_params.push(("oauth_signature", &signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {}", fields)
    }

    fn sign(&self, base: &str) -> String {
        let key = format!(
            "{}&{}",
            percent_encode(&self.context.consumer.secret),
            percent_encode(&self.context.access.secret)
        );
        // HMAC accepts keys of any length
        let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC key should be valid");
        mac.update(base.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

/// Build the signature base string.
fn signature_base_string(
    method: &str,
    url: &Url,
    form: &[(&str, &str)],
    oauth_params: &[(&str, &str)],
) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .collect();
    params.extend(
        form.iter()
            .chain(oauth_params.iter())
            .map(|(k, v)| (percent_encode(k), percent_encode(v))),
    );
    params.sort();

    let normalized = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_url(url)),
        percent_encode(&normalized)
    )
}

/// Scheme, authority and path; default ports are omitted by `Url` already.
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// RFC 3986 percent-encoding; only unreserved characters pass through.
fn percent_encode(value: &str) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(b as char);
            }
            _ => {
                let _ = write!(result, "%{:02X}", b);
            }
        }
    }
    result
}
