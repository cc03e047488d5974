//! Sealed secret cookie.
//!
//! The secret travels in a cookie whose value is
//! `<issued_at_unix_secs>|<base64url(secret)>`, either signed (HMAC) or
//! encrypted (AEAD) with a key derived from the 32-byte master key. The
//! cookie name is bound into the seal, so a value cannot be replayed under
//! another name. Anything that fails authentication is rejected whole.

use crate::config::{CookieProtection, CsrfConfig, KEY_LEN};
use crate::error::ConfigError;
use crate::secret::Secret;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cookie::{Cookie, CookieJar, Key, SameSite};
use http::{header, HeaderMap};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

/// Sealing failed. The request cannot be served safely.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    /// The system clock reads earlier than the unix epoch.
    #[error("system clock is before the unix epoch")]
    Clock,

    /// The cookie jar did not yield the sealed cookie.
    #[error("sealed cookie missing from jar")]
    Jar,
}

/// Why a cookie value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UnsealError {
    /// Authentication (or decryption) failed.
    #[error("cookie authentication failed")]
    Forged,

    /// Authenticated, but the payload is not a timestamp and secret.
    #[error("cookie payload malformed")]
    Malformed,

    /// Older than the configured max-age.
    #[error("cookie expired")]
    Expired,
}

/// A successfully unsealed cookie.
#[derive(Debug, Clone)]
pub struct Unsealed {
    /// The secret.
    pub secret: Secret,
    /// When the value was sealed, in seconds since the unix epoch.
    pub issued_at: u64,
}

/// Seals secrets into cookies and unseals them back.
#[derive(Clone)]
pub struct CookieStore {
    key: Key,
    name: String,
    domain: Option<String>,
    path: String,
    max_age: Duration,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
    protection: CookieProtection,
}

impl CookieStore {
    /// Build a store from the cookie settings of `config`.
    pub fn new(config: &CsrfConfig) -> Result<Self, ConfigError> {
        if config.key.len() != KEY_LEN {
            return Err(ConfigError::KeyLength {
                expected: KEY_LEN,
                actual: config.key.len(),
            });
        }

        Ok(Self {
            key: Key::derive_from(&config.key),
            name: config.cookie_name.clone(),
            domain: config.cookie_domain.clone(),
            path: config.cookie_path.clone(),
            max_age: config.cookie_max_age,
            secure: config.cookie_secure,
            http_only: config.cookie_http_only,
            same_site: config.cookie_same_site,
            protection: config.protection,
        })
    }

    /// Name of the cookie.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seal `secret` into a cookie value.
    pub fn seal(&self, secret: &Secret) -> Result<String, SealError> {
        self.seal_at(secret, SystemTime::now())
            .map(|cookie| cookie.value().to_owned())
    }

    /// Recover the secret from a sealed cookie value.
    pub fn unseal(&self, value: &str) -> Result<Unsealed, UnsealError> {
        self.unseal_at(value, SystemTime::now())
    }

    /// Build the response cookie carrying `secret` with all configured attributes.
    pub fn issue(&self, secret: &Secret) -> Result<Cookie<'static>, SealError> {
        self.seal_at(secret, SystemTime::now())
    }

    /// All values sent under the cookie name, in header order.
    pub fn read(&self, headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .filter(|cookie| cookie.name() == self.name)
            .map(|cookie| cookie.value().to_owned())
            .collect()
    }

    /// Whether a valid cookie is old enough to be re-issued.
    ///
    /// Cookies are refreshed during the second half of their lifetime.
    /// Session cookies (zero max-age) are never refreshed.
    pub fn needs_refresh(&self, unsealed: &Unsealed) -> bool {
        self.needs_refresh_at(unsealed, SystemTime::now())
    }

    pub(crate) fn needs_refresh_at(&self, unsealed: &Unsealed, now: SystemTime) -> bool {
        if self.max_age.is_zero() {
            return false;
        }

        let age = unix_secs(now).saturating_sub(unsealed.issued_at);
        age > self.max_age.as_secs() / 2
    }

    pub(crate) fn seal_at(
        &self,
        secret: &Secret,
        now: SystemTime,
    ) -> Result<Cookie<'static>, SealError> {
        let issued_at = now
            .duration_since(UNIX_EPOCH)
            .map_err(|_| SealError::Clock)?
            .as_secs();
        let payload = format!("{}|{}", issued_at, URL_SAFE_NO_PAD.encode(secret.as_bytes()));

        let mut builder = Cookie::build((self.name.clone(), payload))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        if !self.max_age.is_zero() {
            let seconds = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
            builder = builder.max_age(cookie::time::Duration::seconds(seconds));
        }

        let mut jar = CookieJar::new();
        match self.protection {
            CookieProtection::Signed => jar.signed_mut(&self.key).add(builder.build()),
            CookieProtection::Encrypted => jar.private_mut(&self.key).add(builder.build()),
        }

        jar.get(&self.name).cloned().ok_or(SealError::Jar)
    }

    pub(crate) fn unseal_at(&self, value: &str, now: SystemTime) -> Result<Unsealed, UnsealError> {
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(self.name.clone(), value.to_owned()));

        let opened = match self.protection {
            CookieProtection::Signed => jar.signed(&self.key).get(&self.name),
            CookieProtection::Encrypted => jar.private(&self.key).get(&self.name),
        }
        .ok_or(UnsealError::Forged)?;

        let (timestamp, encoded) = opened
            .value()
            .split_once('|')
            .ok_or(UnsealError::Malformed)?;
        let issued_at: u64 = timestamp.parse().map_err(|_| UnsealError::Malformed)?;
        let raw = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded)
                .map_err(|_| UnsealError::Malformed)?,
        );
        let secret = Secret::from_slice(&raw).ok_or(UnsealError::Malformed)?;

        if !self.max_age.is_zero()
            && unix_secs(now).saturating_sub(issued_at) > self.max_age.as_secs()
        {
            return Err(UnsealError::Expired);
        }

        Ok(Unsealed { secret, issued_at })
    }
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("same_site", &self.same_site)
            .field("protection", &self.protection)
            .finish_non_exhaustive()
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const KEY: &[u8; 32] = b"keep-it-secret-keep-it-safe-----";
    const OTHER_KEY: &[u8; 32] = b"another-key-entirely-32-bytes!!!";

    fn store(protection: CookieProtection) -> CookieStore {
        CookieStore::new(&CsrfConfig::new(KEY.to_vec()).protection(protection)).unwrap()
    }

    fn secret() -> Secret {
        Secret::generate().unwrap()
    }

    #[test]
    fn test_short_key_fails_at_setup() {
        let err = CookieStore::new(&CsrfConfig::new(b"short".to_vec())).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::KeyLength {
                expected: 32,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_round_trip_both_modes() {
        for protection in [CookieProtection::Signed, CookieProtection::Encrypted] {
            let store = store(protection);
            let secret = secret();

            let sealed = store.seal(&secret).unwrap();
            let unsealed = store.unseal(&sealed).unwrap();
            assert_eq!(unsealed.secret, secret);
        }
    }

    #[test]
    fn test_encrypted_value_hides_secret() {
        let store = store(CookieProtection::Encrypted);
        let secret = secret();
        let sealed = store.seal(&secret).unwrap();

        assert!(!sealed.contains(&URL_SAFE_NO_PAD.encode(secret.as_bytes())));
    }

    #[test]
    fn test_every_bit_flip_is_detected() {
        for protection in [CookieProtection::Signed, CookieProtection::Encrypted] {
            let store = store(protection);
            let sealed = store.seal(&secret()).unwrap();
            let bytes = sealed.as_bytes();

            for index in 0..bytes.len() {
                for bit in 0..8 {
                    let mut flipped = bytes.to_vec();
                    flipped[index] ^= 1 << bit;

                    let Ok(flipped) = String::from_utf8(flipped) else {
                        continue;
                    };

                    assert!(
                        store.unseal(&flipped).is_err(),
                        "flip of bit {} in byte {} went undetected ({:?})",
                        bit,
                        index,
                        protection
                    );
                }
            }
        }
    }

    #[test]
    fn test_other_key_rejects() {
        let sealed = store(CookieProtection::Encrypted).seal(&secret()).unwrap();
        let other = CookieStore::new(&CsrfConfig::new(OTHER_KEY.to_vec())).unwrap();

        assert_eq!(other.unseal(&sealed).unwrap_err(), UnsealError::Forged);
    }

    #[test]
    fn test_other_cookie_name_rejects() {
        let sealed = store(CookieProtection::Encrypted).seal(&secret()).unwrap();
        let renamed =
            CookieStore::new(&CsrfConfig::new(KEY.to_vec()).cookie_name("other")).unwrap();

        assert_eq!(renamed.unseal(&sealed).unwrap_err(), UnsealError::Forged);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let store = store(CookieProtection::Encrypted);
        for value in ["", "garbage", "a|b", "===", "\u{1F36A}"] {
            assert!(store.unseal(value).is_err(), "accepted {:?}", value);
        }
    }

    #[test]
    fn test_expiry() {
        let store = CookieStore::new(
            &CsrfConfig::new(KEY.to_vec()).max_age(Duration::from_secs(100)),
        )
        .unwrap();
        let issued = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let cookie = store.seal_at(&secret(), issued).unwrap();

        let fresh = store
            .unseal_at(cookie.value(), issued + Duration::from_secs(40))
            .unwrap();
        assert!(!store.needs_refresh_at(&fresh, issued + Duration::from_secs(40)));
        assert!(store.needs_refresh_at(&fresh, issued + Duration::from_secs(60)));

        assert!(store
            .unseal_at(cookie.value(), issued + Duration::from_secs(100))
            .is_ok());
        assert_eq!(
            store
                .unseal_at(cookie.value(), issued + Duration::from_secs(101))
                .unwrap_err(),
            UnsealError::Expired
        );
    }

    #[test]
    fn test_session_cookie_never_expires() {
        let store =
            CookieStore::new(&CsrfConfig::new(KEY.to_vec()).max_age(Duration::ZERO)).unwrap();
        let issued = UNIX_EPOCH + Duration::from_secs(1_000);
        let cookie = store.seal_at(&secret(), issued).unwrap();

        assert!(cookie.max_age().is_none());
        let later = issued + Duration::from_secs(10 * 365 * 24 * 3600);
        let unsealed = store.unseal_at(cookie.value(), later).unwrap();
        assert!(!store.needs_refresh_at(&unsealed, later));
    }

    #[test]
    fn test_issue_sets_attributes() {
        let config = CsrfConfig::new(KEY.to_vec())
            .cookie_name("nameoverride")
            .cookie_domain("domainoverride")
            .cookie_path("/pathoverride")
            .max_age(Duration::from_secs(173))
            .secure(false)
            .http_only(false)
            .same_site(SameSite::Strict);
        let cookie = CookieStore::new(&config)
            .unwrap()
            .issue(&secret())
            .unwrap()
            .to_string();

        assert!(cookie.starts_with("nameoverride="));
        assert!(cookie.contains("Domain=domainoverride"));
        assert!(cookie.contains("Path=/pathoverride"));
        assert!(cookie.contains("Max-Age=173"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(!cookie.contains("Secure"));
        assert!(!cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_read_finds_all_candidates() {
        let store = store(CookieProtection::Encrypted);
        let mut headers = HeaderMap::new();
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; _csrf=first"),
        );
        headers.append(header::COOKIE, HeaderValue::from_static("_csrf=second"));

        assert_eq!(store.read(&headers), vec!["first", "second"]);
        assert!(store.read(&HeaderMap::new()).is_empty());
    }
}
