use std::time::{Duration, SystemTime};

use crate::config::SessionConfig;

/// Builds the `Set-Cookie` value for a session.
///
/// `<key>=<id>; SameSite=<policy>; Path=<path>; Expires=<IMF-fixdate>`, then
/// `Domain`, `Secure` and `HttpOnly` when the policy asks for them.
pub fn set_cookie_value(policy: &SessionConfig, key: &str, id: &str, now: SystemTime) -> String {
    let expires = now + Duration::from_secs(policy.cookie_ttl_secs);

    let mut value = format!(
        "{}={}; SameSite={}; Path={}; Expires={}",
        key,
        id,
        policy.same_site,
        policy.path,
        httpdate::fmt_http_date(expires)
    );

    if let Some(domain) = policy.domain.as_deref().filter(|d| !d.is_empty()) {
        value.push_str("; Domain=");
        value.push_str(domain);
    }
    if policy.emit_flags && policy.secure {
        value.push_str("; Secure");
    }
    if policy.emit_flags && policy.http_only {
        value.push_str("; HttpOnly");
    }

    value
}

/// Iterates the `name=value` pairs of a `Cookie` request header.
pub fn pairs(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim().trim_matches('"')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_format() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        let value = set_cookie_value(&SessionConfig::default(), "sid", "abc", now);

        // 784111777 + 1800 seconds
        assert_eq!(
            value,
            "sid=abc; SameSite=Lax; Path=/; Expires=Sun, 06 Nov 1994 09:19:37 GMT"
        );
    }

    #[test]
    fn flags_are_emitted_on_request() {
        let policy = SessionConfig {
            emit_flags: true,
            http_only: true,
            ..SessionConfig::default()
        };
        let value = set_cookie_value(&policy, "sid", "abc", SystemTime::now());

        assert!(value.ends_with("; Secure; HttpOnly"));
    }

    #[test]
    fn cookie_pairs_are_trimmed() {
        let found: Vec<_> = pairs("a=1; sid=\"xyz\" ;flag").collect();
        assert_eq!(found, vec![("a", "1"), ("sid", "xyz")]);
    }
}
