use sha2::{Digest, Sha256};

/// Compute an anonymous visitor hash from IP and User-Agent.
///
/// Formula: sha256(day_epoch + ip + user_agent)[0..8] encoded as 16 hex chars.
/// `day_epoch = floor(unix_utc_timestamp / 86400)`, so the same visitor hashes
/// differently on different days and raw IPs are never stored.
pub fn compute_visitor_hash(ip: &str, user_agent: &str) -> String {
    let day_epoch = chrono::Utc::now().timestamp() / 86400;
    let input = format!("{}{}{}", day_epoch, ip, user_agent);
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..8])
}

/// Extract the host of a referrer URL, lowercased.
///
/// Userinfo, port, path and query are dropped. Returns `None` if the referrer
/// does not parse as an absolute URL or has no host.
pub fn extract_referrer_domain(referrer: &str) -> Option<String> {
    let url = url::Url::parse(referrer.trim()).ok()?;
    let host = url.host_str()?.trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}
