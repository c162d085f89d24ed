use std::net::IpAddr;

use url::Url;

const PRIVATE_SUFFIXES: &[&str] = &[".localhost", ".local", ".localdomain", ".home.arpa", ".internal"];

/// Parses a stream or web URL, accepting only http and https. Protocol
/// relative input (`//host/path`) is treated as https.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if trimmed.starts_with("//") {
        Url::parse(&format!("https:{trimmed}"))
    } else {
        Url::parse(trimmed)
    }
    .ok()?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

/// The https form of an http URL; `None` for anything already secure or
/// unusable.
pub fn https_upgrade(url: &Url) -> Option<Url> {
    if url.scheme() != "http" {
        return None;
    }
    let mut upgraded = url.clone();
    upgraded.set_scheme("https").ok()?;
    Some(upgraded)
}

/// Host of a URL when it names a public machine. Loopback, private
/// addresses and LAN-only names yield `None`.
pub fn public_host(url: &Url) -> Option<String> {
    let host = url
        .host_str()?
        .trim_matches(|c| c == '[' || c == ']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host.is_empty() || host == "localhost" {
        return None;
    }
    if PRIVATE_SUFFIXES.iter().any(|suffix| host.ends_with(suffix)) {
        return None;
    }
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr))
            if addr.is_private()
                || addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified() =>
        {
            None
        }
        Ok(IpAddr::V6(addr)) if addr.is_loopback() || addr.is_unspecified() => None,
        Ok(_) => Some(host),
        Err(_) if !host.contains('.') => None,
        Err(_) => Some(host),
    }
}
