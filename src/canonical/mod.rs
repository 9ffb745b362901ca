//! Canonical Model (C1).
//!
//! Strict, internally-stable representations of profiles and organizations.
//! Everything downstream of the adapter consumes only these types — never
//! raw upstream JSON.

mod edge;
mod organization;
mod profile;

pub use edge::ProfileOrganizationEdge;
pub use organization::{Address, CanonicalOrganization, OrganizationBuilder};
pub use profile::{CanonicalProfile, Education, Experience, ProfileBuilder};

/// Lower-cases scheme+host, strips a leading `www.`, strips a trailing
/// slash, and drops query string and fragment. The sole dedup key for both
/// profiles and organizations (§3, §4.4). Idempotent: `normalize_url(normalize_url(x)) == normalize_url(x)`.
pub fn normalize_url(raw: &str) -> crate::error::Result<String> {
    let mut url = url::Url::parse(raw.trim())
        .map_err(|e| crate::error::AppError::InvalidProfileUrl(format!("{raw}: {e}")))?;

    url.set_fragment(None);
    url.set_query(None);

    let scheme = url.scheme().to_ascii_lowercase();
    let host = url
        .host_str()
        .ok_or_else(|| crate::error::AppError::InvalidProfileUrl(raw.to_string()))?
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut path = url.path().to_string();
    while path.ends_with('/') && path.len() > 1 {
        path.pop();
    }
    if path == "/" {
        path.clear();
    }

    let port = url
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();

    Ok(format!("{scheme}://{host}{port}{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_www_trailing_slash_and_query() {
        let n = normalize_url("https://WWW.LinkedIn.com/in/example1/?trk=abc#frag").unwrap();
        assert_eq!(n, "https://linkedin.com/in/example1");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_url("https://www.example.com/foo/").unwrap();
        let twice = normalize_url(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize_url("not a url").is_err());
    }
}
