//! `getUrl(origin, url, base)` (§9): resolves a caller-supplied path
//! against the engine's origin and configured base, honoring `base` when
//! the candidate is relative — the behavior the spec notes the source's
//! shared helper left unimplemented.

use url::Url;

/// Resolves `input` (an absolute URL, an absolute path, or a relative
/// path) into an absolute [`Url`] under `origin`, prepending `base` to
/// relative paths.
pub fn resolve_url(origin: &str, base: &str, input: &str) -> Result<Url, url::ParseError> {
    if let Ok(absolute) = Url::parse(input) {
        return Ok(absolute);
    }

    let origin_url = Url::parse(origin)?;

    if let Some(path) = input.strip_prefix('/') {
        return origin_url.join(&format!("/{path}"));
    }

    let mut prefix = base.trim_end_matches('/').to_string();
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    let joined = format!("{prefix}/{input}");
    origin_url.join(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_passes_through() {
        let resolved = resolve_url("https://example.com", "/", "https://other.example/x").unwrap();
        assert_eq!(resolved.as_str(), "https://other.example/x");
    }

    #[test]
    fn absolute_path_ignores_base() {
        let resolved = resolve_url("https://example.com", "/app", "/foo/1").unwrap();
        assert_eq!(resolved.path(), "/foo/1");
    }

    #[test]
    fn relative_path_is_prefixed_with_base() {
        let resolved = resolve_url("https://example.com", "/app", "foo/1").unwrap();
        assert_eq!(resolved.path(), "/app/foo/1");
    }
}
