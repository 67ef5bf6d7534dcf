/*
 * Responsibility
 * - Decide whether a redirect destination is safe (same-origin relative path)
 * - Replace unsafe destinations with a configured fallback
 *
 * Used in both directions:
 * - reading `returnUrl` from a query string (post-login destination)
 * - writing `returnUrl` from the current path + query (login redirect)
 */

/// Returns true when `url` can be used as a redirect target without leaving the site.
///
/// Accepted: a relative path with exactly one leading `/`.
/// Rejected:
/// - absolute URLs (`http://`, `https://`, any `scheme:` before the first `/`)
/// - protocol-relative URLs (`//host`) and the backslash variant (`/\host`)
/// - anything containing a control character (`\r`, `\n`, ...)
/// - anything not starting with `/`
pub fn is_safe(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return false;
    }

    if !url.starts_with('/') {
        return false;
    }

    // Browsers normalise `\` to `/`, so `/\evil.example` is protocol-relative too.
    if url.starts_with("//") || url.starts_with("/\\") {
        return false;
    }

    if url.chars().any(|c| c.is_control()) {
        return false;
    }

    true
}

/// Returns `url` unchanged when it is safe, otherwise `fallback`.
pub fn sanitize<'a>(url: &'a str, fallback: &'a str) -> &'a str {
    if is_safe(url) { url } else { fallback }
}

/// `sanitize` for an optional candidate (absent query parameter => fallback).
pub fn sanitize_opt<'a>(url: Option<&'a str>, fallback: &'a str) -> &'a str {
    match url {
        Some(u) => sanitize(u, fallback),
        None => fallback,
    }
}
