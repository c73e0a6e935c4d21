//! Helpers for redirect URLs during authentication flows.

use axum::{extract::Request, http::Uri};

use crate::endpoints;

/// Only same-site relative paths are followed, and never back to the log-in page.
fn is_safe_redirect_url(redirect_url: &str) -> bool {
    if !redirect_url.starts_with('/') || redirect_url.starts_with("//") {
        return false;
    }

    let path = redirect_url
        .split_once('?')
        .map(|(path, _)| path)
        .unwrap_or(redirect_url);

    path != endpoints::LOG_IN_VIEW && path != endpoints::REGISTER_VIEW
}

/// Reduce `raw_url` to its path and query, or `None` if it should not be redirected to.
pub fn normalize_redirect_url(raw_url: &str) -> Option<String> {
    let uri = raw_url.parse::<Uri>().ok()?;
    if uri.scheme().is_some() || uri.authority().is_some() {
        return None;
    }
    let path_and_query = uri.path_and_query()?.as_str();

    is_safe_redirect_url(path_and_query).then(|| path_and_query.to_owned())
}

/// The log-in page URL that sends the user back to the page `request` asked for.
///
/// Falls back to the plain log-in page if the request URI is not a safe redirect target.
pub fn build_log_in_redirect_url(request: &Request) -> String {
    request
        .uri()
        .path_and_query()
        .and_then(|path_and_query| normalize_redirect_url(path_and_query.as_str()))
        .map(|target| endpoints::with_query(endpoints::LOG_IN_VIEW, "redirect_url", target))
        .unwrap_or_else(|| endpoints::LOG_IN_VIEW.to_owned())
}
