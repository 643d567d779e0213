//! Redirect following with per-hop safety checks
//!
//! The shared HTTP client never follows redirects itself. Each `Location`
//! is resolved here and must pass [`check_target`] before it is requested,
//! so no hop of a redirect chain reaches a forbidden address.

use crate::governor::safety::{check_target, HostResolver, UnsafeTarget};
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use thiserror::Error;
use url::Url;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// A redirect chain that was abandoned
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("redirect from {from} to {to} refused: {target}")]
    Unsafe {
        from: String,
        to: String,
        target: UnsafeTarget,
    },

    #[error("redirect from {from} has an unusable location '{location}'")]
    BadLocation { from: String, location: String },

    #[error("more than {max} redirects starting at {url}")]
    TooMany { url: String, max: usize },

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Where a 3xx response points, resolved against the request URL
fn redirect_target(current: &Url, response: &Response) -> Option<Result<Url, RedirectError>> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response.headers().get(LOCATION)?;

    let bad_location = || RedirectError::BadLocation {
        from: current.to_string(),
        location: String::from_utf8_lossy(location.as_bytes()).to_string(),
    };

    let target = location
        .to_str()
        .ok()
        .and_then(|loc| current.join(loc).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"));

    Some(target.ok_or_else(bad_location))
}

/// Sends a GET for `url` and follows its redirects, checking every hop
///
/// `url` itself is expected to have passed the safety check already; only
/// redirect targets are checked here.
///
/// # Arguments
///
/// * `client` - Client built with redirects disabled
/// * `resolver` - Resolver used for the per-hop safety check
/// * `url` - The first URL of the chain
/// * `max_redirects` - Hops allowed before the chain is abandoned
///
/// # Returns
///
/// * `Ok(Response)` - The first non-redirect response; `response.url()` is
///   the final URL
/// * `Err(RedirectError)` - A hop was unsafe or unusable, the chain was too
///   long, or a request failed
pub async fn get_following_redirects(
    client: &Client,
    resolver: &dyn HostResolver,
    url: &Url,
    max_redirects: usize,
) -> Result<Response, RedirectError> {
    let mut current = url.clone();

    for _ in 0..=max_redirects {
        let response = client.get(current.as_str()).send().await?;

        let next = match redirect_target(&current, &response) {
            None => return Ok(response),
            Some(next) => next?,
        };

        if let Err(target) = check_target(&next, resolver).await {
            tracing::warn!("Not following redirect {} -> {}: {}", current, next, target);
            return Err(RedirectError::Unsafe {
                from: current.to_string(),
                to: next.to_string(),
                target,
            });
        }

        tracing::trace!("Following redirect {} -> {}", current, next);
        current = next;
    }

    Err(RedirectError::TooMany {
        url: url.to_string(),
        max: max_redirects,
    })
}
