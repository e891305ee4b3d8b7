//! Turning profile-URL shaped tokens into handles.

use url::Url;

use crate::handle::Handle;

/// Convert a profile reference (`vis.social/@luca`,
/// `sub.example.org/profile/alice`, with or without scheme) into a handle.
///
/// `None` means the account name could not be located or the rebuilt handle
/// fails the canonical grammar; the token is dropped rather than guessed at.
#[must_use]
pub fn handle_from_url(token: &str) -> Option<Handle> {
    let Some(name) = name_from_url(token) else {
        log::debug!("no account name in {token}");
        return None;
    };
    let domain = domain_from_url(token);
    Handle::from_scan(&format!("@{name}@{domain}"), token)
}

/// Extract the account name by platform URL shape, in order:
/// an `@`-segment, then `/profile/` (friendica), then `/u/` (diaspora),
/// then `/c/` or `/a/` (peertube channels and accounts).
fn name_from_url(token: &str) -> Option<String> {
    if token.contains('@') {
        let segment = token
            .split(['/', '?'])
            .filter(|segment| segment.contains('@'))
            .last()?;
        return non_empty(segment.replacen('@', "", 1));
    }
    if let Some((_, tail)) = token.rsplit_once("/profile/") {
        return non_empty(tail.trim_end_matches('/').to_owned());
    }
    if let Some((_, tail)) = token.rsplit_once("/u/") {
        return non_empty(tail.trim_end_matches('/').to_owned());
    }
    let channel = token.rfind("/c/").map(|at| at + 3);
    let actor = token.rfind("/a/").map(|at| at + 3);
    if let Some(after) = channel.max(actor) {
        let tail = &token[after..];
        return non_empty(tail.split('/').next().unwrap_or_default().to_owned());
    }
    None
}

/// The host of an absolute URL, or the first path segment for scheme-less
/// references.
fn domain_from_url(token: &str) -> String {
    if token.starts_with("http") {
        if let Ok(url) = Url::parse(token) {
            if let Some(host) = url.host_str() {
                return host.to_owned();
            }
        }
    }
    token.split('/').next().unwrap_or(token).to_owned()
}

fn non_empty(name: String) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
