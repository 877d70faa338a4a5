// Response rewriting: hide the CodeArtifact endpoint behind the gateway address
//
// Every step returns `Unchanged` instead of an error, the caller then passes the
// original bytes through.

use std::io::Read;

use flate2::read::GzDecoder;
use url::Url;

use super::request_context::ClientOrigin;

/// User agent prefixes of clients that need registry URLs rewritten in JSON bodies
const PACKAGE_MANAGER_AGENTS: [&str; 3] = ["npm", "pnpm", "Bun"];

const JSON_CONTENT_TYPES: [&str; 2] = ["application/json", "application/vnd.npm.install-v1+json"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectRewrite {
    Rewritten(String),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRewrite {
    Rewritten(String),
    Unchanged,
}

pub fn is_redirect(status: u16) -> bool {
    status == 301 || status == 302
}

/// Point a redirect at the gateway when it targets the upstream host
///
/// Relative locations are resolved against `request_url`, the upstream URL the
/// redirect was answered for. Redirects elsewhere (S3 presigned URLs and the
/// like) are left as is.
pub fn rewrite_location(
    location: &str,
    request_url: &Url,
    upstream: &Url,
    origin: &ClientOrigin,
) -> RedirectRewrite {
    let target = match Url::parse(location) {
        Ok(target) => Ok(target),
        Err(url::ParseError::RelativeUrlWithoutBase) => request_url.join(location),
        Err(e) => Err(e),
    };
    let Ok(mut target) = target else {
        return RedirectRewrite::Unchanged;
    };
    if target.host_str().is_none() || target.host_str() != upstream.host_str() {
        return RedirectRewrite::Unchanged;
    }
    // Upstream host form includes the port when it is not the scheme default
    if target.port() != upstream.port() {
        return RedirectRewrite::Unchanged;
    }

    let path = target.path().replacen(upstream.path(), "", 1);
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };

    let Ok(rebased) = Url::parse(&format!("{}://{}", origin.scheme, origin.host)) else {
        return RedirectRewrite::Unchanged;
    };
    if target.set_scheme(rebased.scheme()).is_err()
        || target.set_host(rebased.host_str()).is_err()
        || target.set_port(rebased.port()).is_err()
    {
        return RedirectRewrite::Unchanged;
    }
    target.set_path(&path);

    RedirectRewrite::Rewritten(target.to_string())
}

/// Whether the client/content combination gets its body rewritten
pub fn wants_body_rewrite(user_agent: &str, content_type: &str) -> bool {
    PACKAGE_MANAGER_AGENTS
        .iter()
        .any(|agent| user_agent.starts_with(agent))
        && JSON_CONTENT_TYPES.iter().any(|ct| content_type.contains(ct))
}

/// Replace upstream URLs in a (possibly gzipped) text body with the gateway URL
///
/// The `:443` host variant is substituted first, then the bare base URL.
pub fn rewrite_body(body: &[u8], gzipped: bool, upstream_url: &str, origin: &ClientOrigin) -> BodyRewrite {
    let text = if gzipped {
        let mut decoded = String::new();
        if GzDecoder::new(body).read_to_string(&mut decoded).is_err() {
            return BodyRewrite::Unchanged;
        }
        decoded
    } else {
        match std::str::from_utf8(body) {
            Ok(text) => text.to_string(),
            Err(_) => return BodyRewrite::Unchanged,
        }
    };

    let Ok(upstream) = Url::parse(upstream_url) else {
        return BodyRewrite::Unchanged;
    };
    let Some(host) = upstream.host_str() else {
        return BodyRewrite::Unchanged;
    };

    let gateway_url = origin.base_url();
    let with_port = upstream_url.replace(host, &format!("{}:443", host));

    let rewritten = text
        .replace(&with_port, &gateway_url)
        .replace(upstream_url, &gateway_url);

    BodyRewrite::Rewritten(rewritten)
}
