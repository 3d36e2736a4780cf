use axum::http::Method;
use url::Url;

pub fn is_mutating(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH || *method == Method::DELETE
}

/// Compare the `Origin` host (hostname plus explicit port) against `Host`.
///
/// Missing headers pass: non-browser clients never send `Origin`, and the
/// browsers this guards against always do on state-changing fetches.
/// A malformed `Origin` fails closed.
pub fn is_same_origin(origin: Option<&str>, host: Option<&str>) -> bool {
    let (Some(origin), Some(host)) = (origin, host) else {
        return true;
    };

    let Ok(url) = Url::parse(origin) else {
        tracing::debug!("Unparseable Origin header: {}", origin);
        return false;
    };

    let Some(hostname) = url.host_str() else {
        return false;
    };

    let origin_host = match url.port() {
        Some(port) => format!("{}:{}", hostname, port),
        None => hostname.to_string(),
    };

    origin_host.eq_ignore_ascii_case(host.trim())
}
