use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{connect_info::ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::AppError;

/// Address prefixes treated as local network.
pub const LAN_PREFIXES: [&str; 4] = ["::", "127.", "192.168.", "10."];

/// Extract client IP from proxy headers and optional transport metadata.
pub fn extract_ip_from_headers(headers: &HeaderMap, fallback: Option<IpAddr>) -> IpAddr {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return ip;
        }
    }
    if let Some(ip) = fallback {
        return ip;
    }
    IpAddr::from([127, 0, 0, 1])
}

/// Optional extractor for remote socket address. Unlike `ConnectInfo`, this never rejects
/// if the connection info extension is absent (e.g. in tests or custom services).
#[derive(Clone, Copy, Debug, Default)]
pub struct MaybeRemoteAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for MaybeRemoteAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match ConnectInfo::<SocketAddr>::from_request_parts(parts, state).await {
            Ok(ConnectInfo(addr)) => Ok(MaybeRemoteAddr(Some(addr))),
            Err(_) => Ok(MaybeRemoteAddr(None)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllowIpConfig {
    pub enabled: bool,
    pub prefixes: Vec<String>,
}

impl Default for AllowIpConfig {
    fn default() -> Self {
        Self { enabled: false, prefixes: LAN_PREFIXES.iter().map(|p| p.to_string()).collect() }
    }
}

/// Remote address allowlist by textual prefix.
#[derive(Debug, Clone)]
pub struct AllowIp {
    prefixes: Arc<[String]>,
}

impl AllowIp {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { prefixes: prefixes.into_iter().map(Into::into).collect() }
    }

    pub fn lan_only() -> Self {
        Self::new(LAN_PREFIXES)
    }

    pub fn from_config(cfg: &AllowIpConfig) -> Self {
        Self::new(cfg.prefixes.iter().cloned())
    }

    pub fn allows(&self, ip: &IpAddr) -> bool {
        let addr = ip.to_string();
        self.prefixes.iter().any(|p| addr.starts_with(p.as_str()))
    }
}

/// Rejects clients whose address matches none of the prefixes with 403.
pub async fn allow_ip(
    State(allow): State<AllowIp>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    req: Request,
    next: Next,
) -> Response {
    let ip = extract_ip_from_headers(req.headers(), remote.map(|a| a.ip()));
    if allow.allows(&ip) {
        return next.run(req).await;
    }
    tracing::warn!("Rejected request from {}", ip);
    AppError::Forbidden(format!("Only allow LAN access, your ip is {}.", ip)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_ip_precedence() {
        let mut headers = HeaderMap::new();
        let socket: IpAddr = "8.8.8.8".parse().unwrap();
        assert_eq!(extract_ip_from_headers(&headers, Some(socket)), socket);

        headers.insert("x-real-ip", HeaderValue::from_static("10.1.1.1"));
        assert_eq!(extract_ip_from_headers(&headers, Some(socket)).to_string(), "10.1.1.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("192.168.0.9, 10.0.0.1"));
        assert_eq!(extract_ip_from_headers(&headers, Some(socket)).to_string(), "192.168.0.9");
    }

    #[test]
    fn test_lan_prefixes() {
        let lan = AllowIp::lan_only();
        for ok in ["127.0.0.1", "::1", "192.168.1.20", "10.0.0.7"] {
            assert!(lan.allows(&ok.parse().unwrap()), "{ok}");
        }
        for denied in ["8.8.8.8", "172.16.0.1", "fe80::1"] {
            assert!(!lan.allows(&denied.parse().unwrap()), "{denied}");
        }
    }

    #[test]
    fn test_custom_prefixes() {
        let allow = AllowIp::from_config(&AllowIpConfig { enabled: true, prefixes: vec!["172.16.".to_string()] });
        assert!(allow.allows(&"172.16.4.4".parse().unwrap()));
        assert!(!allow.allows(&"127.0.0.1".parse().unwrap()));
    }
}
