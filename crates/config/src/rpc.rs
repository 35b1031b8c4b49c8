// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{anyhow, bail, Context, Result};
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcProtocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl RpcProtocol {
    pub fn is_websocket(&self) -> bool {
        matches!(self, RpcProtocol::Ws | RpcProtocol::Wss)
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, RpcProtocol::Https | RpcProtocol::Wss)
    }
}

/// A validated JSON-RPC endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcEndpoint {
    protocol: RpcProtocol,
    url: Url,
}

impl RpcEndpoint {
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).context("Invalid URL format")?;
        let protocol = match parsed.scheme() {
            "http" => RpcProtocol::Http,
            "https" => RpcProtocol::Https,
            "ws" => RpcProtocol::Ws,
            "wss" => RpcProtocol::Wss,
            _ => bail!("Invalid protocol. Expected: http://, https://, ws://, wss://"),
        };

        if parsed.host_str().is_none() {
            bail!("URL must contain a host");
        }

        Ok(Self {
            protocol,
            url: parsed,
        })
    }

    pub fn protocol(&self) -> RpcProtocol {
        self.protocol
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        // from_url() rejects urls without a host
        self.url.host_str().unwrap_or_default()
    }

    /// Identity of the endpoint, independent of ws/http flavour and trailing slashes.
    ///
    /// Two endpoints with the same identity reach the same node, so an encryption instance
    /// resolved through one may be reused through the other.
    pub fn identity(&self) -> String {
        let port = self
            .url
            .port_or_known_default()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        let path = self.url.path().trim_end_matches('/');
        format!("{}{}{}", self.hostname().to_lowercase(), port, path)
    }

    pub fn as_http_url(&self) -> Result<String> {
        if !self.protocol.is_websocket() {
            return Ok(self.url.to_string());
        }
        let mut parsed = self.url.clone();
        let scheme = if self.protocol.is_secure() {
            "https"
        } else {
            "http"
        };
        parsed
            .set_scheme(scheme)
            .map_err(|_| anyhow!("http(s) are valid schemes"))?;
        Ok(parsed.to_string())
    }

    pub fn is_local(&self) -> bool {
        match self.hostname() {
            "localhost" | "127.0.0.1" | "::1" | "[::1]" => true,
            host => host.starts_with("127."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_scheme() {
        assert!(RpcEndpoint::from_url("ftp://localhost:8545").is_err());
        assert!(RpcEndpoint::from_url("not a url").is_err());
    }

    #[test]
    fn test_identity_ignores_transport() -> Result<()> {
        let http = RpcEndpoint::from_url("http://LocalHost:8545/")?;
        let ws = RpcEndpoint::from_url("ws://localhost:8545")?;
        assert_eq!(http.identity(), ws.identity());
        assert!(http.is_local());
        assert_eq!(ws.as_http_url()?, "http://localhost:8545/");
        Ok(())
    }

    #[test]
    fn test_remote_endpoint() -> Result<()> {
        let rpc = RpcEndpoint::from_url("wss://sepolia.example.org/v3/key")?;
        assert!(!rpc.is_local());
        assert!(rpc.protocol().is_secure());
        assert_eq!(rpc.identity(), "sepolia.example.org:443/v3/key");
        Ok(())
    }
}
