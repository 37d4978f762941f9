//! The control-channel exclusion rule for the browser's `WebSocket`
//! surface.
//!
//! The source material installs the tunneled `WebSocket` as a global
//! monkey-patch of `window.WebSocket`, with a carve-out so the signaling
//! socket itself doesn't get proxied through the very tunnel it
//! negotiates (which would self-deadlock the fallback path). Rust has no
//! global object to patch and no implicit construction site to
//! intercept, so this crate exposes the same decision as an explicit
//! factory: [`BrowserMultiplexer::websocket`](crate::browser::BrowserMultiplexer::websocket)
//! calls [`classify`] itself and the caller never needs to special-case
//! the signaling URL by hand.

/// Where a requested WebSocket URL should actually connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectVia {
    /// Goes straight to the network, bypassing the tunnel entirely.
    Direct,
    /// Goes through the tunnel as a `WS_CONNECT` sub-connection.
    Tunneled,
}

/// Classifies `url` against the signaling endpoint's base URL. Anything
/// under the signaling service's own origin is the control channel and
/// MUST be excluded from tunneling; everything else is tunneled.
pub fn classify(url: &str, signaling_base_url: &str) -> ConnectVia {
    let signaling_origin = origin_of(signaling_base_url);
    let target_origin = origin_of(url);
    if !signaling_origin.is_empty() && target_origin == signaling_origin {
        ConnectVia::Direct
    } else {
        ConnectVia::Tunneled
    }
}

/// Extracts `scheme://host[:port]` from a URL, tolerant of the `ws(s)`
/// vs `http(s)` scheme mismatch between how a caller might spell the
/// signaling base and how it spells a target WebSocket URL.
fn origin_of(url: &str) -> String {
    let without_scheme = url.splitn(2, "://").nth(1).unwrap_or(url);
    let host_and_port = without_scheme.split(['/', '?', '#']).next().unwrap_or("");
    host_and_port.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_the_signaling_origin_regardless_of_scheme() {
        let signaling = "https://tunnel.example.com/signal";
        assert_eq!(
            classify("wss://tunnel.example.com/signal?token=t&device_id=d", signaling),
            ConnectVia::Direct
        );
    }

    #[test]
    fn tunnels_a_websocket_to_a_different_origin() {
        let signaling = "https://tunnel.example.com";
        assert_eq!(
            classify("ws://localhost:8080/app-socket", signaling),
            ConnectVia::Tunneled
        );
    }

    #[test]
    fn tunnels_a_different_path_on_an_unrelated_host() {
        let signaling = "https://tunnel.example.com";
        assert_eq!(
            classify("wss://other.example.com/ws", signaling),
            ConnectVia::Tunneled
        );
    }
}
