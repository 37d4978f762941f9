//! Scheme conversion between the signaling service's HTTP(S) base URL
//! (used for device registration) and its ws(s) equivalent (used for the
//! persistent signaling connection).

pub fn to_ws(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_http_and_https() {
        assert_eq!(to_ws("http://localhost:8080"), "ws://localhost:8080");
        assert_eq!(to_ws("https://tunnel.example.com"), "wss://tunnel.example.com");
    }

    #[test]
    fn leaves_an_already_ws_url_untouched() {
        assert_eq!(to_ws("ws://localhost:8080"), "ws://localhost:8080");
    }
}
