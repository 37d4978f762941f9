//! Device identity helpers shared across the signaling service and both
//! tunnel endpoints.
//!
//! The signaling service treats browser and host devices identically;
//! only the prefix of the device id distinguishes the two classes, and
//! only for the benefit of user interfaces built on top of this core.

/// Prefix used by ephemeral browser-instance device ids.
pub const BROWSER_DEVICE_PREFIX: &str = "browser-";
/// Prefix used by long-lived host-service device ids.
pub const HOST_DEVICE_PREFIX: &str = "host-";

/// The two device classes distinguishable by id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Browser,
    Host,
    /// A device id that matches neither known prefix. The signaling
    /// service still accepts and routes it; only classification fails.
    Unknown,
}

pub fn device_kind(device_id: &str) -> DeviceKind {
    if device_id.starts_with(BROWSER_DEVICE_PREFIX) {
        DeviceKind::Browser
    } else if device_id.starts_with(HOST_DEVICE_PREFIX) {
        DeviceKind::Host
    } else {
        DeviceKind::Unknown
    }
}

/// The deterministic relay session id for a browser/host device pair,
/// per the `"{browser_device_id}-{target_device_id}"` convention.
pub fn relay_session_id(browser_device_id: &str, target_device_id: &str) -> String {
    format!("{browser_device_id}-{target_device_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_prefixes() {
        assert_eq!(device_kind("browser-abc123"), DeviceKind::Browser);
        assert_eq!(device_kind("host-abc123"), DeviceKind::Host);
        assert_eq!(device_kind("abc123"), DeviceKind::Unknown);
    }

    #[test]
    fn builds_deterministic_session_id() {
        assert_eq!(
            relay_session_id("browser-A", "host-B"),
            "browser-A-host-B"
        );
    }
}
