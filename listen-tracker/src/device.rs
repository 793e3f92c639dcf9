//! Coarse device/browser/OS classification from a user-agent string
//!
//! Substring heuristics only. The values feed analytics breakdowns and are
//! not meant to match a full UA parser.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub device_type: String,
    pub browser: String,
    pub os: String,
}

// Order matters: Edge and Chrome UAs also contain "Safari", Edge contains
// "Chrome", Android contains "Linux", iOS UAs contain "Mac OS X".
const BROWSERS: &[(&str, &str)] = &[
    ("Edg", "Edge"),
    ("Firefox", "Firefox"),
    ("Chrome", "Chrome"),
    ("Safari", "Safari"),
];

const OPERATING_SYSTEMS: &[(&str, &str)] = &[
    ("Windows", "Windows"),
    ("Android", "Android"),
    ("iPhone", "iOS"),
    ("iPad", "iOS"),
    ("Mac", "macOS"),
    ("Linux", "Linux"),
];

pub fn classify(user_agent: &str) -> DeviceInfo {
    let lower = user_agent.to_ascii_lowercase();
    let device_type = if lower.contains("ipad") || lower.contains("tablet") {
        "tablet"
    } else if lower.contains("mobile") {
        "mobile"
    } else {
        "desktop"
    };

    DeviceInfo {
        device_type: device_type.to_string(),
        browser: first_match(user_agent, BROWSERS),
        os: first_match(user_agent, OPERATING_SYSTEMS),
    }
}

fn first_match(user_agent: &str, table: &[(&str, &str)]) -> String {
    table
        .iter()
        .find(|(needle, _)| user_agent.contains(needle))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_chrome_windows() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let info = classify(ua);
        assert_eq!(info.device_type, "desktop");
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "Windows");
    }

    #[test]
    fn test_mobile_safari_iphone() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
                  (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        let info = classify(ua);
        assert_eq!(info.device_type, "mobile");
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.os, "iOS");
    }

    #[test]
    fn test_edge_not_reported_as_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
        assert_eq!(classify(ua).browser, "Edge");
    }

    #[test]
    fn test_android_not_reported_as_linux() {
        let ua = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
        let info = classify(ua);
        assert_eq!(info.os, "Android");
        assert_eq!(info.device_type, "mobile");
    }

    #[test]
    fn test_unknown_agent() {
        let info = classify("curl/8.4.0");
        assert_eq!(info.device_type, "desktop");
        assert_eq!(info.browser, "unknown");
        assert_eq!(info.os, "unknown");
    }
}
