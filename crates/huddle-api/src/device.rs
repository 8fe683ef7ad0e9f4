use huddle_types::models::DeviceInfo;

/// Rough client classification from a `User-Agent` string.
///
/// Order matters: Edge and Opera also claim Chrome, Chrome also claims
/// Safari, and iOS/Android agents mention "Mac OS X"/"Linux".
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    let has = |needle: &str| user_agent.contains(needle);

    let browser = if has("Edg/") || has("Edge/") {
        "Edge"
    } else if has("OPR/") || has("Opera") {
        "Opera"
    } else if has("Firefox") || has("FxiOS") {
        "Firefox"
    } else if has("Chrome") || has("CriOS") {
        "Chrome"
    } else if has("Safari") {
        "Safari"
    } else {
        "Unknown"
    };

    let os = if has("Windows") {
        "Windows"
    } else if has("iPhone") || has("iPad") || has("iPod") {
        "iOS"
    } else if has("Android") {
        "Android"
    } else if has("Mac") {
        "macOS"
    } else if has("Linux") {
        "Linux"
    } else {
        "Unknown"
    };

    let device = if has("Mobile") { "Mobile" } else { "Desktop" };

    DeviceInfo {
        browser: browser.into(),
        os: os.into(),
        device: device.into(),
        user_agent: user_agent.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(ua: &str) -> (String, String, String) {
        let info = parse_user_agent(ua);
        (info.browser, info.os, info.device)
    }

    #[test]
    fn desktop_browsers() {
        let chrome_win = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
        assert_eq!(classify(chrome_win), ("Chrome".into(), "Windows".into(), "Desktop".into()));

        let edge = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.2592.87";
        assert_eq!(classify(edge).0, "Edge");

        let safari_mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15";
        assert_eq!(classify(safari_mac), ("Safari".into(), "macOS".into(), "Desktop".into()));

        let firefox_linux = "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0";
        assert_eq!(classify(firefox_linux), ("Firefox".into(), "Linux".into(), "Desktop".into()));
    }

    #[test]
    fn mobile_agents_are_not_mistaken_for_desktop_os() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";
        assert_eq!(classify(iphone), ("Safari".into(), "iOS".into(), "Mobile".into()));

        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36";
        assert_eq!(classify(android), ("Chrome".into(), "Android".into(), "Mobile".into()));
    }

    #[test]
    fn empty_agent_is_unknown() {
        let info = parse_user_agent("");
        assert_eq!(info.browser, "Unknown");
        assert_eq!(info.os, "Unknown");
        assert_eq!(info.device, "Desktop");
        assert_eq!(info.user_agent, "");
    }
}
