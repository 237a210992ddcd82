//! Device emulation profiles.

use std::fmt;

use crate::{Error, Result};

const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
const CHROME_ANDROID: &str = "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
const CHROME_DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A named viewport + user agent pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub user_agent: &'static str,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

pub const DEFAULT_DEVICE: &str = "iPad Mini landscape";

pub const DEVICES: &[Device] = &[
    Device {
        name: "iPad Mini landscape",
        width: 1024,
        height: 768,
        user_agent: SAFARI_IPAD,
    },
    Device {
        name: "iPad Mini",
        width: 768,
        height: 1024,
        user_agent: SAFARI_IPAD,
    },
    Device {
        name: "iPhone 13",
        width: 390,
        height: 844,
        user_agent: SAFARI_IPHONE,
    },
    Device {
        name: "Pixel 5",
        width: 393,
        height: 851,
        user_agent: CHROME_ANDROID,
    },
    Device {
        name: "Desktop 1280x720",
        width: 1280,
        height: 720,
        user_agent: CHROME_DESKTOP,
    },
    Device {
        name: "Desktop 1920x1080",
        width: 1920,
        height: 1080,
        user_agent: CHROME_DESKTOP,
    },
];

impl Device {
    /// Look a profile up by name, ignoring ASCII case.
    pub fn find(name: &str) -> Result<&'static Device> {
        DEVICES
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                Error::Environment(format!(
                    "unknown device '{}' (use --list to see the available profiles)",
                    name
                ))
            })
    }
}
