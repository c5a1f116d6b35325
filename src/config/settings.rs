//! Build-time and runtime network settings.
//!
//! Defaults come from environment variables captured at compile time, the
//! same way the firmware's credential utilities are configured:
//!
//! ```text
//! BMP_AP_SSID="bmp" BMP_AP_PASSWORD="secret123" cargo build --features esp32
//! ```

use super::profile::{NetworkProfile, MAX_PASSWORD_LEN, MAX_SSID_LEN};
use super::record::DeviceNetworkConfig;
use std::time::Duration;

/// Access point SSID prefix - set via BMP_AP_SSID at compile time.
const AP_SSID: Option<&str> = option_env!("BMP_AP_SSID");

/// Access point passphrase - set via BMP_AP_PASSWORD at compile time.
/// Empty string for an open access point.
const AP_PASSWORD: Option<&str> = option_env!("BMP_AP_PASSWORD");

/// `"0"` disables the chip-id suffix on the generated SSID.
const AP_SSID_APPEND_CHIPID: Option<&str> = option_env!("BMP_AP_SSID_APPEND_CHIPID");

/// Station hostname - set via BMP_HOSTNAME at compile time.
const HOSTNAME: Option<&str> = option_env!("BMP_HOSTNAME");

pub const DEFAULT_AP_SSID: &str = "blackmagic";
pub const DEFAULT_AP_PASSWORD: &str = "helloworld";

/// Pause between supervisor cycles.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Channel used when broadcasting the fallback access point.
pub const DEFAULT_AP_CHANNEL: u8 = 6;

/// Clients allowed on the fallback access point at once.
pub const DEFAULT_AP_MAX_CONNECTIONS: u16 = 4;

/// How the station validity mask is treated during profile matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskPolicy {
    /// Scan every slot regardless of its mask bit.
    #[default]
    Ignore,
    /// Only slots whose mask bit is set take part in matching.
    Enforce,
}

/// Network settings for the supervisor and radio drivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Prefix of the generated access point SSID.
    pub ap_ssid: String,
    /// Passphrase of the generated access point profile.
    pub ap_password: String,
    /// Append the device identifier to the generated SSID.
    pub append_device_id: bool,
    pub ap_channel: u8,
    pub ap_max_connections: u16,
    /// Let the access point's DHCP server hand out itself as default gateway.
    /// Off by default, so AP clients keep their other route.
    pub ap_offer_router: bool,
    /// Hostname applied to the station interface.
    pub hostname: Option<String>,
    pub scan_interval: Duration,
    pub mask_policy: MaskPolicy,
}

impl NetworkSettings {
    /// Settings from compile-time environment, falling back to built-in defaults.
    pub fn from_build_env() -> Self {
        Self {
            ap_ssid: AP_SSID.unwrap_or(DEFAULT_AP_SSID).to_string(),
            ap_password: AP_PASSWORD.unwrap_or(DEFAULT_AP_PASSWORD).to_string(),
            append_device_id: AP_SSID_APPEND_CHIPID.map_or(true, |v| v.trim() != "0"),
            ap_channel: DEFAULT_AP_CHANNEL,
            ap_max_connections: DEFAULT_AP_MAX_CONNECTIONS,
            ap_offer_router: false,
            hostname: HOSTNAME.filter(|h| !h.is_empty()).map(str::to_string),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            mask_policy: MaskPolicy::default(),
        }
    }

    /// Generated access point profile.
    ///
    /// With a device identifier and `append_device_id` set, the SSID becomes
    /// `<prefix>-<12 hex digits>`. SSID and passphrase are cut one byte short
    /// of their fields so a terminator always remains, never inside a
    /// multi-byte character.
    pub fn default_ap_profile(&self, device_id: Option<[u8; 6]>) -> NetworkProfile {
        let ssid = match device_id {
            Some(id) if self.append_device_id => format!("{}-{}", self.ap_ssid, hex(&id)),
            _ => self.ap_ssid.clone(),
        };
        let ssid = truncate_at_char(&ssid, MAX_SSID_LEN - 1);
        let password = truncate_at_char(&self.ap_password, MAX_PASSWORD_LEN - 1);
        NetworkProfile::from_truncated(ssid.as_bytes(), password.as_bytes())
    }

    /// Value of the DHCP server's router-solicitation option on the access
    /// point interface. Zero withholds the gateway from clients.
    pub fn dhcps_router_offer(&self) -> u8 {
        u8::from(self.ap_offer_router)
    }

    /// Fresh configuration record used on first boot or after corruption.
    pub fn default_config(&self, device_id: Option<[u8; 6]>) -> DeviceNetworkConfig {
        DeviceNetworkConfig::new(self.default_ap_profile(device_id))
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self::from_build_env()
    }
}

/// Longest prefix of `s` that fits in `max` bytes and ends on a char boundary.
fn truncate_at_char(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= max)
        .last()
        .unwrap_or(0);
    &s[..end]
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> NetworkSettings {
        NetworkSettings {
            ap_ssid: "blackmagic".to_string(),
            ap_password: "helloworld".to_string(),
            append_device_id: true,
            ..NetworkSettings::from_build_env()
        }
    }

    #[test]
    fn test_default_ssid_with_device_id() {
        let profile = settings().default_ap_profile(Some([0x24, 0x0a, 0xc4, 0x12, 0x34, 0xab]));
        assert_eq!(profile.ssid(), b"blackmagic-240ac41234ab");
        assert_eq!(profile.password(), b"helloworld");
    }

    #[test]
    fn test_default_ssid_without_suffix() {
        let mut settings = settings();
        settings.append_device_id = false;
        let profile = settings.default_ap_profile(Some([1, 2, 3, 4, 5, 6]));
        assert_eq!(profile.ssid(), b"blackmagic");

        let profile = self::settings().default_ap_profile(None);
        assert_eq!(profile.ssid(), b"blackmagic");
    }

    #[test]
    fn test_default_ssid_leaves_terminator() {
        let mut settings = settings();
        settings.ap_ssid = "a".repeat(40);
        settings.ap_password = "p".repeat(80);
        let profile = settings.default_ap_profile(Some([0; 6]));
        assert_eq!(profile.ssid().len(), MAX_SSID_LEN - 1);
        assert_eq!(profile.raw_ssid()[MAX_SSID_LEN - 1], 0);
        assert_eq!(profile.password().len(), MAX_PASSWORD_LEN - 1);
    }

    #[test]
    fn test_truncation_keeps_whole_characters() {
        let mut settings = settings();
        settings.append_device_id = false;
        // two bytes per char: byte 31 falls inside the 16th char
        settings.ap_ssid = "\u{e9}".repeat(20);
        settings.ap_password = "\u{fc}".repeat(40);
        let profile = settings.default_ap_profile(None);

        assert_eq!(profile.ssid().len(), 30);
        assert!(std::str::from_utf8(profile.ssid()).is_ok());
        assert_eq!(profile.password().len(), 62);
        assert!(std::str::from_utf8(profile.password()).is_ok());
    }

    #[test]
    fn test_access_point_withholds_gateway_by_default() {
        let mut settings = settings();
        assert!(!settings.ap_offer_router);
        assert_eq!(settings.dhcps_router_offer(), 0);

        settings.ap_offer_router = true;
        assert_eq!(settings.dhcps_router_offer(), 1);
    }

    #[test]
    fn test_truncate_at_char() {
        assert_eq!(truncate_at_char("short", 31), "short");
        assert_eq!(truncate_at_char("abc\u{20ac}", 4), "abc");
        assert_eq!(truncate_at_char("\u{20ac}", 2), "");
    }

    #[test]
    fn test_empty_password_gives_open_ap() {
        let mut settings = settings();
        settings.ap_password.clear();
        assert!(settings.default_ap_profile(None).is_open());
    }

    #[test]
    fn test_default_config_has_no_stations() {
        let config = settings().default_config(None);
        assert!(config.has_valid_magic());
        assert_eq!(config.sta_mask, 0);
        assert!(config.sta_profiles.iter().all(NetworkProfile::is_empty));
    }

    #[test]
    fn test_build_env_defaults() {
        let settings = NetworkSettings::from_build_env();
        assert_eq!(settings.scan_interval, Duration::from_secs(5));
        assert_eq!(settings.ap_channel, 6);
        assert_eq!(settings.mask_policy, MaskPolicy::Ignore);
    }
}
