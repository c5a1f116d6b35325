//! Scan ranking and profile matching.
//!
//! Scan results are walked strongest first; for each one the stored station
//! profiles are checked in slot order. The strongest visible network that
//! has any stored profile wins, even if a weaker network would match an
//! earlier slot.
//!
//! # Example
//!
//! ```
//! use bmp_wifi_esp32::config::{MaskPolicy, NetworkProfile};
//! use bmp_wifi_esp32::wifi::{match_profile, rank, ScanRecord};
//!
//! let mut results = vec![ScanRecord::new("A", -80), ScanRecord::new("B", -40)];
//! rank(&mut results);
//!
//! let stored = [
//!     NetworkProfile::new("A", "password-a").unwrap(),
//!     NetworkProfile::new("B", "password-b").unwrap(),
//! ];
//! let chosen = match_profile(&results, &stored, 0b11, MaskPolicy::Ignore).unwrap();
//! assert_eq!(chosen.ssid(), b"B");
//! ```

use super::driver::ScanRecord;
use crate::config::{MaskPolicy, NetworkProfile};

/// Sort scan results by signal strength, strongest first.
///
/// The sort is stable: equal RSSI keeps driver order.
pub fn rank(results: &mut [ScanRecord]) {
    results.sort_by(|a, b| b.rssi.cmp(&a.rssi));
}

/// Pick the stored profile to join, if any.
///
/// `results` must already be ranked. Slots with an empty SSID never match.
/// With [`MaskPolicy::Enforce`], slots whose bit in `sta_mask` is clear are
/// skipped as well.
pub fn match_profile<'a>(
    results: &[ScanRecord],
    profiles: &'a [NetworkProfile],
    sta_mask: u8,
    policy: MaskPolicy,
) -> Option<&'a NetworkProfile> {
    let eligible = |slot: usize, profile: &NetworkProfile| {
        if profile.is_empty() {
            return false;
        }
        match policy {
            MaskPolicy::Ignore => true,
            MaskPolicy::Enforce => slot < 8 && sta_mask & (1 << slot) != 0,
        }
    };

    results.iter().find_map(|seen| {
        profiles
            .iter()
            .enumerate()
            .find(|&(slot, profile)| eligible(slot, profile) && profile.ssid() == seen.ssid.as_slice())
            .map(|(_, profile)| profile)
    })
}
