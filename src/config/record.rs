//! Persisted device network configuration record.
//!
//! The record is stored as a single opaque blob with a fixed layout:
//!
//! ```text
//! offset  size  field
//! 0       4     magic (u32, little-endian)
//! 4       100   access point profile
//! 104     800   8 station profiles
//! 904     1     station validity mask (bit per slot)
//! 905     3     zero padding
//! ```
//!
//! Each profile slot is `ssid[32] | password[64] | padding[4]`.

use super::profile::{ConfigError, NetworkProfile, MAX_PASSWORD_LEN, MAX_SSID_LEN};

/// Sentinel marking a valid record. Anything else regenerates defaults.
pub const CONFIG_MAGIC: u32 = 0xAA25_D294;

/// Number of stored station profiles.
pub const STATION_SLOTS: usize = 8;

/// Size of one profile slot in the record.
pub const SLOT_LEN: usize = MAX_SSID_LEN + MAX_PASSWORD_LEN + SLOT_PADDING;

/// Total record size in bytes.
pub const RECORD_LEN: usize = MAGIC_LEN + SLOT_LEN * (1 + STATION_SLOTS) + 1 + RECORD_PADDING;

const MAGIC_LEN: usize = 4;
const SLOT_PADDING: usize = 4;
const RECORD_PADDING: usize = 3;
const MASK_OFFSET: usize = MAGIC_LEN + SLOT_LEN * (1 + STATION_SLOTS);

/// Device network configuration: fallback AP profile plus station profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNetworkConfig {
    /// Must equal [`CONFIG_MAGIC`] for the record to be trusted.
    pub magic: u32,
    /// Profile broadcast when acting as an access point.
    pub ap_profile: NetworkProfile,
    /// Client profiles, scanned in index order.
    pub sta_profiles: [NetworkProfile; STATION_SLOTS],
    /// A `1` bit marks the station slot at that index as valid.
    pub sta_mask: u8,
}

impl DeviceNetworkConfig {
    /// A fresh record with the given AP profile and no station profiles.
    pub fn new(ap_profile: NetworkProfile) -> Self {
        Self {
            magic: CONFIG_MAGIC,
            ap_profile,
            sta_profiles: std::array::from_fn(|_| NetworkProfile::empty()),
            sta_mask: 0,
        }
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == CONFIG_MAGIC
    }

    /// Whether the mask marks `slot` as valid.
    pub fn is_slot_valid(&self, slot: usize) -> bool {
        slot < STATION_SLOTS && self.sta_mask & (1 << slot) != 0
    }

    /// Store a station profile and mark its slot valid.
    pub fn set_station(&mut self, slot: usize, profile: NetworkProfile) -> Result<(), ConfigError> {
        let entry = self
            .sta_profiles
            .get_mut(slot)
            .ok_or(ConfigError::SlotOutOfRange {
                slot,
                slots: STATION_SLOTS,
            })?;
        *entry = profile;
        self.sta_mask |= 1 << slot;
        Ok(())
    }

    /// Empty a station slot and clear its mask bit.
    pub fn clear_station(&mut self, slot: usize) -> Result<(), ConfigError> {
        let entry = self
            .sta_profiles
            .get_mut(slot)
            .ok_or(ConfigError::SlotOutOfRange {
                slot,
                slots: STATION_SLOTS,
            })?;
        *entry = NetworkProfile::empty();
        self.sta_mask &= !(1 << slot);
        Ok(())
    }

    /// Serialize to the persisted byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(RECORD_LEN);
        bytes.extend_from_slice(&self.magic.to_le_bytes());
        write_slot(&mut bytes, &self.ap_profile);
        for profile in &self.sta_profiles {
            write_slot(&mut bytes, profile);
        }
        bytes.push(self.sta_mask);
        bytes.extend_from_slice(&[0; RECORD_PADDING]);
        debug_assert_eq!(bytes.len(), RECORD_LEN);
        bytes
    }

    /// Deserialize from the persisted byte layout.
    ///
    /// Fails on a length mismatch or an unknown magic value.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() != RECORD_LEN {
            return Err(ConfigError::WrongLength {
                len: bytes.len(),
                expected: RECORD_LEN,
            });
        }

        let mut magic = [0u8; MAGIC_LEN];
        magic.copy_from_slice(&bytes[..MAGIC_LEN]);
        let magic = u32::from_le_bytes(magic);
        if magic != CONFIG_MAGIC {
            return Err(ConfigError::BadMagic { found: magic });
        }

        let slot_at = |index: usize| {
            let start = MAGIC_LEN + index * SLOT_LEN;
            read_slot(&bytes[start..start + SLOT_LEN])
        };

        Ok(Self {
            magic,
            ap_profile: slot_at(0),
            sta_profiles: std::array::from_fn(|i| slot_at(i + 1)),
            sta_mask: bytes[MASK_OFFSET],
        })
    }
}

fn write_slot(bytes: &mut Vec<u8>, profile: &NetworkProfile) {
    bytes.extend_from_slice(profile.raw_ssid());
    bytes.extend_from_slice(profile.raw_password());
    bytes.extend_from_slice(&[0; SLOT_PADDING]);
}

fn read_slot(slot: &[u8]) -> NetworkProfile {
    let mut ssid = [0u8; MAX_SSID_LEN];
    ssid.copy_from_slice(&slot[..MAX_SSID_LEN]);
    let mut password = [0u8; MAX_PASSWORD_LEN];
    password.copy_from_slice(&slot[MAX_SSID_LEN..MAX_SSID_LEN + MAX_PASSWORD_LEN]);
    NetworkProfile::from_raw(ssid, password)
}
