//! Network profile: one SSID/password pair.
//!
//! Profiles are stored exactly as they sit in the persisted record: a
//! NUL-padded 32-byte SSID field and a NUL-padded 64-byte password field.
//! Keeping the raw fields means a record read from flash survives a
//! decode/encode cycle byte for byte.
//!
//! # Example
//!
//! ```
//! use bmp_wifi_esp32::config::NetworkProfile;
//!
//! let profile = NetworkProfile::new("workshop", "soldering-iron").unwrap();
//! assert_eq!(profile.ssid(), b"workshop");
//! assert!(!profile.is_open());
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A stored SSID/password pair identifying one joinable network.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct NetworkProfile {
    ssid: [u8; MAX_SSID_LEN],
    password: [u8; MAX_PASSWORD_LEN],
}

impl NetworkProfile {
    /// Create a validated profile.
    ///
    /// An empty password means an open network.
    pub fn new(ssid: impl AsRef<[u8]>, password: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let ssid = ssid.as_ref();
        let password = password.as_ref();
        validate(ssid, password)?;
        Ok(Self::from_truncated(ssid, password))
    }

    /// Create a profile for an open network (no password).
    pub fn open(ssid: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        Self::new(ssid, b"")
    }

    /// An unused slot: both fields zeroed.
    pub fn empty() -> Self {
        Self {
            ssid: [0; MAX_SSID_LEN],
            password: [0; MAX_PASSWORD_LEN],
        }
    }

    /// Build a profile from raw persisted fields without validation.
    pub fn from_raw(ssid: [u8; MAX_SSID_LEN], password: [u8; MAX_PASSWORD_LEN]) -> Self {
        Self { ssid, password }
    }

    /// Copy each value into its field, dropping whatever does not fit.
    pub(crate) fn from_truncated(ssid: &[u8], password: &[u8]) -> Self {
        let mut profile = Self::empty();
        let ssid_len = ssid.len().min(MAX_SSID_LEN);
        profile.ssid[..ssid_len].copy_from_slice(&ssid[..ssid_len]);
        let password_len = password.len().min(MAX_PASSWORD_LEN);
        profile.password[..password_len].copy_from_slice(&password[..password_len]);
        profile
    }

    /// SSID bytes up to the first NUL.
    pub fn ssid(&self) -> &[u8] {
        until_nul(&self.ssid)
    }

    /// Password bytes up to the first NUL.
    pub fn password(&self) -> &[u8] {
        until_nul(&self.password)
    }

    /// SSID for log output. Invalid UTF-8 is replaced.
    pub fn ssid_lossy(&self) -> String {
        String::from_utf8_lossy(self.ssid()).into_owned()
    }

    /// Check if this is an open network (no password).
    pub fn is_open(&self) -> bool {
        self.password().is_empty()
    }

    /// An unused slot has no SSID.
    pub fn is_empty(&self) -> bool {
        self.ssid().is_empty()
    }

    /// Raw SSID field as persisted.
    pub fn raw_ssid(&self) -> &[u8; MAX_SSID_LEN] {
        &self.ssid
    }

    /// Raw password field as persisted.
    pub fn raw_password(&self) -> &[u8; MAX_PASSWORD_LEN] {
        &self.password
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkProfile")
            .field("ssid", &self.ssid_lossy())
            .field("password", &if self.is_open() { "" } else { "****" })
            .finish()
    }
}

fn until_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

fn validate(ssid: &[u8], password: &[u8]) -> Result<(), ConfigError> {
    if ssid.is_empty() {
        return Err(ConfigError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    if ssid.contains(&0) {
        return Err(ConfigError::InvalidFormat("SSID contains NUL".into()));
    }

    // Empty is OK for open networks
    if !password.is_empty() && password.len() < MIN_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooShort {
            len: password.len(),
            min: MIN_PASSWORD_LEN,
        });
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooLong {
            len: password.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    if password.contains(&0) {
        return Err(ConfigError::InvalidFormat("password contains NUL".into()));
    }

    Ok(())
}

/// Errors that can occur while building or decoding configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for WPA2.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// Station slot index out of range.
    SlotOutOfRange { slot: usize, slots: usize },
    /// Stored record has the wrong size.
    WrongLength { len: usize, expected: usize },
    /// Stored record carries an unknown magic value.
    BadMagic { found: u32 },
    /// Invalid data format during deserialization.
    InvalidFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::SlotOutOfRange { slot, slots } => {
                write!(f, "station slot {} out of range ({} slots)", slot, slots)
            }
            Self::WrongLength { len, expected } => {
                write!(f, "record is {} bytes (expected {})", len, expected)
            }
            Self::BadMagic { found } => write!(f, "bad magic: {:#010x}", found),
            Self::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
