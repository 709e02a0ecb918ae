//! Device identity used as the MQTT client id.

use core::fmt::Write;

use heapless::String;

/// Maximum length of a device identity, in bytes.
pub const MAX_IDENTITY_LEN: usize = 64;

/// Device name used when the firmware does not configure one.
pub const DEFAULT_DEVICE_NAME: &str = "Bitdoglab";

/// Number of board-id bytes rendered into the unique suffix (four hex digits).
const SUFFIX_BYTES: usize = 2;

/// The immutable identity of this device, computed once at boot.
///
/// Either a fixed name, or the name followed by a lower-cased hex suffix
/// derived from the board's unique id so that several boards flashed with the
/// same firmware do not collide on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String<MAX_IDENTITY_LEN>,
}

impl DeviceIdentity {
    /// Create an identity made of `name` alone.
    ///
    /// Names longer than [`MAX_IDENTITY_LEN`] are truncated on a character
    /// boundary.
    pub fn fixed(name: &str) -> Self {
        let mut id = String::new();
        push_truncated(&mut id, name);
        Self { id }
    }

    /// Create an identity made of `name` and a suffix taken from `board_id`.
    ///
    /// The suffix is the first four hex digits of the board id, lower-cased.
    /// If the name already fills the identity, the suffix is dropped.
    pub fn with_board_id(name: &str, board_id: &[u8]) -> Self {
        let mut identity = Self::fixed(name);
        for byte in board_id.iter().take(SUFFIX_BYTES) {
            if write!(identity.id, "{byte:02x}").is_err() {
                break;
            }
        }
        identity
    }

    /// The identity string.
    pub fn as_str(&self) -> &str {
        self.id.as_str()
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::fixed(DEFAULT_DEVICE_NAME)
    }
}

impl core::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn push_truncated<const N: usize>(out: &mut String<N>, s: &str) {
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
}
