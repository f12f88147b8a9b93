//! Persistent device configuration in the first flash sector.
//!
//! Layout of sector 0:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "CCF1"
//! 4       32    SHA-256 digest of the device PIN
//! 36      64    master seed
//! ```
//!
//! An erased magic means "not provisioned". Provisioning erases the
//! sector first so every write programs fresh (all-ones) cells.
//!
//! # Security
//!
//! - The PIN is never stored; only its digest is, and comparisons
//!   against it are constant-time
//! - The in-memory seed copy is zeroized when the config is dropped

use common::Error;
use log::warn;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::flash::{Flash, SECTOR_SIZE};

const MAGIC: [u8; 4] = *b"CCF1";

const MAGIC_OFFSET: usize = 0;
const PIN_OFFSET: usize = 4;
const SEED_OFFSET: usize = 36;
const CONFIG_LEN: usize = SEED_OFFSET + 64;

/// Provisioned device secrets, loaded from or destined for flash.
pub struct DeviceConfig {
    pub pin_digest: [u8; 32],
    pub seed: Zeroizing<[u8; 64]>,
}

/// Reads the configuration sector.
///
/// Returns `Ok(None)` when the magic is absent (wiped or never
/// provisioned). Flash access failures here mean the region is
/// misconfigured and surface as `ProcessError`.
pub fn load(flash: &impl Flash) -> Result<Option<DeviceConfig>, Error> {
    let mut raw = [0u8; CONFIG_LEN];
    flash.read(0, &mut raw).map_err(|e| {
        warn!("config read failed: {e}");
        Error::ProcessError
    })?;

    if raw[MAGIC_OFFSET..PIN_OFFSET] != MAGIC {
        return Ok(None);
    }

    let mut pin_digest = [0u8; 32];
    pin_digest.copy_from_slice(&raw[PIN_OFFSET..SEED_OFFSET]);
    let mut seed = Zeroizing::new([0u8; 64]);
    seed.copy_from_slice(&raw[SEED_OFFSET..CONFIG_LEN]);

    Ok(Some(DeviceConfig { pin_digest, seed }))
}

/// Writes a fresh configuration, erasing the sector first.
pub fn provision(
    flash: &mut impl Flash,
    pin_digest: &[u8; 32],
    seed: &[u8; 64],
) -> Result<(), Error> {
    let result = (|| {
        flash.erase_sectors(0, SECTOR_SIZE)?;
        flash.write(MAGIC_OFFSET, &MAGIC)?;
        flash.write(PIN_OFFSET, pin_digest)?;
        flash.write(SEED_OFFSET, seed)
    })();

    result.map_err(|e| {
        warn!("config write failed: {e}");
        Error::ProcessError
    })
}

/// Destroys the configuration by erasing its sector.
pub fn wipe(flash: &mut impl Flash) -> Result<(), Error> {
    flash.erase_sectors(0, SECTOR_SIZE).map_err(|e| {
        warn!("config erase failed: {e}");
        Error::ProcessError
    })
}

/// Digest under which a PIN is stored and compared.
pub fn pin_digest(pin: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.finalize().into()
}

/// Constant-time PIN check against the stored digest.
pub fn pin_matches(config: &DeviceConfig, pin: &str) -> bool {
    pin_digest(pin).ct_eq(&config.pin_digest).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::{RamFlash, ERASED_BYTE, FLASH_TOTAL_SIZE};

    fn seed() -> [u8; 64] {
        let mut s = [0u8; 64];
        for (i, b) in s.iter_mut().enumerate() {
            *b = i as u8;
        }
        s
    }

    #[test]
    fn test_load_unprovisioned_is_none() {
        let flash = RamFlash::new(FLASH_TOTAL_SIZE);
        assert!(load(&flash).unwrap().is_none());
    }

    #[test]
    fn test_provision_then_load_roundtrip() {
        let mut flash = RamFlash::new(FLASH_TOTAL_SIZE);
        let digest = pin_digest("1234");
        provision(&mut flash, &digest, &seed()).unwrap();

        let config = load(&flash).unwrap().unwrap();
        assert_eq!(config.pin_digest, digest);
        assert_eq!(*config.seed, seed());
    }

    #[test]
    fn test_reprovision_overwrites() {
        let mut flash = RamFlash::new(FLASH_TOTAL_SIZE);
        provision(&mut flash, &pin_digest("1234"), &seed()).unwrap();
        // Re-provisioning must succeed despite already-programmed cells
        provision(&mut flash, &pin_digest("9999"), &[0xAA; 64]).unwrap();

        let config = load(&flash).unwrap().unwrap();
        assert_eq!(config.pin_digest, pin_digest("9999"));
        assert_eq!(*config.seed, [0xAA; 64]);
    }

    #[test]
    fn test_wipe_destroys_config() {
        let mut flash = RamFlash::new(FLASH_TOTAL_SIZE);
        provision(&mut flash, &pin_digest("1234"), &seed()).unwrap();
        wipe(&mut flash).unwrap();

        assert!(load(&flash).unwrap().is_none());
        let mut sector = [0u8; SECTOR_SIZE];
        flash.read(0, &mut sector).unwrap();
        assert!(sector.iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn test_pin_matching() {
        let mut flash = RamFlash::new(FLASH_TOTAL_SIZE);
        provision(&mut flash, &pin_digest("1234"), &seed()).unwrap();
        let config = load(&flash).unwrap().unwrap();

        assert!(pin_matches(&config, "1234"));
        assert!(!pin_matches(&config, "12345"));
        assert!(!pin_matches(&config, ""));
    }
}
