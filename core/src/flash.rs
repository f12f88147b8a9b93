//! Flash storage abstraction.
//!
//! One interface, two backends: [`FileFlash`] maps an emulation file
//! into memory the way the device maps its NOR array, and [`RamFlash`]
//! keeps the region in a plain buffer. Core logic never branches on
//! which backend is active.
//!
//! NOR semantics are enforced at this layer: a write may only clear
//! bits relative to the region's current state; setting bits back
//! requires erasing the containing sector, which resets every byte of
//! the sector to `ERASED_BYTE`.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use core::fmt;

use memmap2::{MmapMut, MmapOptions};

/// Value of every byte after a sector erase (all bits set).
pub const ERASED_BYTE: u8 = 0xFF;

/// Minimal erasable unit.
pub const SECTOR_SIZE: usize = 4096;

/// Total size of the emulated flash region.
pub const FLASH_TOTAL_SIZE: usize = 512 * 1024;

/// Errors for in-bounds flash operations.
///
/// Backend-open failures are reported as `io::Error` from the
/// constructors instead; they are fatal to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Access past the end of the region.
    OutOfBounds,
    /// Erase range not aligned to `SECTOR_SIZE`.
    UnalignedErase,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::OutOfBounds => write!(f, "flash access out of bounds"),
            FlashError::UnalignedErase => write!(f, "erase range not sector-aligned"),
        }
    }
}

/// Byte-addressable persistent region with erase/program semantics.
pub trait Flash {
    /// Region size in bytes.
    fn size(&self) -> usize;

    /// Copies `buf.len()` bytes starting at `offset` into `buf`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Programs `bytes` at `offset`. Bits are ANDed into place: a write
    /// can clear bits but never set them.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), FlashError>;

    /// Resets a sector-aligned range to the erased state.
    fn erase_sectors(&mut self, offset: usize, len: usize) -> Result<(), FlashError>;

    /// Full copy of the region, for snapshot comparisons.
    fn snapshot(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size()];
        // Cannot fail: the read covers exactly the region
        let _ = self.read(0, &mut buf);
        buf
    }
}

fn check_range(size: usize, offset: usize, len: usize) -> Result<(), FlashError> {
    let end = offset.checked_add(len).ok_or(FlashError::OutOfBounds)?;
    if end > size {
        return Err(FlashError::OutOfBounds);
    }
    Ok(())
}

fn check_sector_range(size: usize, offset: usize, len: usize) -> Result<(), FlashError> {
    check_range(size, offset, len)?;
    if offset % SECTOR_SIZE != 0 || len % SECTOR_SIZE != 0 {
        return Err(FlashError::UnalignedErase);
    }
    Ok(())
}

fn program(region: &mut [u8], offset: usize, bytes: &[u8]) {
    for (dst, src) in region[offset..offset + bytes.len()].iter_mut().zip(bytes) {
        *dst &= *src;
    }
}

// =============================================================================
// Memory-mapped emulation file
// =============================================================================

/// Flash region backed by a memory-mapped file, as on development hosts.
pub struct FileFlash {
    map: MmapMut,
    size: usize,
}

impl FileFlash {
    /// Opens or creates the backing store.
    ///
    /// A store smaller than `size` (including a fresh file) is extended
    /// to exactly `size` and fully erased; an already-correctly-sized
    /// store is mapped untouched. Any failure here leaves the device
    /// without trustworthy persistence and must terminate the process.
    pub fn open(path: &Path, size: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let len = file.metadata()?.len();
        let fresh = len < size as u64;
        if fresh {
            file.set_len(size as u64)?;
        }

        let mut map = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
        if fresh {
            map.fill(ERASED_BYTE);
            map.flush()?;
        }

        Ok(Self { map, size })
    }
}

impl Flash for FileFlash {
    fn size(&self) -> usize {
        self.size
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        check_range(self.size, offset, buf.len())?;
        buf.copy_from_slice(&self.map[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), FlashError> {
        check_range(self.size, offset, bytes.len())?;
        program(&mut self.map, offset, bytes);
        Ok(())
    }

    fn erase_sectors(&mut self, offset: usize, len: usize) -> Result<(), FlashError> {
        check_sector_range(self.size, offset, len)?;
        self.map[offset..offset + len].fill(ERASED_BYTE);
        Ok(())
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Flash region held in RAM; stands in for the physical array in tests.
pub struct RamFlash {
    bytes: Vec<u8>,
}

impl RamFlash {
    /// Creates a fully-erased region of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![ERASED_BYTE; size],
        }
    }
}

impl Flash for RamFlash {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        check_range(self.bytes.len(), offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), FlashError> {
        check_range(self.bytes.len(), offset, bytes.len())?;
        program(&mut self.bytes, offset, bytes);
        Ok(())
    }

    fn erase_sectors(&mut self, offset: usize, len: usize) -> Result<(), FlashError> {
        check_sector_range(self.bytes.len(), offset, len)?;
        self.bytes[offset..offset + len].fill(ERASED_BYTE);
        Ok(())
    }
}
