//! Access to the target process's memory.
//!
//! Everything above this module talks to the target through [`ProcessAccess`];
//! the Windows backend lives in `windows.rs` and tests use the in-crate mock.

mod modules;
mod protect;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(test)]
pub mod mock;

pub use modules::{ModuleRecord, ModuleTable};
pub use protect::{Protection, ProtectionGuard, RegionInfo};
#[cfg(target_os = "windows")]
pub use windows::{WindowsProcess, find_process_id};

#[cfg(test)]
pub use mock::MockProcess;

use crate::error::{Error, Result};

/// Width of a pointer inside the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    U32,
    U64,
}

impl PointerWidth {
    pub fn size(self) -> usize {
        match self {
            PointerWidth::U32 => 4,
            PointerWidth::U64 => 8,
        }
    }

    /// Wrap a value to the address space of the target
    pub fn wrap(self, value: u64) -> u64 {
        match self {
            PointerWidth::U32 => value & 0xFFFF_FFFF,
            PointerWidth::U64 => value,
        }
    }
}

/// Primitive operations on an opened target process
pub trait ProcessAccess {
    fn pointer_width(&self) -> PointerWidth;

    /// Enumerate the modules loaded in the target
    fn modules(&self) -> Result<Vec<ModuleRecord>>;

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()>;

    /// Describe the region containing `address`
    fn query_region(&self, address: u64) -> Result<RegionInfo>;

    /// Change the protection of `[base, base + size)`, returning the previous value
    fn set_protection(&self, base: u64, size: usize, protection: Protection)
    -> Result<Protection>;

    /// Read a pointer-sized value
    fn read_pointer(&self, address: u64) -> Result<u64> {
        match self.pointer_width() {
            PointerWidth::U32 => self.read_u32(address).map(u64::from),
            PointerWidth::U64 => self.read_u64(address),
        }
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        Ok(u32::from_le_bytes(read_array(self, address)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(read_array(self, address)?))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        Ok(i32::from_le_bytes(read_array(self, address)?))
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        Ok(f32::from_le_bytes(read_array(self, address)?))
    }

    fn write_i32(&self, address: u64, value: i32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_f32(&self, address: u64, value: f32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }
}

fn read_array<P: ProcessAccess + ?Sized, const N: usize>(
    access: &P,
    address: u64,
) -> Result<[u8; N]> {
    let bytes = access.read_bytes(address, N)?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::access_denied(
            address,
            format!("short read: expected {} bytes, got {}", N, bytes.len()),
        )
    })
}
