use std::fmt;

use tracing::{trace, warn};

use super::ProcessAccess;
use crate::error::Result;

/// Page protection flags, using the Windows `PAGE_*` encoding
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Protection(pub u32);

impl Protection {
    pub const NOACCESS: Protection = Protection(0x01);
    pub const READONLY: Protection = Protection(0x02);
    pub const READWRITE: Protection = Protection(0x04);
    pub const WRITECOPY: Protection = Protection(0x08);
    pub const EXECUTE: Protection = Protection(0x10);
    pub const EXECUTE_READ: Protection = Protection(0x20);
    pub const EXECUTE_READWRITE: Protection = Protection(0x40);
    pub const EXECUTE_WRITECOPY: Protection = Protection(0x80);
    pub const GUARD: Protection = Protection(0x100);

    const READABLE: u32 = Self::READONLY.0
        | Self::READWRITE.0
        | Self::WRITECOPY.0
        | Self::EXECUTE_READ.0
        | Self::EXECUTE_READWRITE.0
        | Self::EXECUTE_WRITECOPY.0;

    pub fn contains(self, other: Protection) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_readable(self) -> bool {
        !self.contains(Self::GUARD) && self.0 & Self::READABLE != 0
    }
}

impl fmt::Debug for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Protection({:#x})", self.0)
    }
}

/// A contiguous run of pages sharing the same state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    pub base: u64,
    pub size: u64,
    pub protection: Protection,
    pub committed: bool,
}

impl RegionInfo {
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }
}

/// Scoped protection change.
///
/// The previous protection is put back when the guard is dropped, so every
/// exit path out of the region copy restores the target's pages.
pub struct ProtectionGuard<'a, P: ProcessAccess + ?Sized> {
    access: &'a P,
    base: u64,
    size: usize,
    previous: Protection,
}

impl<'a, P: ProcessAccess + ?Sized> ProtectionGuard<'a, P> {
    pub fn acquire(
        access: &'a P,
        base: u64,
        size: usize,
        protection: Protection,
    ) -> Result<Self> {
        let previous = access.set_protection(base, size, protection)?;
        trace!(
            "Protection of {:#x}+{:#x} changed {:?} -> {:?}",
            base, size, previous, protection
        );
        Ok(Self {
            access,
            base,
            size,
            previous,
        })
    }

    pub fn previous(&self) -> Protection {
        self.previous
    }
}

impl<P: ProcessAccess + ?Sized> Drop for ProtectionGuard<'_, P> {
    fn drop(&mut self) {
        if let Err(e) = self
            .access
            .set_protection(self.base, self.size, self.previous)
        {
            warn!(
                "Failed to restore protection {:?} at {:#x}: {}",
                self.previous, self.base, e
            );
        }
    }
}
