//! Signature scanning over a module's live memory.

use memchr::memchr_iter;
use tracing::{debug, trace};

use crate::memory::{ModuleRecord, ProcessAccess, Protection, ProtectionGuard};
use crate::offset::SignaturePattern;

/// Step used to skip past an address whose region cannot be queried
const PAGE_SIZE: u64 = 0x1000;

/// Lowest index in `buffer` where every non-`?` mask position matches `pattern`.
///
/// `pattern` and `mask` must have the same length.
pub fn find_pattern(buffer: &[u8], pattern: &[u8], mask: &str) -> Option<usize> {
    let mask = mask.as_bytes();
    debug_assert_eq!(pattern.len(), mask.len());
    if pattern.is_empty() || buffer.len() < pattern.len() {
        return None;
    }

    let last = buffer.len() - pattern.len();
    let matches_at = |i: usize| {
        pattern
            .iter()
            .zip(mask)
            .enumerate()
            .all(|(j, (&byte, &m))| m == b'?' || buffer[i + j] == byte)
    };

    if mask[0] == b'?' {
        (0..=last).find(|&i| matches_at(i))
    } else {
        memchr_iter(pattern[0], &buffer[..=last]).find(|&i| matches_at(i))
    }
}

/// Scans module memory region by region
pub struct SignatureScanner<'a, P: ProcessAccess + ?Sized> {
    access: &'a P,
}

impl<'a, P: ProcessAccess + ?Sized> SignatureScanner<'a, P> {
    pub fn new(access: &'a P) -> Self {
        Self { access }
    }

    /// First address inside `module` matching the signature, or `None`
    pub fn scan(&self, module: &ModuleRecord, signature: &SignaturePattern) -> Option<u64> {
        self.scan_range(module.base, module.end(), signature.bytes(), signature.mask())
    }

    /// First address in `[start, end)` matching `pattern`/`mask`, or `None`.
    ///
    /// Each region is copied under a temporary execute-read protection that is
    /// restored before the copy is matched. Regions that cannot be queried,
    /// reprotected or read are skipped.
    pub fn scan_range(&self, start: u64, end: u64, pattern: &[u8], mask: &str) -> Option<u64> {
        let mut cursor = start;

        while cursor < end {
            let region = match self.access.query_region(cursor) {
                Ok(region) if region.size > 0 => region,
                Ok(_) => {
                    cursor = cursor.saturating_add(PAGE_SIZE);
                    continue;
                }
                Err(e) => {
                    trace!("Skipping unqueryable page {:#x}: {}", cursor, e);
                    cursor = cursor.saturating_add(PAGE_SIZE);
                    continue;
                }
            };

            let chunk_start = region.base.max(cursor);
            let chunk_end = region.end().min(end);
            let next = region.end().max(cursor.saturating_add(1));

            if region.committed && chunk_end > chunk_start {
                let size = (chunk_end - chunk_start) as usize;
                if let Some(buffer) = self.copy_region(chunk_start, size) {
                    if let Some(index) = find_pattern(&buffer, pattern, mask) {
                        let address = chunk_start + index as u64;
                        debug!("Pattern matched at {:#x}", address);
                        return Some(address);
                    }
                }
            }

            cursor = next;
        }

        None
    }

    fn copy_region(&self, base: u64, size: usize) -> Option<Vec<u8>> {
        let guard =
            match ProtectionGuard::acquire(self.access, base, size, Protection::EXECUTE_READ) {
                Ok(guard) => guard,
                Err(e) => {
                    trace!("Skipping region {:#x}: {}", base, e);
                    return None;
                }
            };

        let copied = self.access.read_bytes(base, size);
        drop(guard);

        match copied {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                trace!("Skipping region {:#x}: {}", base, e);
                None
            }
        }
    }
}
