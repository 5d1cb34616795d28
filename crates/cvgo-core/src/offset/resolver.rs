//! Pointer-chain resolution from a signature match to a module offset.

use tracing::{trace, warn};

use crate::memory::ProcessAccess;
use crate::offset::AddressingMode;

/// Mask applied by [`AddressingMode::Truncated`]
pub const TRUNCATED_MASK: u64 = 0xFFFF;

/// Walk `offsets` from `matched` and return the module-relative result.
///
/// Each offset is added to the cursor, the pointer stored there is read
/// (exactly one dereference per offset) and `module_base` is subtracted; the
/// difference is both the running offset and the next cursor. The running
/// offset starts at zero, so an empty chain yields `extra` alone.
///
/// A failed read dereferences to zero and the walk continues; the result is
/// then meaningless and callers must not use it.
pub fn resolve<P: ProcessAccess + ?Sized>(
    access: &P,
    module_base: u64,
    matched: u64,
    offsets: &[i64],
    mode: AddressingMode,
    extra: i64,
) -> u64 {
    let width = access.pointer_width();
    let mut cursor = matched;
    let mut running = 0u64;

    for &offset in offsets {
        let address = width.wrap(cursor.wrapping_add_signed(offset));
        let value = match access.read_pointer(address) {
            Ok(value) => value,
            Err(e) => {
                warn!("Dereference at {:#x} failed: {}", address, e);
                0
            }
        };
        running = width.wrap(value.wrapping_sub(module_base));
        trace!("  [{:#x}] = {:#x} -> {:#x}", address, value, running);
        cursor = running;
    }

    let result = width.wrap(running.wrapping_add_signed(extra));
    match mode {
        AddressingMode::Relative => result,
        AddressingMode::Truncated => result & TRUNCATED_MASK,
    }
}
