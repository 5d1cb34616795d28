//! Win32 backend for [`ProcessAccess`].

use std::ffi::c_void;
use std::mem;

use tracing::debug;
use windows::Win32::Foundation::{BOOL, CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
    Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEMORY_BASIC_INFORMATION, PAGE_PROTECTION_FLAGS, VirtualProtectEx,
    VirtualQueryEx,
};
use windows::Win32::System::Threading::{IsWow64Process, OpenProcess, PROCESS_ALL_ACCESS};

use super::{ModuleRecord, PointerWidth, ProcessAccess, Protection, RegionInfo};
use crate::error::{Error, Result};

/// Closes a Win32 handle on drop
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by a successful Win32 call and is closed once.
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

/// Find the id of the first process whose executable name matches (ASCII case-insensitive)
pub fn find_process_id(exe_name: &str) -> Result<u32> {
    // SAFETY: the snapshot handle is owned for the duration of the walk and the
    // entry struct is sized as the API requires.
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
            .map_err(|e| Error::ProcessOpenFailed(format!("process snapshot failed: {}", e)))?;
        let snapshot = OwnedHandle(snapshot);

        let mut entry: PROCESSENTRY32W = mem::zeroed();
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

        if Process32FirstW(snapshot.0, &mut entry).is_ok() {
            loop {
                if wide_to_string(&entry.szExeFile).eq_ignore_ascii_case(exe_name) {
                    return Ok(entry.th32ProcessID);
                }
                if Process32NextW(snapshot.0, &mut entry).is_err() {
                    break;
                }
            }
        }
    }

    Err(Error::ProcessNotFound(exe_name.to_string()))
}

/// An opened target process
pub struct WindowsProcess {
    pid: u32,
    handle: OwnedHandle,
    width: PointerWidth,
}

impl WindowsProcess {
    pub fn open(pid: u32) -> Result<Self> {
        // SAFETY: OpenProcess has no pointer arguments; the returned handle is owned.
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, BOOL::from(false), pid) }
            .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;
        let handle = OwnedHandle(handle);

        let width = if cfg!(target_pointer_width = "32") {
            PointerWidth::U32
        } else {
            let mut wow64 = BOOL::from(false);
            // SAFETY: `wow64` outlives the call.
            unsafe { IsWow64Process(handle.0, &mut wow64) }
                .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;
            if wow64.as_bool() {
                PointerWidth::U32
            } else {
                PointerWidth::U64
            }
        };

        debug!("Opened process {} ({:?} pointers)", pid, width);
        Ok(Self { pid, handle, width })
    }

    /// Find a process by executable name and open it
    pub fn find_and_open(exe_name: &str) -> Result<Self> {
        Self::open(find_process_id(exe_name)?)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl ProcessAccess for WindowsProcess {
    fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    fn modules(&self) -> Result<Vec<ModuleRecord>> {
        let mut modules = Vec::new();

        // SAFETY: see `find_process_id`.
        unsafe {
            let snapshot =
                CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, self.pid)
                    .map_err(|e| {
                        Error::ProcessOpenFailed(format!("module snapshot failed: {}", e))
                    })?;
            let snapshot = OwnedHandle(snapshot);

            let mut entry: MODULEENTRY32W = mem::zeroed();
            entry.dwSize = mem::size_of::<MODULEENTRY32W>() as u32;

            if Module32FirstW(snapshot.0, &mut entry).is_ok() {
                loop {
                    modules.push(ModuleRecord::new(
                        wide_to_string(&entry.szModule),
                        entry.modBaseAddr as u64,
                        u64::from(entry.modBaseSize),
                    ));
                    if Module32NextW(snapshot.0, &mut entry).is_err() {
                        break;
                    }
                }
            }
        }

        Ok(modules)
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0usize;

        // SAFETY: `buffer` holds `size` writable bytes.
        unsafe {
            ReadProcessMemory(
                self.handle.0,
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                size,
                Some(&mut bytes_read as *mut usize),
            )
        }
        .map_err(|e| Error::access_denied(address, e.to_string()))?;

        if bytes_read != size {
            return Err(Error::access_denied(
                address,
                format!("partial read: {} of {} bytes", bytes_read, size),
            ));
        }
        Ok(buffer)
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        let mut written = 0usize;

        // SAFETY: `data` is valid for `data.len()` bytes.
        unsafe {
            WriteProcessMemory(
                self.handle.0,
                address as *const c_void,
                data.as_ptr() as *const c_void,
                data.len(),
                Some(&mut written as *mut usize),
            )
        }
        .map_err(|e| Error::access_denied(address, e.to_string()))?;

        if written != data.len() {
            return Err(Error::access_denied(
                address,
                format!("partial write: {} of {} bytes", written, data.len()),
            ));
        }
        Ok(())
    }

    fn query_region(&self, address: u64) -> Result<RegionInfo> {
        // SAFETY: `mbi` is a properly sized out-parameter.
        unsafe {
            let mut mbi: MEMORY_BASIC_INFORMATION = mem::zeroed();
            let written = VirtualQueryEx(
                self.handle.0,
                Some(address as *const c_void),
                &mut mbi,
                mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            );
            if written == 0 {
                return Err(Error::access_denied(address, "VirtualQueryEx failed"));
            }

            Ok(RegionInfo {
                base: mbi.BaseAddress as u64,
                size: mbi.RegionSize as u64,
                protection: Protection(mbi.Protect.0),
                committed: mbi.State == MEM_COMMIT,
            })
        }
    }

    fn set_protection(
        &self,
        base: u64,
        size: usize,
        protection: Protection,
    ) -> Result<Protection> {
        let mut previous = PAGE_PROTECTION_FLAGS(0);

        // SAFETY: `previous` outlives the call; the target range is owned by the target.
        unsafe {
            VirtualProtectEx(
                self.handle.0,
                base as *const c_void,
                size,
                PAGE_PROTECTION_FLAGS(protection.0),
                &mut previous,
            )
        }
        .map_err(|e| Error::access_denied(base, e.to_string()))?;

        Ok(Protection(previous.0))
    }
}
