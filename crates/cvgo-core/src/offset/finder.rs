use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{SignaturePattern, SignatureScanner, SignatureSet, resolve};
use crate::error::Result;
use crate::memory::{ModuleTable, ProcessAccess};

/// A signature resolved against a live module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOffset {
    pub name: String,
    pub module: String,
    /// Module-relative result of the offset chain
    pub offset: u64,
    /// `module base + offset`
    pub address: u64,
}

/// Offsets resolved at startup, in signature order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOffsets {
    pub version: String,
    pub entries: Vec<ResolvedOffset>,
}

impl ResolvedOffsets {
    pub fn get(&self, name: &str) -> Option<&ResolvedOffset> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn load_offsets<P: AsRef<Path>>(path: P) -> Result<ResolvedOffsets> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_offsets<P: AsRef<Path>>(path: P, offsets: &ResolvedOffsets) -> Result<()> {
    let content = serde_json::to_string_pretty(offsets)?;
    fs::write(path, content)?;
    Ok(())
}

/// Scans and resolves signatures against the modules of one attach
pub struct OffsetFinder<'a, P: ProcessAccess + ?Sized> {
    access: &'a P,
    modules: &'a ModuleTable,
}

impl<'a, P: ProcessAccess + ?Sized> OffsetFinder<'a, P> {
    pub fn new(access: &'a P, modules: &'a ModuleTable) -> Self {
        Self { access, modules }
    }

    /// Resolve one signature.
    ///
    /// `Ok(None)` means the pattern does not occur in its module; an error is
    /// returned only when the module itself is not in the table.
    pub fn find(&self, signature: &SignaturePattern) -> Result<Option<ResolvedOffset>> {
        let module = self.modules.get(signature.module())?;

        let Some(matched) = SignatureScanner::new(self.access).scan(module, signature) else {
            debug!("{}: pattern not found in {}", signature.name(), module.name);
            return Ok(None);
        };

        let offset = resolve(
            self.access,
            module.base,
            matched,
            signature.offsets(),
            signature.mode(),
            signature.extra(),
        );
        let address = self.access.pointer_width().wrap(module.base.wrapping_add(offset));
        debug!(
            "{}: match {:#x}, offset {:#x} ({}), address {:#x}",
            signature.name(),
            matched,
            offset,
            signature.mode(),
            address
        );

        Ok(Some(ResolvedOffset {
            name: signature.name().to_string(),
            module: module.name.clone(),
            offset,
            address,
        }))
    }

    /// Resolve every signature in the set, leaving out the ones that fail
    pub fn find_all(&self, signatures: &SignatureSet) -> ResolvedOffsets {
        let mut resolved = ResolvedOffsets {
            version: signatures.version.clone(),
            entries: Vec::with_capacity(signatures.signatures.len()),
        };

        for signature in &signatures.signatures {
            match self.find(signature) {
                Ok(Some(entry)) => resolved.entries.push(entry),
                Ok(None) => warn!("Signature {} not found", signature.name()),
                Err(e) => warn!("Signature {} skipped: {}", signature.name(), e),
            }
        }

        info!(
            "Resolved {}/{} signatures",
            resolved.len(),
            signatures.signatures.len()
        );
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::{MockProcess, PointerWidth};
    use crate::offset::{AddressingMode, builtin_signatures};

    const CLIENT: u64 = 0x1000_0000;
    const ENGINE: u64 = 0x2000_0000;

    /// Client and engine images containing the built-in signatures
    fn game_process() -> MockProcess {
        let mut client = vec![0xCC; 0x2000];
        let local_player = [
            0x8D, 0x34, 0x85, 0x00, 0x00, 0x00, 0x00, 0x89, 0x15, 0x00, 0x00, 0x00, 0x00, 0x8B,
            0x41, 0x08, 0x8B, 0x48, 0x04, 0x83, 0xF9, 0xFF,
        ];
        client[0x400..0x400 + local_player.len()].copy_from_slice(&local_player);
        client[0x403..0x407].copy_from_slice(&((CLIENT + 0xD3_0000) as u32).to_le_bytes());

        let mut engine = vec![0xCC; 0x1000];
        let view_angles = [
            0xF3, 0x0F, 0x11, 0x80, 0x00, 0x00, 0x00, 0x00, 0xD9, 0x46, 0x04, 0xD9, 0x05,
        ];
        engine[0x80..0x80 + view_angles.len()].copy_from_slice(&view_angles);
        engine[0x84..0x88].copy_from_slice(&0x4D90u32.to_le_bytes());

        MockProcess::builder()
            .pointer_width(PointerWidth::U32)
            .module("client.dll", CLIENT, 0x2000)
            .module("engine.dll", ENGINE, 0x1000)
            .region(CLIENT, &client)
            .region(ENGINE, &engine)
            .build()
    }

    #[test]
    fn test_find_resolves_builtin_signature() {
        let process = game_process();
        let modules = ModuleTable::load(&process, &["client.dll", "engine.dll"]).unwrap();
        let finder = OffsetFinder::new(&process, &modules);

        let signatures = builtin_signatures();
        let local_player = finder
            .find(signatures.get("localPlayer").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(local_player.offset, 0xD3_0004);
        assert_eq!(local_player.address, CLIENT + 0xD3_0004);

        let view_angles = finder
            .find(signatures.get("viewAngles").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(view_angles.offset, 0x4D90);
    }

    #[test]
    fn test_find_not_found_is_none() {
        let process = game_process();
        let modules = ModuleTable::load(&process, &["client.dll"]).unwrap();
        let finder = OffsetFinder::new(&process, &modules);

        let missing = SignaturePattern::from_ida("missing", "client.dll", "DE AD BE EF").unwrap();
        assert!(finder.find(&missing).unwrap().is_none());
    }

    #[test]
    fn test_find_unknown_module_is_error() {
        let process = game_process();
        let modules = ModuleTable::load(&process, &["client.dll"]).unwrap();
        let finder = OffsetFinder::new(&process, &modules);

        let sig = SignaturePattern::from_ida("x", "server.dll", "90")
            .unwrap()
            .with_mode(AddressingMode::Truncated);
        assert!(matches!(finder.find(&sig), Err(Error::ModuleNotFound(_))));
    }

    #[test]
    fn test_find_all_skips_failures() {
        let process = game_process();
        let modules = ModuleTable::load(&process, &["client.dll", "engine.dll"]).unwrap();
        let resolved = OffsetFinder::new(&process, &modules).find_all(&builtin_signatures());

        assert_eq!(resolved.version, "builtin");
        assert_eq!(resolved.len(), 2);
        assert!(resolved.get("localplayer").is_some());
        assert!(resolved.get("viewAngles").is_some());
        assert!(resolved.get("forceAttack").is_none());
    }

    #[test]
    fn test_offsets_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        let offsets = ResolvedOffsets {
            version: "builtin".to_string(),
            entries: vec![ResolvedOffset {
                name: "dwClientState".to_string(),
                module: "engine.dll".to_string(),
                offset: 0x58_CFC4,
                address: ENGINE + 0x58_CFC4,
            }],
        };

        save_offsets(&path, &offsets).unwrap();
        assert_eq!(load_offsets(&path).unwrap(), offsets);
    }
}
