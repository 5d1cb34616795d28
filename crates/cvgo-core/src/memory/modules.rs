use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ProcessAccess;
use crate::error::{Error, Result};

/// A module loaded in the target process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

impl ModuleRecord {
    pub fn new(name: impl Into<String>, base: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            base,
            size,
        }
    }

    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// Name → module cache for one attach.
///
/// Built once from the target's module list and only refreshed through
/// [`ModuleTable::reinitialize`]. Lookups ignore ASCII case.
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    wanted: Vec<String>,
    modules: HashMap<String, ModuleRecord>,
}

impl ModuleTable {
    /// Record the requested modules from the target's module list.
    ///
    /// Requested modules that are not loaded are logged and left out; asking
    /// for them later yields [`Error::ModuleNotFound`].
    pub fn load<P, S>(access: &P, names: &[S]) -> Result<Self>
    where
        P: ProcessAccess + ?Sized,
        S: AsRef<str>,
    {
        let mut table = Self {
            wanted: names.iter().map(|n| n.as_ref().to_string()).collect(),
            modules: HashMap::new(),
        };
        table.reinitialize(access)?;
        Ok(table)
    }

    /// Build a table from known records
    pub fn from_records(records: impl IntoIterator<Item = ModuleRecord>) -> Self {
        let modules: HashMap<String, ModuleRecord> = records
            .into_iter()
            .map(|record| (record.name.to_ascii_lowercase(), record))
            .collect();
        Self {
            wanted: modules.values().map(|m| m.name.clone()).collect(),
            modules,
        }
    }

    /// Drop every cached record and enumerate the target again
    pub fn reinitialize<P: ProcessAccess + ?Sized>(&mut self, access: &P) -> Result<()> {
        self.modules.clear();
        let loaded = access.modules()?;

        for name in &self.wanted {
            match loaded.iter().find(|m| m.name.eq_ignore_ascii_case(name)) {
                Some(module) => {
                    debug!(
                        "Module {} at {:#x} (size {:#x})",
                        module.name, module.base, module.size
                    );
                    self.modules
                        .insert(name.to_ascii_lowercase(), module.clone());
                }
                None => warn!("Module {} is not loaded in the target", name),
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ModuleRecord> {
        self.modules
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockProcess;

    fn process() -> MockProcess {
        MockProcess::builder()
            .module("engine.dll", 0x1000_0000, 0x20_0000)
            .module("client.dll", 0x2000_0000, 0x40_0000)
            .module("kernel32.dll", 0x7000_0000, 0x10_0000)
            .build()
    }

    #[test]
    fn test_load_records_only_requested_modules() {
        let table = ModuleTable::load(&process(), &["Client.DLL", "engine.dll"]).unwrap();
        assert_eq!(table.len(), 2);

        let client = table.get("client.dll").unwrap();
        assert_eq!(client.base, 0x2000_0000);
        assert_eq!(client.end(), 0x2040_0000);
        assert!(table.get("kernel32.dll").is_err());
    }

    #[test]
    fn test_missing_module_is_reported_on_lookup() {
        let table = ModuleTable::load(&process(), &["server.dll"]).unwrap();
        assert!(table.is_empty());
        assert!(matches!(
            table.get("server.dll"),
            Err(Error::ModuleNotFound(name)) if name == "server.dll"
        ));
    }

    #[test]
    fn test_reinitialize_picks_up_new_base() {
        let mut table = ModuleTable::load(&process(), &["client.dll"]).unwrap();
        let moved = MockProcess::builder()
            .module("client.dll", 0x3000_0000, 0x40_0000)
            .build();

        table.reinitialize(&moved).unwrap();
        assert_eq!(table.get("client.dll").unwrap().base, 0x3000_0000);
    }

    #[test]
    fn test_module_contains_is_half_open() {
        let module = ModuleRecord::new("a.dll", 0x1000, 0x100);
        assert!(module.contains(0x1000));
        assert!(module.contains(0x10FF));
        assert!(!module.contains(0x1100));
    }
}
