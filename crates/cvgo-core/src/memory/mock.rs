//! In-memory stand-in for a target process, for tests.

use std::cell::RefCell;
use std::collections::HashSet;

use super::{ModuleRecord, PointerWidth, ProcessAccess, Protection, RegionInfo};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct MockRegion {
    base: u64,
    data: Vec<u8>,
    protection: Protection,
    committed: bool,
}

impl MockRegion {
    fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// Mock process with explicit regions, protections and failure injection
#[derive(Debug)]
pub struct MockProcess {
    width: PointerWidth,
    modules: Vec<ModuleRecord>,
    regions: RefCell<Vec<MockRegion>>,
    deny_query: HashSet<u64>,
    deny_protect: HashSet<u64>,
    deny_read: HashSet<u64>,
    protection_log: RefCell<Vec<(u64, Protection)>>,
}

impl MockProcess {
    pub fn builder() -> MockProcessBuilder {
        MockProcessBuilder::default()
    }

    /// Every successful protection change, in call order
    pub fn protection_log(&self) -> Vec<(u64, Protection)> {
        self.protection_log.borrow().clone()
    }

    fn region_index(&self, address: u64) -> Option<usize> {
        self.regions.borrow().iter().position(|r| r.contains(address))
    }
}

impl ProcessAccess for MockProcess {
    fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    fn modules(&self) -> Result<Vec<ModuleRecord>> {
        Ok(self.modules.clone())
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let regions = self.regions.borrow();
        let region = regions
            .iter()
            .find(|r| r.contains(address))
            .ok_or_else(|| Error::access_denied(address, "unmapped"))?;

        if self.deny_read.contains(&region.base) || !region.protection.is_readable() {
            return Err(Error::access_denied(address, "region is not readable"));
        }

        let start = (address - region.base) as usize;
        let end = start + size;
        if end > region.data.len() {
            return Err(Error::access_denied(address, "read crosses region end"));
        }
        Ok(region.data[start..end].to_vec())
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        let index = self
            .region_index(address)
            .ok_or_else(|| Error::access_denied(address, "unmapped"))?;
        let mut regions = self.regions.borrow_mut();
        let region = &mut regions[index];

        let start = (address - region.base) as usize;
        let end = start + data.len();
        if end > region.data.len() {
            return Err(Error::access_denied(address, "write crosses region end"));
        }
        region.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn query_region(&self, address: u64) -> Result<RegionInfo> {
        let regions = self.regions.borrow();
        if let Some(region) = regions.iter().find(|r| r.contains(address)) {
            if self.deny_query.contains(&region.base) {
                return Err(Error::access_denied(address, "query denied"));
            }
            return Ok(RegionInfo {
                base: region.base,
                size: region.data.len() as u64,
                protection: region.protection,
                committed: region.committed,
            });
        }

        // Free gap up to the next mapped region
        let next = regions
            .iter()
            .map(|r| r.base)
            .filter(|&base| base > address)
            .min()
            .unwrap_or(u64::MAX);
        Ok(RegionInfo {
            base: address,
            size: next - address,
            protection: Protection::NOACCESS,
            committed: false,
        })
    }

    fn set_protection(
        &self,
        base: u64,
        _size: usize,
        protection: Protection,
    ) -> Result<Protection> {
        let index = self
            .region_index(base)
            .ok_or_else(|| Error::access_denied(base, "unmapped"))?;
        let mut regions = self.regions.borrow_mut();
        let region = &mut regions[index];
        if self.deny_protect.contains(&region.base) {
            return Err(Error::access_denied(base, "protection change denied"));
        }

        let previous = region.protection;
        region.protection = protection;
        self.protection_log.borrow_mut().push((base, protection));
        Ok(previous)
    }
}

#[derive(Debug)]
pub struct MockProcessBuilder {
    width: PointerWidth,
    modules: Vec<ModuleRecord>,
    regions: Vec<MockRegion>,
    deny_query: HashSet<u64>,
    deny_protect: HashSet<u64>,
    deny_read: HashSet<u64>,
}

impl Default for MockProcessBuilder {
    fn default() -> Self {
        Self {
            width: PointerWidth::U64,
            modules: Vec::new(),
            regions: Vec::new(),
            deny_query: HashSet::new(),
            deny_protect: HashSet::new(),
            deny_read: HashSet::new(),
        }
    }
}

impl MockProcessBuilder {
    pub fn pointer_width(mut self, width: PointerWidth) -> Self {
        self.width = width;
        self
    }

    pub fn module(mut self, name: &str, base: u64, size: u64) -> Self {
        self.modules.push(ModuleRecord::new(name, base, size));
        self
    }

    /// Committed, execute-read region
    pub fn region(self, base: u64, data: &[u8]) -> Self {
        self.region_with(base, data, Protection::EXECUTE_READ)
    }

    pub fn region_with(mut self, base: u64, data: &[u8], protection: Protection) -> Self {
        self.regions.push(MockRegion {
            base,
            data: data.to_vec(),
            protection,
            committed: true,
        });
        self
    }

    /// Reserved but uncommitted region
    pub fn reserved(mut self, base: u64, size: usize) -> Self {
        self.regions.push(MockRegion {
            base,
            data: vec![0; size],
            protection: Protection::NOACCESS,
            committed: false,
        });
        self
    }

    pub fn deny_query(mut self, region_base: u64) -> Self {
        self.deny_query.insert(region_base);
        self
    }

    pub fn deny_protect(mut self, region_base: u64) -> Self {
        self.deny_protect.insert(region_base);
        self
    }

    pub fn deny_read(mut self, region_base: u64) -> Self {
        self.deny_read.insert(region_base);
        self
    }

    pub fn build(self) -> MockProcess {
        MockProcess {
            width: self.width,
            modules: self.modules,
            regions: RefCell::new(self.regions),
            deny_query: self.deny_query,
            deny_protect: self.deny_protect,
            deny_read: self.deny_read,
            protection_log: RefCell::new(Vec::new()),
        }
    }
}
