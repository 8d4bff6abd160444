//! Configuration device trees
//!
//! [`FwConfigDtb`] validates a flattened device tree already in memory and
//! lists the configuration blobs its `dtb-registry` names.
//!
//! A registry entry looks like:
//!
//! ```text
//! tb_fw-config {
//!     load-address = <0x0 0x4001300>;
//!     max-size = <0x200>;
//!     id = <24>;
//! };
//! ```

use fdt_rs::base::{DevTree, DevTreeNode, DevTreeProp};
use fdt_rs::prelude::*;

use super::{ConfigError, ConfigId, ConfigLoader, DtbInfo};

/// FDT header magic, big-endian.
const FDT_MAGIC: u32 = 0xd00d_feed;

/// Bytes of the FDT header.
const FDT_HEADER_SIZE: usize = 40;

/// Capacity of [`DtbRegistry`].
pub const MAX_DTB_INFO: usize = 8;

/// One `dtb-registry` entry as written in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynCfgEntry {
    pub load_address: u64,
    pub max_size: u32,
    pub id: u32,
}

/// A validated configuration device tree.
#[derive(Debug, Clone, Copy)]
pub struct FwConfigDtb<'dt> {
    blob: &'dt [u8],
}

impl<'dt> FwConfigDtb<'dt> {
    /// Validate the tree at the start of `blob`.
    ///
    /// # Errors
    ///
    /// - `BadMagic` if the header magic is not 0xd00dfeed
    /// - `Malformed` if the header is truncated, the total size exceeds
    ///   `blob`, or the structure block does not parse
    pub fn from_bytes(blob: &'dt [u8]) -> Result<Self, ConfigError> {
        if blob.len() < FDT_HEADER_SIZE {
            return Err(ConfigError::Malformed);
        }

        let magic = u32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]);
        if magic != FDT_MAGIC {
            return Err(ConfigError::BadMagic);
        }

        // SAFETY: blob holds at least a full header
        let size = unsafe { DevTree::read_totalsize(blob) }.map_err(|_| ConfigError::Malformed)?;
        if size > blob.len() {
            return Err(ConfigError::Malformed);
        }

        let dtb = Self {
            blob: &blob[..size],
        };
        dtb.tree()?;
        Ok(dtb)
    }

    /// Validate the tree the previous stage left at `addr`.
    ///
    /// # Errors
    ///
    /// `NullPointer` for a zero address, otherwise as
    /// [`from_bytes`](Self::from_bytes).
    ///
    /// # Safety
    ///
    /// A nonzero `addr` must be readable for the FDT header and, if the
    /// magic matches, for the total size the header declares. That memory
    /// must not change while the returned value is alive.
    pub unsafe fn from_addr(addr: usize) -> Result<FwConfigDtb<'static>, ConfigError> {
        if addr == 0 {
            return Err(ConfigError::NullPointer);
        }

        // SAFETY: the caller guarantees the header is readable
        let header = unsafe { core::slice::from_raw_parts(addr as *const u8, FDT_HEADER_SIZE) };
        let head = FwConfigDtb::from_header(header)?;

        // SAFETY: the caller guarantees the declared total size is readable
        let blob = unsafe { core::slice::from_raw_parts(addr as *const u8, head) };
        FwConfigDtb::from_bytes(blob)
    }

    /// Magic check and total size from a bare header.
    fn from_header(header: &[u8]) -> Result<usize, ConfigError> {
        let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if magic != FDT_MAGIC {
            return Err(ConfigError::BadMagic);
        }
        // SAFETY: header is exactly one FDT header
        unsafe { DevTree::read_totalsize(header) }.map_err(|_| ConfigError::Malformed)
    }

    fn tree(&self) -> Result<DevTree<'dt>, ConfigError> {
        // SAFETY: blob passed the magic and size checks in from_bytes
        unsafe { DevTree::new(self.blob) }.map_err(|_| ConfigError::Malformed)
    }

    /// Total size of the tree in bytes
    pub fn size(&self) -> usize {
        self.blob.len()
    }

    /// Call `f` for every node carrying `load-address`, `max-size` and `id`.
    ///
    /// Returns how many entries were visited. Stops at the first error `f`
    /// returns.
    pub fn dyn_cfg_entries<F>(&self, mut f: F) -> Result<usize, ConfigError>
    where
        F: FnMut(DynCfgEntry) -> Result<(), ConfigError>,
    {
        let tree = self.tree()?;
        let mut nodes = tree.nodes();
        let mut count = 0;

        while let Some(node) = nodes.next().map_err(|_| ConfigError::Malformed)? {
            let (Some(addr), Some(size), Some(id)) = (
                find_property(&node, "load-address"),
                find_property(&node, "max-size"),
                find_property(&node, "id"),
            ) else {
                continue;
            };

            let entry = DynCfgEntry {
                load_address: read_address(&addr).ok_or(ConfigError::Malformed)?,
                max_size: size.u32(0).map_err(|_| ConfigError::Malformed)?,
                id: id.u32(0).map_err(|_| ConfigError::Malformed)?,
            };
            f(entry)?;
            count += 1;
        }

        Ok(count)
    }
}

/// Find a property by name in a node
fn find_property<'a, 'b, 'dt>(
    node: &'a DevTreeNode<'b, 'dt>,
    name: &str,
) -> Option<DevTreeProp<'a, 'dt>> {
    let mut props = node.props();
    while let Ok(Some(prop)) = props.next() {
        if prop.name() == Ok(name) {
            return Some(prop);
        }
    }
    None
}

/// Value of a one- or two-cell `load-address` property.
fn read_address(prop: &DevTreeProp) -> Option<u64> {
    match prop.length() {
        8 => prop.u64(0).ok(),
        _ => prop.u32(0).ok().map(u64::from),
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    info: DtbInfo,
    loaded: bool,
}

/// Registry of configuration blobs already resident in memory.
#[derive(Debug)]
pub struct DtbRegistry {
    slots: [Option<Slot>; MAX_DTB_INFO],
}

impl DtbRegistry {
    /// Empty registry.
    ///
    /// # Safety
    ///
    /// Every address later registered, directly or through
    /// [`populate_registry`](ConfigLoader::populate_registry), must satisfy
    /// [`FwConfigDtb::from_addr`]'s contract.
    pub const unsafe fn new() -> Self {
        Self {
            slots: [None; MAX_DTB_INFO],
        }
    }

    fn slot(&self, id: ConfigId) -> Option<&Slot> {
        self.slots.iter().flatten().find(|slot| slot.info.config_id == id)
    }

    /// Add `info`, replacing any entry with the same id.
    fn insert(&mut self, info: DtbInfo) -> Result<(), ConfigError> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.is_some_and(|s| s.info.config_id == info.config_id))
            .or_else(|| self.slots.iter().position(Option::is_none));

        match index {
            Some(i) => {
                self.slots[i] = Some(Slot { info, loaded: false });
                Ok(())
            }
            None => {
                log::error!("FCONF: registry full, dropping config {}", info.config_id.raw());
                Err(ConfigError::Malformed)
            }
        }
    }

    /// Has configuration `id` been loaded and validated?
    pub fn is_loaded(&self, id: ConfigId) -> bool {
        self.slot(id).is_some_and(|slot| slot.loaded)
    }

    /// Number of registered configurations
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

impl ConfigLoader for DtbRegistry {
    fn set_config_info(&mut self, addr: usize, max_size: u32, id: ConfigId) {
        let _ = self.insert(DtbInfo {
            config_addr: addr,
            config_max_size: max_size,
            config_id: id,
        });
    }

    fn load(&mut self, id: ConfigId) -> Result<(), ConfigError> {
        let info = self.slot(id).ok_or(ConfigError::Missing(id))?.info;

        // SAFETY: registered addresses satisfy from_addr's contract (new())
        let dtb = unsafe { FwConfigDtb::from_addr(info.config_addr) }?;
        if dtb.size() > info.config_max_size as usize {
            log::error!(
                "FCONF: config {} is {} bytes, limit {}",
                id.raw(),
                dtb.size(),
                info.config_max_size
            );
            return Err(ConfigError::Malformed);
        }

        for slot in self.slots.iter_mut().flatten() {
            if slot.info.config_id == id {
                slot.loaded = true;
            }
        }

        log::info!(
            "FCONF: Config file with image ID:{} loaded at address = {:#x}",
            id.raw(),
            info.config_addr
        );
        Ok(())
    }

    fn dtb_info(&self, id: ConfigId) -> Option<DtbInfo> {
        self.slot(id).map(|slot| slot.info)
    }

    fn populate_registry(&mut self, addr: usize) -> Result<(), ConfigError> {
        // SAFETY: registered addresses satisfy from_addr's contract (new())
        let dtb = unsafe { FwConfigDtb::from_addr(addr) }?;

        dtb.dyn_cfg_entries(|entry| {
            let Some(id) = ConfigId::from_raw(entry.id) else {
                log::warn!("FCONF: skipping unknown config id {}", entry.id);
                return Ok(());
            };
            let config_addr =
                usize::try_from(entry.load_address).map_err(|_| ConfigError::Malformed)?;
            self.insert(DtbInfo {
                config_addr,
                config_max_size: entry.max_size,
                config_id: id,
            })
        })?;

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FdtBuilder, addr_cells, bytes, cells};
    use super::*;
    use crate::fconf::load_boot_configs;
    use std::boxed::Box;

    fn config_blob() -> Box<[u32]> {
        FdtBuilder::new()
            .prop("compatible", b"arm,tb_fw\0")
            .finish()
    }

    fn fw_config(entries: &[(usize, u32, u32)]) -> Box<[u32]> {
        let mut b = FdtBuilder::new()
            .begin("dtb-registry")
            .prop("compatible", b"fconf,dyn_cfg-dtb_registry\0");
        for (i, &(addr, size, id)) in entries.iter().enumerate() {
            let name = ["tb_fw-config", "soc_fw-config", "nt_fw-config"][i];
            b = b
                .begin(name)
                .prop("load-address", &addr_cells(addr))
                .prop("max-size", &cells(&[size]))
                .prop("id", &cells(&[id]))
                .end();
        }
        b.end()
            .begin("mhu@2a900000")
            .prop("compatible", b"arm,mhuv3\0")
            .prop("reg", &cells(&[0x0, 0x2a90_0000, 0x0, 0x1_0000]))
            .end()
            .finish()
    }

    #[test]
    fn test_from_bytes_accepts_valid_tree() {
        let blob = config_blob();
        let dtb = FwConfigDtb::from_bytes(bytes(&blob)).unwrap();
        assert_eq!(dtb.size(), bytes(&blob).len());
    }

    #[test]
    fn test_from_bytes_rejects_bad_magic() {
        let mut blob = config_blob();
        blob[0] = 0;
        assert_eq!(
            FwConfigDtb::from_bytes(bytes(&blob)).unwrap_err(),
            ConfigError::BadMagic
        );
    }

    #[test]
    fn test_from_bytes_rejects_truncated_blob() {
        let blob = config_blob();
        let short = &bytes(&blob)[..bytes(&blob).len() - 4];
        assert_eq!(FwConfigDtb::from_bytes(short).unwrap_err(), ConfigError::Malformed);
        assert_eq!(FwConfigDtb::from_bytes(&short[..8]).unwrap_err(), ConfigError::Malformed);
    }

    #[test]
    fn test_from_addr_null() {
        assert_eq!(
            unsafe { FwConfigDtb::from_addr(0) }.unwrap_err(),
            ConfigError::NullPointer
        );
    }

    #[test]
    fn test_dyn_cfg_entries() {
        let blob = fw_config(&[(0x4001300, 0x200, 24), (0x4002000, 0x1000, 25)]);
        let dtb = FwConfigDtb::from_bytes(bytes(&blob)).unwrap();

        let mut seen = std::vec::Vec::new();
        let count = dtb
            .dyn_cfg_entries(|entry| {
                seen.push(entry);
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            seen[0],
            DynCfgEntry {
                load_address: 0x4001300,
                max_size: 0x200,
                id: 24,
            }
        );
        assert_eq!(seen[1].id, 25);
    }

    #[test]
    fn test_registry_load_requires_entry() {
        let mut registry = unsafe { DtbRegistry::new() };
        assert_eq!(
            registry.load(ConfigId::TbFwConfig).unwrap_err(),
            ConfigError::Missing(ConfigId::TbFwConfig)
        );
    }

    #[test]
    fn test_registry_load_enforces_max_size() {
        let blob = config_blob();
        let mut registry = unsafe { DtbRegistry::new() };
        registry.set_config_info(blob.as_ptr() as usize, 16, ConfigId::HwConfig);

        assert_eq!(registry.load(ConfigId::HwConfig).unwrap_err(), ConfigError::Malformed);
        assert!(!registry.is_loaded(ConfigId::HwConfig));
    }

    #[test]
    fn test_set_config_info_replaces_entry() {
        let mut registry = unsafe { DtbRegistry::new() };
        registry.set_config_info(0x1000, 0x100, ConfigId::FwConfig);
        registry.set_config_info(0x2000, 0x200, ConfigId::FwConfig);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.dtb_info(ConfigId::FwConfig).unwrap().config_addr, 0x2000);
    }

    #[test]
    fn test_boot_configs_from_resident_blobs() {
        let tb_fw = config_blob();
        let fw = fw_config(&[(tb_fw.as_ptr() as usize, 0x1000, 24), (0x9000, 0x100, 99)]);
        let base = fw.as_ptr() as usize;
        let mut registry = unsafe { DtbRegistry::new() };

        load_boot_configs(&mut registry, base, base + 0x1000).unwrap();

        assert!(registry.is_loaded(ConfigId::FwConfig));
        assert!(registry.is_loaded(ConfigId::TbFwConfig));
        // Unknown id 99 is skipped
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_boot_configs_bad_fw_config() {
        let mut fw = config_blob();
        fw[0] = 0;
        let base = fw.as_ptr() as usize;
        let mut registry = unsafe { DtbRegistry::new() };

        assert_eq!(
            load_boot_configs(&mut registry, base, base + 0x1000).unwrap_err(),
            ConfigError::BadMagic
        );
    }
}
