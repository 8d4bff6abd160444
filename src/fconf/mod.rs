//! Firmware configuration
//!
//! The previous boot stage places configuration device trees in memory and
//! tells us where FW_CONFIG lives. FW_CONFIG carries a registry of every
//! other configuration blob (address, maximum size, image id); boot setup
//! loads FW_CONFIG, fills the registry from it and then loads TB_FW_CONFIG.
//!
//! [`ConfigLoader`] is the contract boot setup consumes, and
//! [`load_boot_configs`] is that sequence. [`DtbRegistry`] implements the
//! contract for blobs that are already resident.

pub mod dtb;

use core::fmt;

pub use dtb::{DtbRegistry, DynCfgEntry, FwConfigDtb};

/// Image identifiers of the configuration blobs.
///
/// Values match the `id` property of `dtb-registry` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConfigId {
    HwConfig = 23,
    TbFwConfig = 24,
    SocFwConfig = 25,
    TosFwConfig = 26,
    NtFwConfig = 27,
    FwConfig = 31,
}

impl ConfigId {
    pub const fn from_raw(id: u32) -> Option<Self> {
        match id {
            23 => Some(ConfigId::HwConfig),
            24 => Some(ConfigId::TbFwConfig),
            25 => Some(ConfigId::SocFwConfig),
            26 => Some(ConfigId::TosFwConfig),
            27 => Some(ConfigId::NtFwConfig),
            31 => Some(ConfigId::FwConfig),
            _ => None,
        }
    }

    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// Where one configuration blob lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtbInfo {
    pub config_addr: usize,
    pub config_max_size: u32,
    pub config_id: ConfigId,
}

/// Firmware configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Blob address is null
    NullPointer,
    /// Blob does not start with the FDT magic
    BadMagic,
    /// Header, structure or registry contents are unusable
    Malformed,
    /// No registry entry for this configuration
    Missing(ConfigId),
}

impl ConfigError {
    /// Negative errno value handed to the platform error handler.
    pub const fn errno(self) -> i32 {
        match self {
            ConfigError::NullPointer => -14,  // EFAULT
            ConfigError::BadMagic => -22,     // EINVAL
            ConfigError::Malformed => -22,    // EINVAL
            ConfigError::Missing(_) => -2,    // ENOENT
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NullPointer => f.write_str("config address is null"),
            ConfigError::BadMagic => f.write_str("invalid DTB magic number"),
            ConfigError::Malformed => f.write_str("malformed config DTB"),
            ConfigError::Missing(id) => write!(f, "no config registered for {:?}", id),
        }
    }
}

/// Configuration services boot setup depends on.
pub trait ConfigLoader {
    /// Register (or replace) where configuration `id` lives.
    fn set_config_info(&mut self, addr: usize, max_size: u32, id: ConfigId);

    /// Load configuration `id` and validate it.
    fn load(&mut self, id: ConfigId) -> Result<(), ConfigError>;

    /// Registry entry for `id`, if any.
    fn dtb_info(&self, id: ConfigId) -> Option<DtbInfo>;

    /// Register every configuration listed in the FW_CONFIG blob at `addr`.
    fn populate_registry(&mut self, addr: usize) -> Result<(), ConfigError>;
}

/// Load FW_CONFIG from `[base, limit)`, fill the registry from it and load
/// TB_FW_CONFIG.
///
/// Stops at the first failure and returns it; the caller decides whether
/// that is fatal.
pub fn load_boot_configs<L: ConfigLoader>(
    loader: &mut L,
    base: usize,
    limit: usize,
) -> Result<(), ConfigError> {
    let max_size = u32::try_from(limit.saturating_sub(base)).map_err(|_| ConfigError::Malformed)?;
    loader.set_config_info(base, max_size, ConfigId::FwConfig);

    loader.load(ConfigId::FwConfig).inspect_err(|err| {
        log::error!("Loading of FW_CONFIG failed {}", err.errno());
    })?;

    let Some(info) = loader.dtb_info(ConfigId::FwConfig) else {
        log::error!("Invalid FW_CONFIG address");
        return Err(ConfigError::Missing(ConfigId::FwConfig));
    };

    loader.populate_registry(info.config_addr).inspect_err(|err| {
        log::error!("Parsing of FW_CONFIG failed {}", err.errno());
    })?;

    loader.load(ConfigId::TbFwConfig).inspect_err(|err| {
        log::error!("Loading of TB_FW_CONFIG failed {}", err.errno());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// Loader that records calls and fails where told to.
    #[derive(Default)]
    struct FakeLoader {
        calls: Vec<&'static str>,
        infos: Vec<DtbInfo>,
        fail_load: Option<ConfigId>,
        fail_populate: bool,
        drop_info: bool,
    }

    impl ConfigLoader for FakeLoader {
        fn set_config_info(&mut self, addr: usize, max_size: u32, id: ConfigId) {
            self.calls.push("set_config_info");
            self.infos.push(DtbInfo {
                config_addr: addr,
                config_max_size: max_size,
                config_id: id,
            });
        }

        fn load(&mut self, id: ConfigId) -> Result<(), ConfigError> {
            self.calls.push(match id {
                ConfigId::FwConfig => "load fw_config",
                _ => "load tb_fw_config",
            });
            if self.fail_load == Some(id) {
                return Err(ConfigError::BadMagic);
            }
            Ok(())
        }

        fn dtb_info(&self, id: ConfigId) -> Option<DtbInfo> {
            if self.drop_info {
                return None;
            }
            self.infos.iter().copied().find(|info| info.config_id == id)
        }

        fn populate_registry(&mut self, _addr: usize) -> Result<(), ConfigError> {
            self.calls.push("populate_registry");
            if self.fail_populate {
                return Err(ConfigError::Malformed);
            }
            Ok(())
        }
    }

    #[test]
    fn test_boot_sequence_order() {
        let mut loader = FakeLoader::default();

        load_boot_configs(&mut loader, 0x4000_1000, 0x4000_2000).unwrap();

        assert_eq!(
            loader.calls,
            [
                "set_config_info",
                "load fw_config",
                "populate_registry",
                "load tb_fw_config"
            ]
        );
        assert_eq!(
            loader.infos[0],
            DtbInfo {
                config_addr: 0x4000_1000,
                config_max_size: 0x1000,
                config_id: ConfigId::FwConfig,
            }
        );
    }

    #[test]
    fn test_fw_config_load_failure_stops_sequence() {
        let mut loader = FakeLoader {
            fail_load: Some(ConfigId::FwConfig),
            ..Default::default()
        };

        let err = load_boot_configs(&mut loader, 0x1000, 0x2000).unwrap_err();

        assert_eq!(err, ConfigError::BadMagic);
        assert_eq!(loader.calls, ["set_config_info", "load fw_config"]);
    }

    #[test]
    fn test_missing_fw_config_info() {
        let mut loader = FakeLoader {
            drop_info: true,
            ..Default::default()
        };

        let err = load_boot_configs(&mut loader, 0x1000, 0x2000).unwrap_err();

        assert_eq!(err, ConfigError::Missing(ConfigId::FwConfig));
        assert!(!loader.calls.contains(&"populate_registry"));
    }

    #[test]
    fn test_registry_failure_skips_tb_fw_config() {
        let mut loader = FakeLoader {
            fail_populate: true,
            ..Default::default()
        };

        let err = load_boot_configs(&mut loader, 0x1000, 0x2000).unwrap_err();

        assert_eq!(err, ConfigError::Malformed);
        assert!(!loader.calls.contains(&"load tb_fw_config"));
    }

    #[test]
    fn test_tb_fw_config_failure_is_returned() {
        let mut loader = FakeLoader {
            fail_load: Some(ConfigId::TbFwConfig),
            ..Default::default()
        };

        assert_eq!(
            load_boot_configs(&mut loader, 0x1000, 0x2000).unwrap_err(),
            ConfigError::BadMagic
        );
    }

    #[test]
    fn test_config_id_raw_values() {
        assert_eq!(ConfigId::FwConfig.raw(), 31);
        assert_eq!(ConfigId::from_raw(24), Some(ConfigId::TbFwConfig));
        assert_eq!(ConfigId::from_raw(0), None);
        assert_eq!(ConfigError::Missing(ConfigId::HwConfig).errno(), -2);
    }
}
