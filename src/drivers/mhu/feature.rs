//! MHUv3 feature discovery.
//!
//! Each frame advertises its optional extensions in two support registers
//! (FEAT_SPT0/FEAT_SPT1). A capability is a bit range in one of them; the
//! value read back is compared against a per-frame "not implemented"
//! sentinel to decide whether the extension is usable on that frame.
//!
//! ## FEAT_SPT0
//!
//! | Bits    | Field    | Extension            |
//! |---------|----------|----------------------|
//! | [3:0]   | DBE_SPT  | Doorbell             |
//! | [7:4]   | FE_SPT   | FIFO                 |
//! | [11:8]  | FCE_SPT  | Fast channel         |
//! | [15:12] | TZE_SPT  | TrustZone            |
//! | [19:16] | RME_SPT  | Realm Management     |
//! | [23:20] | RASE_SPT | RAS                  |
//!
//! ## FEAT_SPT1
//!
//! | Bits    | Field       | Extension          |
//! |---------|-------------|--------------------|
//! | [3:0]   | AUTO_OP_SPT | Auto operation     |

use super::regs::field;
use super::{Frame, PerFrame};

/// Number of entries in the default capability table.
pub const CAPABILITY_COUNT: usize = 7;

/// Optional MHUv3 extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityId {
    Doorbell,
    Fifo,
    FastChannel,
    TrustZone,
    RealmManagement,
    Ras,
    AutoOp,
}

/// Which support register a capability lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureRegister {
    Spt0,
    Spt1,
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub id: CapabilityId,
    pub name: &'static str,
    pub register: FeatureRegister,
    pub msb: u32,
    pub lsb: u32,
    /// Field value meaning "not implemented", per frame
    pub invalid: PerFrame<u32>,
    /// Set by discovery when the field differs from `invalid`
    pub valid: PerFrame<bool>,
    /// Field value recorded by discovery
    pub support: PerFrame<u32>,
}

impl Feature {
    /// Capability with no discovered state.
    pub const fn new(
        id: CapabilityId,
        name: &'static str,
        register: FeatureRegister,
        msb: u32,
        lsb: u32,
        invalid: PerFrame<u32>,
    ) -> Self {
        Self {
            id,
            name,
            register,
            msb,
            lsb,
            invalid,
            valid: PerFrame::splat(false),
            support: PerFrame::splat(0),
        }
    }

    /// Is the capability usable on `frame`?
    pub fn is_valid(&self, frame: Frame) -> bool {
        self.valid[frame]
    }
}

/// The MHUv3 extensions, in FEAT_SPT bit order, with 0 as "not implemented".
pub const fn default_features() -> [Feature; CAPABILITY_COUNT] {
    use CapabilityId::*;
    use FeatureRegister::*;
    const NONE: PerFrame<u32> = PerFrame::splat(0);
    [
        Feature::new(Doorbell, "DBE_SPT", Spt0, 3, 0, NONE),
        Feature::new(Fifo, "FE_SPT", Spt0, 7, 4, NONE),
        Feature::new(FastChannel, "FCE_SPT", Spt0, 11, 8, NONE),
        Feature::new(TrustZone, "TZE_SPT", Spt0, 15, 12, NONE),
        Feature::new(RealmManagement, "RME_SPT", Spt0, 19, 16, NONE),
        Feature::new(Ras, "RASE_SPT", Spt0, 23, 20, NONE),
        Feature::new(AutoOp, "AUTO_OP_SPT", Spt1, 3, 0, NONE),
    ]
}

/// Classify every capability against one frame's support registers.
///
/// Entries whose field differs from the frame's sentinel are marked valid
/// and their value recorded. Other entries are left untouched, so running
/// discovery again over the same registers changes nothing.
pub fn discover(features: &mut [Feature], frame: Frame, spt0: u32, spt1: u32) {
    log::info!("MHUv3-{}: Supported Features", frame.name());

    for feature in features.iter_mut() {
        let reg = match feature.register {
            FeatureRegister::Spt0 => spt0,
            FeatureRegister::Spt1 => spt1,
        };
        let value = field(reg, feature.msb, feature.lsb);

        if value != feature.invalid[frame] {
            feature.support[frame] = value;
            feature.valid[frame] = true;
            log::info!("\t{}:{}", feature.name, value);
        }
    }
}
