//! E-RAB State Tracking
//!
//! Each UE connection context owns a fixed table of E-RAB records indexed
//! by E-RAB ID. Valid IDs are 1..=15; slot 0 is never used.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{MmeError, MmeResult};

/// Number of slots in the table (slot 0 unused)
pub const MAX_ERABS: usize = 16;
/// Smallest valid E-RAB ID
pub const MIN_ERAB_ID: u8 = 1;
/// Largest valid E-RAB ID
pub const MAX_ERAB_ID: u8 = 15;

/// E-RAB state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErabState {
    #[default]
    Inactive,
    SetupRequested,
    Active,
}

impl ErabState {
    pub fn name(&self) -> &'static str {
        match self {
            ErabState::Inactive => "Inactive",
            ErabState::SetupRequested => "SetupRequested",
            ErabState::Active => "Active",
        }
    }
}

impl fmt::Display for ErabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully qualified TEID of the eNB side of an S1-U tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fteid {
    /// GTP-U TEID
    pub teid: u32,
    /// Transport layer address
    pub addr: IpAddr,
}

impl Fteid {
    /// Build from an S1AP TransportLayerAddress (4 or 16 octets)
    pub fn from_transport_address(addr: &[u8], teid: u32) -> Option<Self> {
        let addr = match addr.len() {
            4 => IpAddr::V4(Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3])),
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(addr);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            // IPv4v6 carries both; keep the IPv4 part
            20 => IpAddr::V4(Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3])),
            _ => return None,
        };
        Some(Self { teid, addr })
    }
}

/// E-RAB record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErabCtx {
    /// E-RAB ID (slot index)
    pub erab_id: u8,
    /// State
    pub state: ErabState,
    /// eNB S1-U F-TEID reported at activation
    pub enb_fteid: Option<Fteid>,
}

/// Fixed E-RAB table of one UE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErabTable {
    erabs: [ErabCtx; MAX_ERABS],
}

impl Default for ErabTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ErabTable {
    pub fn new() -> Self {
        Self {
            erabs: std::array::from_fn(|i| ErabCtx { erab_id: i as u8, ..Default::default() }),
        }
    }

    fn slot(erab_id: u8) -> MmeResult<usize> {
        if (MIN_ERAB_ID..=MAX_ERAB_ID).contains(&erab_id) {
            Ok(erab_id as usize)
        } else {
            Err(MmeError::InvalidBearerId(erab_id))
        }
    }

    /// Get an E-RAB record
    pub fn get(&self, erab_id: u8) -> MmeResult<&ErabCtx> {
        Ok(&self.erabs[Self::slot(erab_id)?])
    }

    /// Current state of an E-RAB
    pub fn state(&self, erab_id: u8) -> MmeResult<ErabState> {
        Ok(self.get(erab_id)?.state)
    }

    /// Inactive -> SetupRequested
    pub fn request_setup(&mut self, erab_id: u8) -> MmeResult<()> {
        let erab = &mut self.erabs[Self::slot(erab_id)?];
        if erab.state != ErabState::Inactive {
            return Err(MmeError::InvalidBearerState {
                erab_id,
                state: erab.state.name(),
                expected: ErabState::Inactive.name(),
            });
        }
        erab.state = ErabState::SetupRequested;
        Ok(())
    }

    /// SetupRequested -> Active; any other state is left untouched
    pub fn activate(&mut self, erab_id: u8, enb_fteid: Option<Fteid>) -> MmeResult<()> {
        let erab = &mut self.erabs[Self::slot(erab_id)?];
        if erab.state != ErabState::SetupRequested {
            return Err(MmeError::InvalidBearerState {
                erab_id,
                state: erab.state.name(),
                expected: ErabState::SetupRequested.name(),
            });
        }
        erab.state = ErabState::Active;
        erab.enb_fteid = enb_fteid;
        Ok(())
    }

    /// Records with a valid E-RAB ID
    pub fn iter(&self) -> impl Iterator<Item = &ErabCtx> {
        self.erabs[MIN_ERAB_ID as usize..].iter()
    }

    /// Number of E-RABs in the Active state
    pub fn active_count(&self) -> usize {
        self.iter().filter(|e| e.state == ErabState::Active).count()
    }
}
