//! MME S1 Context Management
//!
//! The context store holds eNB and UE contexts together with the indices
//! that cross-reference them:
//!
//! - association -> eNB ID
//! - eNB ID -> set of MME-UE-S1AP-IDs
//! - IMSI -> UE EMM context
//! - MME-UE-S1AP-ID -> UE ECM context
//! - MME-UE-S1AP-ID -> pending UE EMM context (attach window)
//! - M-TMSI -> IMSI
//!
//! Every public operation leaves the indices consistent with the primaries.

use std::collections::{BTreeSet, HashMap};

use ogs_s1ap::{PagingDrx, PlmnIdentity};

use crate::erab::{ErabState, ErabTable, Fteid};
use crate::error::{MmeError, MmeResult};
use crate::ids::{IdAllocator, DEFAULT_M_TMSI_SEED};

/// Transport association handle
pub type AssociationId = u64;
/// Global eNB ID (20 or 28 bits)
pub type EnbId = u32;
/// MME-assigned UE S1AP ID
pub type MmeUeS1apId = u32;
/// eNB-assigned UE S1AP ID
pub type EnbUeS1apId = u32;
/// IMSI as a decimal number
pub type Imsi = u64;
/// M-TMSI
pub type MTmsi = u32;

// ============================================================================
// Identity Types
// ============================================================================

/// PLMN ID
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlmnId {
    /// MCC digit 1
    pub mcc1: u8,
    /// MCC digit 2
    pub mcc2: u8,
    /// MCC digit 3
    pub mcc3: u8,
    /// MNC digit 1
    pub mnc1: u8,
    /// MNC digit 2
    pub mnc2: u8,
    /// MNC digit 3 (0xf if 2-digit MNC)
    pub mnc3: u8,
}

impl PlmnId {
    /// Create a new PLMN ID from decimal strings
    pub fn new(mcc: &str, mnc: &str) -> Self {
        let mcc: Vec<u8> = mcc.chars().filter_map(|c| c.to_digit(10).map(|d| d as u8)).collect();
        let mnc: Vec<u8> = mnc.chars().filter_map(|c| c.to_digit(10).map(|d| d as u8)).collect();

        Self {
            mcc1: mcc.first().copied().unwrap_or(0),
            mcc2: mcc.get(1).copied().unwrap_or(0),
            mcc3: mcc.get(2).copied().unwrap_or(0),
            mnc1: mnc.first().copied().unwrap_or(0),
            mnc2: mnc.get(1).copied().unwrap_or(0),
            mnc3: mnc.get(2).copied().unwrap_or(0xf),
        }
    }

    /// Decode from TBCD octets
    pub fn from_tbcd(plmn: &PlmnIdentity) -> Self {
        Self {
            mcc1: plmn[0] & 0x0f,
            mcc2: plmn[0] >> 4,
            mcc3: plmn[1] & 0x0f,
            mnc3: plmn[1] >> 4,
            mnc1: plmn[2] & 0x0f,
            mnc2: plmn[2] >> 4,
        }
    }

    /// Encode to TBCD octets
    pub fn to_tbcd(&self) -> PlmnIdentity {
        [
            (self.mcc2 << 4) | (self.mcc1 & 0x0f),
            (self.mnc3 << 4) | (self.mcc3 & 0x0f),
            (self.mnc2 << 4) | (self.mnc1 & 0x0f),
        ]
    }

    /// Convert to BCD string
    pub fn to_bcd(&self) -> String {
        if self.mnc3 == 0xf {
            format!("{}{}{}{}{}", self.mcc1, self.mcc2, self.mcc3, self.mnc1, self.mnc2)
        } else {
            format!("{}{}{}{}{}{}", self.mcc1, self.mcc2, self.mcc3, self.mnc1, self.mnc2, self.mnc3)
        }
    }
}

/// Supported tracking area of an eNB
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedTa {
    /// TAC
    pub tac: u16,
    /// Broadcast PLMNs
    pub bplmns: Vec<PlmnId>,
}

// ============================================================================
// eNB Context
// ============================================================================

/// eNB context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnbCtx {
    /// eNB ID (received from eNB)
    pub enb_id: EnbId,
    /// eNB name
    pub enb_name: Option<String>,
    /// PLMN ID (received from eNB)
    pub plmn_id: PlmnId,
    /// Supported TA list
    pub supported_tas: Vec<SupportedTa>,
    /// Default paging DRX
    pub default_paging_drx: PagingDrx,
    /// Owning association
    pub association_id: AssociationId,
}

/// Result of tearing down an eNB
#[derive(Debug, Clone)]
pub struct EnbRemoval {
    /// The removed eNB
    pub enb: EnbCtx,
    /// MME-UE-S1AP-IDs of the UE contexts released with it
    pub released_ues: Vec<MmeUeS1apId>,
}

// ============================================================================
// UE Contexts
// ============================================================================

/// EMM state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmmState {
    #[default]
    Deregistered,
    AttachPending,
    Registered,
}

/// NAS security context material
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityCtx {
    /// KASME
    pub kasme: [u8; 32],
    /// NAS integrity key
    pub knas_int: [u8; 16],
    /// NAS encryption key
    pub knas_enc: [u8; 16],
    /// Uplink NAS count
    pub ul_count: u32,
    /// Downlink NAS count
    pub dl_count: u32,
    /// eKSI
    pub eksi: u8,
}

/// UE EMM context, keyed by IMSI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UeEmmCtx {
    /// IMSI
    pub imsi: Imsi,
    /// Allocated M-TMSI
    pub m_tmsi: Option<MTmsi>,
    /// Security context
    pub security: SecurityCtx,
    /// EMM state
    pub state: EmmState,
}

impl UeEmmCtx {
    pub fn new(imsi: Imsi) -> Self {
        Self { imsi, ..Default::default() }
    }
}

/// UE ECM context, keyed by MME-UE-S1AP-ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeEcmCtx {
    /// MME UE S1AP ID
    pub mme_ue_s1ap_id: MmeUeS1apId,
    /// eNB UE S1AP ID
    pub enb_ue_s1ap_id: EnbUeS1apId,
    /// Owning association
    pub association_id: AssociationId,
    /// IMSI once the UE is identified
    pub imsi: Option<Imsi>,
    /// E-RAB table
    pub erabs: ErabTable,
}

impl UeEcmCtx {
    pub fn new(
        mme_ue_s1ap_id: MmeUeS1apId,
        enb_ue_s1ap_id: EnbUeS1apId,
        association_id: AssociationId,
    ) -> Self {
        Self {
            mme_ue_s1ap_id,
            enb_ue_s1ap_id,
            association_id,
            imsi: None,
            erabs: ErabTable::new(),
        }
    }
}

// ============================================================================
// Context Store
// ============================================================================

/// S1 context store
#[derive(Debug)]
pub struct S1apContext {
    enbs: HashMap<EnbId, EnbCtx>,
    assoc_to_enb: HashMap<AssociationId, EnbId>,
    enb_ues: HashMap<EnbId, BTreeSet<MmeUeS1apId>>,
    imsi_to_emm: HashMap<Imsi, UeEmmCtx>,
    ecm: HashMap<MmeUeS1apId, UeEcmCtx>,
    pending_emm: HashMap<MmeUeS1apId, UeEmmCtx>,
    m_tmsi_to_imsi: HashMap<MTmsi, Imsi>,
    mme_ue_s1ap_ids: IdAllocator,
    m_tmsis: IdAllocator,
}

impl Default for S1apContext {
    fn default() -> Self {
        Self::new()
    }
}

impl S1apContext {
    /// Create an empty store with the fresh-boot M-TMSI seed
    pub fn new() -> Self {
        Self::with_m_tmsi_seed(DEFAULT_M_TMSI_SEED)
    }

    /// Create an empty store with a given M-TMSI seed
    pub fn with_m_tmsi_seed(seed: MTmsi) -> Self {
        Self {
            enbs: HashMap::new(),
            assoc_to_enb: HashMap::new(),
            enb_ues: HashMap::new(),
            imsi_to_emm: HashMap::new(),
            ecm: HashMap::new(),
            pending_emm: HashMap::new(),
            m_tmsi_to_imsi: HashMap::new(),
            mme_ue_s1ap_ids: IdAllocator::mme_ue_s1ap_id(),
            m_tmsis: IdAllocator::m_tmsi(seed),
        }
    }

    // ------------------------------------------------------------------------
    // eNB
    // ------------------------------------------------------------------------

    /// Register an eNB on an association
    pub fn add_enb(&mut self, mut enb: EnbCtx, association_id: AssociationId) -> MmeResult<()> {
        if let Some(existing) = self.enbs.get(&enb.enb_id) {
            return Err(MmeError::DuplicateEnb {
                enb_id: enb.enb_id,
                association_id: existing.association_id,
            });
        }
        if let Some(&enb_id) = self.assoc_to_enb.get(&association_id) {
            return Err(MmeError::AssociationInUse { association_id, enb_id });
        }

        enb.association_id = association_id;
        log::info!(
            "[Added] eNB-ID[{:#x}] PLMN[{}] on association {}",
            enb.enb_id,
            enb.plmn_id.to_bcd(),
            association_id
        );
        self.assoc_to_enb.insert(association_id, enb.enb_id);
        self.enb_ues.insert(enb.enb_id, BTreeSet::new());
        self.enbs.insert(enb.enb_id, enb);
        Ok(())
    }

    /// Find eNB by eNB ID
    pub fn find_enb(&self, enb_id: EnbId) -> Option<&EnbCtx> {
        self.enbs.get(&enb_id)
    }

    /// Find eNB by owning association
    pub fn find_enb_by_association(&self, association_id: AssociationId) -> Option<&EnbCtx> {
        self.assoc_to_enb
            .get(&association_id)
            .and_then(|enb_id| self.enbs.get(enb_id))
    }

    /// Remove the eNB of an association and every UE ECM context it owns
    ///
    /// UE EMM contexts survive; only connection state is dropped.
    pub fn remove_enb(&mut self, association_id: AssociationId) -> MmeResult<EnbRemoval> {
        let enb_id = self
            .assoc_to_enb
            .get(&association_id)
            .copied()
            .ok_or(MmeError::UnknownAssociation(association_id))?;

        let released_ues: Vec<MmeUeS1apId> = self
            .enb_ues
            .get(&enb_id)
            .map(|ues| ues.iter().copied().collect())
            .unwrap_or_default();

        for mme_ue_s1ap_id in &released_ues {
            if let Some(ue) = self.ecm.remove(mme_ue_s1ap_id) {
                log::debug!(
                    "[Removed] UE ECM MME-UE-S1AP-ID[{}] eNB-UE-S1AP-ID[{}] with eNB-ID[{:#x}]",
                    ue.mme_ue_s1ap_id,
                    ue.enb_ue_s1ap_id,
                    enb_id
                );
            }
            self.pending_emm.remove(mme_ue_s1ap_id);
        }

        self.enb_ues.remove(&enb_id);
        self.assoc_to_enb.remove(&association_id);
        let enb = self
            .enbs
            .remove(&enb_id)
            .ok_or(MmeError::UnknownAssociation(association_id))?;

        log::info!(
            "[Removed] eNB-ID[{:#x}] association {} ({} UE released)",
            enb_id,
            association_id,
            released_ues.len()
        );
        Ok(EnbRemoval { enb, released_ues })
    }

    // ------------------------------------------------------------------------
    // UE EMM
    // ------------------------------------------------------------------------

    /// Insert or replace the EMM context of an IMSI
    pub fn add_ue_emm(&mut self, ue: UeEmmCtx) -> Option<UeEmmCtx> {
        log::debug!("[Added] UE EMM IMSI[{}] state {:?}", ue.imsi, ue.state);
        self.imsi_to_emm.insert(ue.imsi, ue)
    }

    pub fn find_ue_emm(&self, imsi: Imsi) -> Option<&UeEmmCtx> {
        self.imsi_to_emm.get(&imsi)
    }

    pub fn find_ue_emm_mut(&mut self, imsi: Imsi) -> Option<&mut UeEmmCtx> {
        self.imsi_to_emm.get_mut(&imsi)
    }

    /// Remove the EMM context of an IMSI and its M-TMSI index entries
    pub fn remove_ue_emm(&mut self, imsi: Imsi) -> bool {
        if self.imsi_to_emm.remove(&imsi).is_none() {
            return false;
        }
        self.m_tmsi_to_imsi.retain(|_, owner| *owner != imsi);
        log::debug!("[Removed] UE EMM IMSI[{}]", imsi);
        true
    }

    /// Park an EMM context until the attach completes
    pub fn store_pending_ue_emm(
        &mut self,
        mme_ue_s1ap_id: MmeUeS1apId,
        ue: UeEmmCtx,
    ) -> Option<UeEmmCtx> {
        self.pending_emm.insert(mme_ue_s1ap_id, ue)
    }

    /// Take a parked EMM context; a second take finds nothing
    pub fn take_pending_ue_emm(&mut self, mme_ue_s1ap_id: MmeUeS1apId) -> Option<UeEmmCtx> {
        self.pending_emm.remove(&mme_ue_s1ap_id)
    }

    // ------------------------------------------------------------------------
    // UE ECM
    // ------------------------------------------------------------------------

    /// Insert a UE ECM context under the eNB of its association
    pub fn add_ue_ecm(&mut self, ue: UeEcmCtx) -> MmeResult<()> {
        let enb_id = self
            .assoc_to_enb
            .get(&ue.association_id)
            .copied()
            .ok_or(MmeError::UnknownEnb(ue.association_id))?;
        if self.ecm.contains_key(&ue.mme_ue_s1ap_id) {
            return Err(MmeError::DuplicateUe(ue.mme_ue_s1ap_id));
        }

        log::debug!(
            "[Added] UE ECM MME-UE-S1AP-ID[{}] eNB-UE-S1AP-ID[{}] eNB-ID[{:#x}]",
            ue.mme_ue_s1ap_id,
            ue.enb_ue_s1ap_id,
            enb_id
        );
        self.enb_ues.entry(enb_id).or_default().insert(ue.mme_ue_s1ap_id);
        self.ecm.insert(ue.mme_ue_s1ap_id, ue);
        Ok(())
    }

    pub fn find_ue_ecm(&self, mme_ue_s1ap_id: MmeUeS1apId) -> Option<&UeEcmCtx> {
        self.ecm.get(&mme_ue_s1ap_id)
    }

    pub fn find_ue_ecm_mut(&mut self, mme_ue_s1ap_id: MmeUeS1apId) -> Option<&mut UeEcmCtx> {
        self.ecm.get_mut(&mme_ue_s1ap_id)
    }

    /// Remove a UE ECM context and its eNB UE-set entry
    pub fn remove_ue_ecm(&mut self, mme_ue_s1ap_id: MmeUeS1apId) -> bool {
        let Some(ue) = self.ecm.remove(&mme_ue_s1ap_id) else {
            return false;
        };
        self.pending_emm.remove(&mme_ue_s1ap_id);

        match self.assoc_to_enb.get(&ue.association_id) {
            Some(enb_id) => {
                if let Some(ues) = self.enb_ues.get_mut(enb_id) {
                    ues.remove(&mme_ue_s1ap_id);
                }
            }
            None => log::warn!(
                "UE ECM MME-UE-S1AP-ID[{}] outlived its eNB (association {})",
                mme_ue_s1ap_id,
                ue.association_id
            ),
        }

        log::debug!("[Removed] UE ECM MME-UE-S1AP-ID[{}]", mme_ue_s1ap_id);
        true
    }

    /// MME-UE-S1AP-IDs of the UEs served by an eNB, ascending
    pub fn ue_ecm_ids_in_enb(&self, enb_id: EnbId) -> Vec<MmeUeS1apId> {
        self.enb_ues
            .get(&enb_id)
            .map(|ues| ues.iter().copied().collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Identifiers
    // ------------------------------------------------------------------------

    /// Draw an MME-UE-S1AP-ID not referenced by any live context
    pub fn allocate_mme_ue_s1ap_id(&mut self) -> MmeResult<MmeUeS1apId> {
        let ecm = &self.ecm;
        let pending = &self.pending_emm;
        self.mme_ue_s1ap_ids.next_unused(ecm.len() + pending.len(), |id| {
            ecm.contains_key(&id) || pending.contains_key(&id)
        })
    }

    /// Draw an M-TMSI not present in the M-TMSI index
    pub fn allocate_m_tmsi(&mut self) -> MmeResult<MTmsi> {
        let index = &self.m_tmsi_to_imsi;
        self.m_tmsis.next_unused(index.len(), |id| index.contains_key(&id))
    }

    /// Allocate an M-TMSI for an IMSI and index it
    pub fn allocate_temporary_id(&mut self, imsi: Imsi) -> MmeResult<MTmsi> {
        let m_tmsi = self.allocate_m_tmsi()?;
        self.m_tmsi_to_imsi.insert(m_tmsi, imsi);
        if let Some(ue) = self.imsi_to_emm.get_mut(&imsi) {
            ue.m_tmsi = Some(m_tmsi);
        }
        log::debug!("Allocated M-TMSI[{:#010x}] for IMSI[{}]", m_tmsi, imsi);
        Ok(m_tmsi)
    }

    pub fn find_imsi_by_m_tmsi(&self, m_tmsi: MTmsi) -> Option<Imsi> {
        self.m_tmsi_to_imsi.get(&m_tmsi).copied()
    }

    // ------------------------------------------------------------------------
    // Bearers
    // ------------------------------------------------------------------------

    /// Mark an E-RAB as requested in an Initial Context Setup
    pub fn request_erab_setup(&mut self, mme_ue_s1ap_id: MmeUeS1apId, erab_id: u8) -> MmeResult<()> {
        self.ecm
            .get_mut(&mme_ue_s1ap_id)
            .ok_or(MmeError::UnknownUe(mme_ue_s1ap_id))?
            .erabs
            .request_setup(erab_id)
    }

    /// Activate an E-RAB that is waiting for setup
    pub fn activate_eps_bearer(&mut self, mme_ue_s1ap_id: MmeUeS1apId, erab_id: u8) -> MmeResult<()> {
        self.activate_erab(mme_ue_s1ap_id, erab_id, None)
    }

    /// Activate an E-RAB and record the eNB F-TEID
    pub fn activate_erab(
        &mut self,
        mme_ue_s1ap_id: MmeUeS1apId,
        erab_id: u8,
        enb_fteid: Option<Fteid>,
    ) -> MmeResult<()> {
        let ue = self
            .ecm
            .get_mut(&mme_ue_s1ap_id)
            .ok_or(MmeError::UnknownUe(mme_ue_s1ap_id))?;
        match ue.erabs.activate(erab_id, enb_fteid) {
            Ok(()) => {
                log::debug!("Activated E-RAB {} of MME-UE-S1AP-ID[{}]", erab_id, mme_ue_s1ap_id);
                Ok(())
            }
            Err(e) => {
                log::error!("MME-UE-S1AP-ID[{}]: {}", mme_ue_s1ap_id, e);
                Err(e)
            }
        }
    }

    pub fn erab_state(&self, mme_ue_s1ap_id: MmeUeS1apId, erab_id: u8) -> MmeResult<ErabState> {
        self.ecm
            .get(&mme_ue_s1ap_id)
            .ok_or(MmeError::UnknownUe(mme_ue_s1ap_id))?
            .erabs
            .state(erab_id)
    }

    // ------------------------------------------------------------------------
    // Introspection and teardown
    // ------------------------------------------------------------------------

    pub fn enb_count(&self) -> usize {
        self.enbs.len()
    }

    pub fn ue_ecm_count(&self) -> usize {
        self.ecm.len()
    }

    pub fn ue_emm_count(&self) -> usize {
        self.imsi_to_emm.len()
    }

    pub fn pending_ue_emm_count(&self) -> usize {
        self.pending_emm.len()
    }

    /// Release every live context
    pub fn clear(&mut self) {
        for enb in self.enbs.values() {
            log::info!(
                "[Removed] eNB-ID[{:#x}] association {}",
                enb.enb_id,
                enb.association_id
            );
        }
        for ue in self.ecm.values() {
            log::info!("[Removed] UE ECM MME-UE-S1AP-ID[{}]", ue.mme_ue_s1ap_id);
        }
        for ue in self.imsi_to_emm.values() {
            log::info!("[Removed] UE EMM IMSI[{}]", ue.imsi);
        }

        self.enbs.clear();
        self.assoc_to_enb.clear();
        self.enb_ues.clear();
        self.imsi_to_emm.clear();
        self.ecm.clear();
        self.pending_emm.clear();
        self.m_tmsi_to_imsi.clear();
    }

    /// Check that every index agrees with the primary maps
    pub fn verify_indices(&self) -> Result<(), String> {
        for (association_id, enb_id) in &self.assoc_to_enb {
            match self.enbs.get(enb_id) {
                Some(enb) if enb.association_id == *association_id => {}
                _ => return Err(format!("association {association_id} -> eNB {enb_id:#x} dangling")),
            }
        }
        for (enb_id, enb) in &self.enbs {
            if self.assoc_to_enb.get(&enb.association_id) != Some(enb_id) {
                return Err(format!("eNB {enb_id:#x} missing from association index"));
            }
            if !self.enb_ues.contains_key(enb_id) {
                return Err(format!("eNB {enb_id:#x} has no UE set"));
            }
        }
        for (enb_id, ues) in &self.enb_ues {
            if !self.enbs.contains_key(enb_id) {
                return Err(format!("UE set of unknown eNB {enb_id:#x}"));
            }
            for id in ues {
                if !self.ecm.contains_key(id) {
                    return Err(format!("eNB {enb_id:#x} lists unknown UE {id}"));
                }
            }
        }
        for (id, ue) in &self.ecm {
            let listed = self
                .assoc_to_enb
                .get(&ue.association_id)
                .and_then(|enb_id| self.enb_ues.get(enb_id))
                .is_some_and(|ues| ues.contains(id));
            if !listed {
                return Err(format!("UE {id} not listed under association {}", ue.association_id));
            }
        }
        Ok(())
    }
}
