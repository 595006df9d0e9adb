//! S1AP PDU Dispatch
//!
//! Decodes one inbound unit, routes it to the procedure collaborator for its
//! message kind and sends the reply the handler requested on the originating
//! association. The reply buffer is released after every unit.

use ogs_s1ap::{InitiatingMessage, S1apPdu, SuccessfulOutcome, UnsuccessfulOutcome};

use crate::config::MmeConfig;
use crate::context::{AssociationId, S1apContext};
use crate::error::{MmeError, MmeResult};
use crate::s1ap_handler::{
    ContextManagement, CtxMngmtProc, EnbManagement, MngmtProc, NasTransport, NasTransportProc,
    S1apReply,
};
use crate::s1ap_path::S1apTransport;

/// Outcome of one dispatched unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    /// Name of the inbound message
    pub message: &'static str,
    /// Bytes handed to the transport, if a reply was sent
    pub reply_sent: Option<usize>,
}

/// S1AP dispatcher
pub struct S1apDispatcher {
    mngmt: Box<dyn EnbManagement>,
    nas: Box<dyn NasTransport>,
    ctx_mngmt: Box<dyn ContextManagement>,
    reply: S1apReply,
}

impl S1apDispatcher {
    /// Dispatcher with the default procedure handlers
    pub fn new(config: &MmeConfig) -> Self {
        Self::with_handlers(
            Box::new(MngmtProc::new(config.clone())),
            Box::new(NasTransportProc::new()),
            Box::new(CtxMngmtProc::new()),
        )
    }

    /// Dispatcher with caller-supplied procedure handlers
    pub fn with_handlers(
        mngmt: Box<dyn EnbManagement>,
        nas: Box<dyn NasTransport>,
        ctx_mngmt: Box<dyn ContextManagement>,
    ) -> Self {
        Self { mngmt, nas, ctx_mngmt, reply: S1apReply::new() }
    }

    /// Handle one received S1AP PDU
    pub fn handle_rx_pdu(
        &mut self,
        ctx: &mut S1apContext,
        association_id: AssociationId,
        data: &[u8],
        transport: &mut dyn S1apTransport,
    ) -> MmeResult<Dispatched> {
        let result = self.dispatch(ctx, association_id, data, transport);
        self.reply.release();
        result
    }

    fn dispatch(
        &mut self,
        ctx: &mut S1apContext,
        association_id: AssociationId,
        data: &[u8],
        transport: &mut dyn S1apTransport,
    ) -> MmeResult<Dispatched> {
        let pdu = S1apPdu::decode(data)?;
        let message = pdu.name();
        log::debug!(
            "Received {} ({} bytes) on association {}",
            message,
            data.len(),
            association_id
        );

        match pdu {
            S1apPdu::InitiatingMessage(msg) => {
                self.handle_initiating_message(ctx, association_id, msg)?
            }
            S1apPdu::SuccessfulOutcome(msg) => {
                self.handle_successful_outcome(ctx, association_id, msg)?
            }
            S1apPdu::UnsuccessfulOutcome(msg) => {
                Self::handle_unsuccessful_outcome(association_id, &msg)
            }
        }

        if !self.reply.is_requested() {
            return Ok(Dispatched { message, reply_sent: None });
        }

        let sent = transport
            .send(association_id, self.reply.to_bytes())
            .map_err(|source| MmeError::TransportSendFailure { association_id, source })?;
        log::debug!("Sent {} bytes reply to {} on association {}", sent, message, association_id);
        Ok(Dispatched { message, reply_sent: Some(sent) })
    }

    fn handle_initiating_message(
        &mut self,
        ctx: &mut S1apContext,
        association_id: AssociationId,
        msg: InitiatingMessage,
    ) -> MmeResult<()> {
        match msg {
            InitiatingMessage::S1SetupRequest(m) => {
                self.mngmt.handle_s1_setup_request(ctx, &m, association_id, &mut self.reply)
            }
            InitiatingMessage::InitialUeMessage(m) => {
                self.nas.handle_initial_ue_message(ctx, &m, association_id, &mut self.reply)
            }
            InitiatingMessage::UplinkNasTransport(m) => {
                self.nas.handle_uplink_nas_transport(ctx, &m, association_id, &mut self.reply)
            }
            InitiatingMessage::UeContextReleaseRequest(m) => self
                .ctx_mngmt
                .handle_ue_context_release_request(ctx, &m, association_id, &mut self.reply),
            // MME-originated messages arriving from an eNB
            other @ (InitiatingMessage::DownlinkNasTransport(_)
            | InitiatingMessage::InitialContextSetupRequest(_)
            | InitiatingMessage::UeContextReleaseCommand(_)
            | InitiatingMessage::Other { .. }) => Err(unhandled(
                other.name(),
                other.procedure_code(),
                association_id,
            )),
        }
    }

    fn handle_successful_outcome(
        &mut self,
        ctx: &mut S1apContext,
        association_id: AssociationId,
        msg: SuccessfulOutcome,
    ) -> MmeResult<()> {
        match msg {
            SuccessfulOutcome::InitialContextSetupResponse(m) => self
                .ctx_mngmt
                .handle_initial_context_setup_response(ctx, &m, association_id, &mut self.reply),
            SuccessfulOutcome::UeContextReleaseComplete(m) => self
                .ctx_mngmt
                .handle_ue_context_release_complete(ctx, &m, association_id, &mut self.reply),
            other @ (SuccessfulOutcome::S1SetupResponse(_) | SuccessfulOutcome::Other { .. }) => Err(
                unhandled(other.name(), other.procedure_code(), association_id),
            ),
        }
    }

    fn handle_unsuccessful_outcome(association_id: AssociationId, msg: &UnsuccessfulOutcome) {
        match msg {
            UnsuccessfulOutcome::InitialContextSetupFailure(m) => log::warn!(
                "InitialContextSetupFailure: MME-UE-S1AP-ID[{}] cause {:?} (association {})",
                m.mme_ue_s1ap_id,
                m.cause,
                association_id
            ),
            other => log::info!(
                "Received {} (procedure code {}) on association {}",
                other.name(),
                other.procedure_code(),
                association_id
            ),
        }
    }
}

fn unhandled(name: &str, procedure_code: u8, association_id: AssociationId) -> MmeError {
    log::warn!(
        "Unhandled {} (procedure code {}) on association {}",
        name,
        procedure_code,
        association_id
    );
    MmeError::UnhandledMessageKind(format!("{name} (procedure code {procedure_code})"))
}
