//! NextGCore MME S1 Session-Control Core
//!
//! Tracks connected eNBs and the control-plane identity and bearer state of
//! attached UEs, and routes decoded S1AP messages to the procedures that
//! mutate that state.

pub mod config;
pub mod context;
pub mod erab;
pub mod error;
pub mod ids;
pub mod s1ap_build;
pub mod s1ap_dispatch;
pub mod s1ap_handler;
pub mod s1ap_path;


pub use config::MmeConfig;
pub use context::S1apContext;
pub use error::{MmeError, MmeResult};
pub use s1ap_dispatch::{Dispatched, S1apDispatcher};
pub use s1ap_path::{S1apEvent, S1apTransport, TransportError};
