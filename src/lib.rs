//! Firmware core framework for a single-core System Control Processor
//! (SCP/MCP): the identifier model, the module lifecycle/binding engine, and
//! the event/notification scheduler that every hosted driver and service
//! plugs into. Concrete device drivers are not part of this crate; see
//! `demos/` (test-only) for minimal example modules exercising the full
//! bring-up -> bind -> start -> run -> stop sequence.

#![deny(unused_must_use)]

pub mod fwk_id;
pub mod fwk_module;
pub mod fwk_notification;
pub mod fwk_status;
pub mod fwk_thread;
pub mod runtime;

pub use fwk_id::{Id, IdKind};
pub use fwk_status::{FwkResult, Outcome, Status};
pub use runtime::Runtime;
