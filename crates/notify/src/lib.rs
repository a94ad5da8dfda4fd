//! Outbound mail for the plan approval workflow.
//!
//! This crate turns the `Notification` events emitted by the workflow engine
//! into rendered emails and hands them to a `MailTransport`:
//! - **Messages** (`messages`) - subject/body rendering per notification kind
//! - **Dispatcher** (`dispatcher`) - best-effort fan-out, one email per
//!   recipient; delivery failures are logged and reported, never propagated
//!
//! # Key Types
//!
//! - `OutboundEmail` - a rendered message addressed to one recipient
//! - `MailTransport` - async seam for the actual delivery mechanism
//! - `NotificationDispatcher` - renders and sends, returning a `DispatchReport`

pub mod dispatcher;
pub mod messages;

pub use dispatcher::{
    DispatchFailure, DispatchReport, LoggingMailTransport, MailTransport, NotificationDispatcher,
    RecordingMailTransport, TransportError,
};
pub use messages::{render, OutboundEmail};
