//! Error taxonomy.
//!
//! Every fallible framework operation returns [`FwkResult<T>`]. `Status` is
//! the error side of that result; success is represented the ordinary Rust
//! way (`Ok(..)`), and "the operation is still in flight, try again later"
//! is represented by [`Outcome::Pending`] on the `Ok` side of a dispatch
//! result rather than folded into the error enum — `Pending` is explicitly
//! not an error.

use core::fmt;

/// The framework's error enum. `Copy` so it can be threaded through the
/// dispatch loop and the bind broker without allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A parameter was malformed: an undefined id, a kind mismatch, an
    /// index out of range, a null required callback.
    ParamError,
    /// The operation is not permitted in the current lifecycle stage or
    /// entity state.
    StateError,
    /// The operation cannot complete right now because the framework is
    /// already busy with a conflicting operation (e.g. a nested
    /// `submit_and_wait`).
    BusyError,
    /// The event pool, a queue, or another fixed-capacity resource is
    /// exhausted.
    NoMemError,
    /// A module's callback returned a failure that the framework could not
    /// itself classify more specifically.
    HandlerError,
    /// A hosted module's device-level operation failed. The core never
    /// produces this itself; it exists for hosted modules to report driver
    /// failures through the same taxonomy.
    DeviceError,
    /// A hosted module's operation exceeded its deadline.
    TimeoutError,
    /// The requested capability is not supported by this build or product.
    SupportError,
    /// A value fell outside its accepted range.
    RangeError,
    /// The caller is not permitted to perform this operation.
    AccessError,
    /// An unrecoverable internal fault; the only correct response is a
    /// controlled system reset.
    PanicError,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::ParamError => "invalid parameter",
            Status::StateError => "invalid lifecycle state",
            Status::BusyError => "framework busy",
            Status::NoMemError => "resource exhausted",
            Status::HandlerError => "handler error",
            Status::DeviceError => "device error",
            Status::TimeoutError => "operation timed out",
            Status::SupportError => "not supported",
            Status::RangeError => "value out of range",
            Status::AccessError => "access denied",
            Status::PanicError => "unrecoverable fault",
        };
        f.write_str(s)
    }
}

/// Framework-wide `Result` alias.
pub type FwkResult<T> = core::result::Result<T, Status>;

/// The two ways a handler callback can succeed: the work finished inline, or
/// it is now pending and the eventual result will arrive later as a
/// delayed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler finished; any requested response is ready now.
    Complete,
    /// The handler accepted the request but the result isn't ready yet. If
    /// a response was requested, it will be fulfilled later as a delayed
    /// response carrying the same cookie.
    Pending,
}
