//! HID-over-GATT device profile.
//!
//! [`ServiceEngine`] is the context object tying the pieces together:
//!
//! 1. **Builder** - creates the Battery table, then the HID table that
//!    includes it, and starts both services.
//! 2. **Report registry** - maps (report id, type, protocol mode) to the
//!    handles the stack assigned.
//! 3. **Connections** - the single host link.
//! 4. **Dispatcher** - turns key, mouse and consumer events into report
//!    notifications.
//! 5. **Router** - feeds stack callbacks to the HID and Battery profiles.
//!
//! Application code observes the profile through [`HidEventHandler`].

pub mod builder;
pub mod connection;
mod dispatcher;
pub mod engine;
pub mod report_map;
mod router;

pub use builder::{BuildStage, ServiceBuilder};
pub use connection::{ConnectionLink, ConnectionRegistry};
pub use engine::ServiceEngine;
pub use report_map::{ReportEntry, ReportRegistry};
pub use router::{ProfileInstance, ProfileKind};

use crate::gatt::{BdAddr, ConnId, GattIf, GattStatus};

/// Events reported upward to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidEvent<'a> {
    /// The HID profile finished registering with the stack.
    RegFinish {
        status: GattStatus,
        gatt_if: Option<GattIf>,
    },
    /// The Battery profile finished registering with the stack.
    BatteryRegistered {
        status: GattStatus,
        gatt_if: Option<GattIf>,
    },
    /// The HID profile was unregistered after `deinit`.
    DeinitFinish { status: GattStatus },
    Connected { conn_id: ConnId, peer: BdAddr },
    /// `peer` is the address held by the freed link, if the connection
    /// was known.
    Disconnected { peer: Option<BdAddr> },
    VendorReportWritten {
        conn_id: ConnId,
        report_id: u8,
        data: &'a [u8],
    },
}

/// Receiver of [`HidEvent`]s.
///
/// The handler is lent the stack for the duration of the call so it can
/// drive advertising and security in response.
pub trait HidEventHandler<T: ?Sized> {
    fn on_hid_event(&mut self, stack: &mut T, event: HidEvent<'_>);
}
