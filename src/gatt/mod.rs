//! GATT server data model.
//!
//! Everything the service engine exchanges with a BLE stack lives here:
//! handles, statuses, attribute declarations and the events the stack
//! reports back. The concrete stack sits behind the traits in
//! [`transport`].

pub mod table;
pub mod transport;
pub mod uuid;

use core::ops::BitOr;

pub use table::{battery_table, hid_table, BatteryIdx, HidIdx, IncludedService};
pub use transport::{GattTransport, SecurityLayer};

/// Attribute handle assigned by the GATT server.
pub type Handle = u16;

/// Interface number the stack assigns to a registered profile.
pub type GattIf = u8;

/// Connection identifier.
pub type ConnId = u16;

/// Bluetooth device address, little-endian as received from the stack.
pub type BdAddr = [u8; 6];

/// Client characteristic configuration bits (little-endian `u16` value).
pub mod ccc {
    pub const NOTIFY: u16 = 0x0001;
    pub const INDICATE: u16 = 0x0002;
}

/// Completion status carried by stack events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GattStatus {
    Ok,
    /// Stack specific failure code.
    Error(u8),
}

impl GattStatus {
    pub const fn is_ok(self) -> bool {
        matches!(self, GattStatus::Ok)
    }
}

/// Attribute access permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1 << 0);
    pub const READ_ENCRYPTED: Self = Self(1 << 1);
    pub const WRITE: Self = Self(1 << 4);
    pub const WRITE_ENCRYPTED: Self = Self(1 << 5);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Characteristic property bits (value of a characteristic declaration).
pub mod props {
    pub const READ: u8 = 0x02;
    pub const WRITE_NO_RSP: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
}

/// One row of an attribute table.
///
/// The stack copies `value` when the table is created; `max_len` bounds
/// later writes to the attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDecl<'a> {
    pub uuid: u16,
    pub perm: Permissions,
    pub max_len: u16,
    pub value: &'a [u8],
}

impl<'a> AttributeDecl<'a> {
    pub const fn new(uuid: u16, perm: Permissions, max_len: u16, value: &'a [u8]) -> Self {
        Self {
            uuid,
            perm,
            max_len,
            value,
        }
    }

    /// Characteristic declaration carrying a single property byte.
    pub const fn characteristic(value: &'a [u8]) -> Self {
        Self::new(uuid::CHARACTERISTIC, Permissions::READ, 1, value)
    }
}

/// Link encryption requested from the security layer on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncryptionLevel {
    /// Encrypted, unauthenticated (Just Works).
    NoMitm,
    /// Encrypted and authenticated.
    Mitm,
}

/// A callback from the GATT server.
///
/// `gatt_if` is `None` while a profile is still registering and has not
/// been given an interface yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattEvent<'a> {
    pub gatt_if: Option<GattIf>,
    pub kind: GattEventKind<'a>,
}

impl<'a> GattEvent<'a> {
    pub const fn new(gatt_if: Option<GattIf>, kind: GattEventKind<'a>) -> Self {
        Self { gatt_if, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattEventKind<'a> {
    /// A profile registration finished.
    Register { app_id: u16, status: GattStatus },
    /// A profile was unregistered.
    Unregister { status: GattStatus },
    /// An attribute table was instantiated; `handles` is parallel to the
    /// declarations that were submitted.
    TableCreated {
        status: GattStatus,
        service_uuid: u16,
        handles: &'a [Handle],
    },
    Connect { conn_id: ConnId, peer: BdAddr },
    Disconnect { conn_id: ConnId },
    /// The peer wrote an attribute.
    Write {
        conn_id: ConnId,
        handle: Handle,
        data: &'a [u8],
    },
    /// An indication was confirmed.
    Confirm { conn_id: ConnId, status: GattStatus },
    Close { conn_id: ConnId },
    /// A single service was created outside the table API.
    Create {
        status: GattStatus,
        service_handle: Handle,
    },
}
