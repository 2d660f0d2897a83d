//! Capabilities the service engine needs from a BLE stack.
//!
//! Calls are fire-and-forget: completion is reported later as a
//! [`GattEvent`](super::GattEvent) fed back into the engine.

use super::{AttributeDecl, BdAddr, ConnId, EncryptionLevel, GattIf, Handle};
use crate::error::TransportError;

/// GATT server operations.
pub trait GattTransport {
    /// Register an application profile. The stack answers with a
    /// `Register` event carrying the assigned interface.
    fn register_profile(&mut self, app_id: u16) -> Result<(), TransportError>;

    /// Submit an attribute table. The stack answers with `TableCreated`
    /// carrying one handle per declaration, in order.
    fn create_attribute_table(
        &mut self,
        gatt_if: GattIf,
        table: &[AttributeDecl<'_>],
        svc_inst: u8,
    ) -> Result<(), TransportError>;

    fn start_service(&mut self, service_handle: Handle) -> Result<(), TransportError>;

    fn stop_service(&mut self, service_handle: Handle) -> Result<(), TransportError>;

    fn delete_service(&mut self, service_handle: Handle) -> Result<(), TransportError>;

    fn unregister_profile(&mut self, gatt_if: GattIf) -> Result<(), TransportError>;

    fn set_attribute_value(&mut self, handle: Handle, value: &[u8]) -> Result<(), TransportError>;

    /// Copy an attribute value into `buf`, returning the number of bytes
    /// written.
    fn get_attribute_value(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Notify (or indicate, with `need_confirm`) a value to a connected peer.
    fn send_notification(
        &mut self,
        gatt_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        data: &[u8],
        need_confirm: bool,
    ) -> Result<(), TransportError>;
}

/// Link security operations.
pub trait SecurityLayer {
    fn request_encryption(&mut self, peer: &BdAddr, level: EncryptionLevel) -> Result<(), TransportError>;
}
