//! Pairing and bond keys.
//!
//! Just Works pairing with bonding. Bonds live in a [`BondTable`]; every
//! new bond is handed to the storage task so it survives a power cycle.
//! The host's CCC subscriptions are kept with its bond and restored when
//! it reconnects.

use core::cell::RefCell;

use bt_macropad::bond::{BondRecord, BondTable, MasterKeyId, SYS_ATTRS_MAX};
use bt_macropad::GapEvent;
use defmt::{debug, error, info, warn};
use nrf_softdevice::ble::gatt_server::{get_sys_attrs, set_sys_attrs};
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    Address, AddressType, Connection, EncryptionInfo, IdentityKey, IdentityResolutionKey, MasterId,
    SecurityMode,
};
use nrf_softdevice::raw;
use static_cell::StaticCell;

use super::GAP_EVENTS;
use crate::storage::BOND_SAVE;

pub struct Bonder {
    bonds: RefCell<BondTable>,
}

impl Bonder {
    fn new(bonds: BondTable) -> Self {
        Self {
            bonds: RefCell::new(bonds),
        }
    }

    /// Master id of the bond whose identity matches the connected host.
    fn bonded_peer(&self, conn: &Connection) -> Option<MasterKeyId> {
        let addr = conn.peer_address();
        self.bonds
            .borrow()
            .iter()
            .find(|b| identity(b).is_match(addr))
            .map(|b| b.master_id)
    }

    /// Hand the table to the storage task if it changed.
    fn persist(&self) {
        let mut bonds = self.bonds.borrow_mut();
        if bonds.is_dirty() {
            BOND_SAVE.signal(bonds.clone());
            bonds.mark_clean();
        }
    }
}

fn address_type_code(t: AddressType) -> u8 {
    match t {
        AddressType::Public => 0,
        AddressType::RandomStatic => 1,
        AddressType::RandomPrivateResolvable => 2,
        AddressType::RandomPrivateNonResolvable => 3,
        AddressType::Anonymous => 4,
    }
}

fn address_type(code: u8) -> AddressType {
    match code {
        1 => AddressType::RandomStatic,
        2 => AddressType::RandomPrivateResolvable,
        3 => AddressType::RandomPrivateNonResolvable,
        4 => AddressType::Anonymous,
        _ => AddressType::Public,
    }
}

fn identity(bond: &BondRecord) -> IdentityKey {
    IdentityKey {
        addr: Address::new(address_type(bond.peer_addr_type), bond.peer_addr),
        irk: IdentityResolutionKey::from_raw(raw::ble_gap_irk_t { irk: bond.irk }),
    }
}

fn master_key_id(master_id: &MasterId) -> MasterKeyId {
    MasterKeyId {
        ediv: master_id.ediv,
        rand: master_id.rand,
    }
}

fn bond_record(master_id: &MasterId, key: &EncryptionInfo, peer_id: &IdentityKey) -> BondRecord {
    BondRecord::new(
        master_key_id(master_id),
        key.ltk,
        key.flags,
        address_type_code(peer_id.addr.address_type()),
        peer_id.addr.bytes(),
        peer_id.irk.as_raw().irk,
    )
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn on_bonded(
        &self,
        conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        debug!("storing bond, ediv {}", master_id.ediv);
        let mut record = bond_record(&master_id, &key, &peer_id);
        let mut buf = [0u8; SYS_ATTRS_MAX];
        match get_sys_attrs(conn, &mut buf) {
            Ok(len) => {
                if record.set_sys_attrs(&buf[..len]).is_err() {
                    warn!("system attributes too long, not stored");
                }
            }
            Err(e) => warn!("reading system attributes failed: {:?}", e),
        }
        self.bonds.borrow_mut().insert(record);
        self.persist();
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.bonds
            .borrow()
            .find_by_master_id(&master_key_id(&master_id))
            .map(|b| EncryptionInfo {
                ltk: b.ltk,
                flags: b.ltk_flags,
            })
    }

    fn save_sys_attrs(&self, conn: &Connection) {
        let Some(master_id) = self.bonded_peer(conn) else {
            debug!("host not bonded, system attributes dropped");
            return;
        };
        let mut buf = [0u8; SYS_ATTRS_MAX];
        let len = match get_sys_attrs(conn, &mut buf) {
            Ok(len) => len,
            Err(e) => {
                error!("reading system attributes failed: {:?}", e);
                return;
            }
        };
        let result = self.bonds.borrow_mut().set_sys_attrs(&master_id, &buf[..len]);
        match result {
            Ok(true) => {
                debug!("system attributes updated, {} bytes", len);
                self.persist();
            }
            Ok(false) => {}
            Err(e) => error!("storing system attributes failed: {:?}", e),
        }
    }

    fn load_sys_attrs(&self, conn: &Connection) {
        let bonds = self.bonds.borrow();
        let addr = conn.peer_address();
        // No attributes yet means the stack starts from defaults.
        let attrs = bonds
            .iter()
            .find(|b| identity(b).is_match(addr))
            .map(|b| b.sys_attrs())
            .filter(|a| !a.is_empty());
        debug!("restoring system attributes: {}", attrs.is_some());
        if let Err(e) = set_sys_attrs(conn, attrs) {
            warn!("restoring system attributes failed: {:?}", e);
        }
    }

    fn on_security_update(&self, conn: &Connection, mode: SecurityMode) {
        info!("BLE security mode updated: {}", mode);
        let event = GapEvent::AuthComplete {
            peer: conn.peer_address().bytes(),
            success: !matches!(mode, SecurityMode::NoAccess | SecurityMode::Open),
            fail_reason: 0,
        };
        if GAP_EVENTS.try_send(event).is_err() {
            warn!("GAP event queue full, security update dropped");
        }
    }
}

/// Install the bonder, seeded with the bonds loaded from flash.
pub fn bonder(bonds: BondTable) -> &'static Bonder {
    static BONDER: StaticCell<Bonder> = StaticCell::new();
    BONDER.init(Bonder::new(bonds))
}
