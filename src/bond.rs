//! Bonded host records.
//!
//! A bond is what the peripheral needs to re-encrypt a link with a host it
//! paired with before. Records have a fixed little-endian layout so the
//! firmware can persist the whole table in one flash item.
//!
//! Record layout (`RECORD_SIZE` bytes):
//!   `[0..2]` ediv, `[2..10]` rand, `[10..26]` LTK, `[26]` LTK flags,
//!   `[27]` peer address type, `[28..34]` peer address, `[34..50]` IRK,
//!   `[50]` system attributes length, `[51..113]` system attributes.
//!
//! System attributes are the stack's opaque snapshot of the host's CCC
//! writes, restored when the host reconnects.

use heapless::Vec;

use crate::config::MAX_BONDS;
use crate::error::Error;
use crate::gatt::BdAddr;

/// Room for the system attributes of every CCC the device exposes.
pub const SYS_ATTRS_MAX: usize = 62;

pub const RECORD_SIZE: usize = 51 + SYS_ATTRS_MAX;

/// Serialized size of a full table: count byte plus records.
pub const TABLE_SIZE: usize = 1 + MAX_BONDS * RECORD_SIZE;

/// Key used by the host to look up the LTK on reconnection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterKeyId {
    pub ediv: u16,
    pub rand: [u8; 8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondRecord {
    pub master_id: MasterKeyId,
    pub ltk: [u8; 16],
    pub ltk_flags: u8,
    pub peer_addr_type: u8,
    pub peer_addr: BdAddr,
    pub irk: [u8; 16],
    sys_attrs_len: u8,
    sys_attrs: [u8; SYS_ATTRS_MAX],
}

impl Default for BondRecord {
    fn default() -> Self {
        Self {
            master_id: MasterKeyId::default(),
            ltk: [0; 16],
            ltk_flags: 0,
            peer_addr_type: 0,
            peer_addr: [0; 6],
            irk: [0; 16],
            sys_attrs_len: 0,
            sys_attrs: [0; SYS_ATTRS_MAX],
        }
    }
}

impl BondRecord {
    pub fn new(
        master_id: MasterKeyId,
        ltk: [u8; 16],
        ltk_flags: u8,
        peer_addr_type: u8,
        peer_addr: BdAddr,
        irk: [u8; 16],
    ) -> Self {
        Self {
            master_id,
            ltk,
            ltk_flags,
            peer_addr_type,
            peer_addr,
            irk,
            ..Self::default()
        }
    }

    /// Saved system attributes, empty until the host has written a CCC.
    pub fn sys_attrs(&self) -> &[u8] {
        &self.sys_attrs[..usize::from(self.sys_attrs_len)]
    }

    /// Returns whether the stored attributes changed.
    pub fn set_sys_attrs(&mut self, attrs: &[u8]) -> Result<bool, Error> {
        if attrs.len() > SYS_ATTRS_MAX {
            return Err(Error::BufferOverflow);
        }
        if self.sys_attrs() == attrs {
            return Ok(false);
        }
        self.sys_attrs = [0; SYS_ATTRS_MAX];
        self.sys_attrs[..attrs.len()].copy_from_slice(attrs);
        self.sys_attrs_len = attrs.len() as u8;
        Ok(true)
    }

    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let out = buf
            .get_mut(..RECORD_SIZE)
            .ok_or(Error::BufferOverflow)?;
        out[0..2].copy_from_slice(&self.master_id.ediv.to_le_bytes());
        out[2..10].copy_from_slice(&self.master_id.rand);
        out[10..26].copy_from_slice(&self.ltk);
        out[26] = self.ltk_flags;
        out[27] = self.peer_addr_type;
        out[28..34].copy_from_slice(&self.peer_addr);
        out[34..50].copy_from_slice(&self.irk);
        out[50] = self.sys_attrs_len;
        out[51..].copy_from_slice(&self.sys_attrs);
        Ok(RECORD_SIZE)
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        let data = data.get(..RECORD_SIZE)?;
        let mut record = Self::default();
        record.master_id.ediv = u16::from_le_bytes([data[0], data[1]]);
        record.master_id.rand.copy_from_slice(&data[2..10]);
        record.ltk.copy_from_slice(&data[10..26]);
        record.ltk_flags = data[26];
        record.peer_addr_type = data[27];
        record.peer_addr.copy_from_slice(&data[28..34]);
        record.irk.copy_from_slice(&data[34..50]);
        let len = data[50];
        if usize::from(len) > SYS_ATTRS_MAX {
            return None;
        }
        record.sys_attrs_len = len;
        record.sys_attrs.copy_from_slice(&data[51..]);
        Some(record)
    }
}

/// In-memory bond table, oldest record first.
#[derive(Debug, Clone, Default)]
pub struct BondTable {
    bonds: Vec<BondRecord, MAX_BONDS>,
    dirty: bool,
}

impl BondTable {
    pub const fn new() -> Self {
        Self {
            bonds: Vec::new(),
            dirty: false,
        }
    }

    /// Store a bond, replacing any record with the same master id and
    /// evicting the oldest when full.
    pub fn insert(&mut self, record: BondRecord) {
        self.dirty = true;
        if let Some(existing) = self
            .bonds
            .iter_mut()
            .find(|b| b.master_id == record.master_id)
        {
            *existing = record;
            debug!("bond updated");
            return;
        }

        if self.bonds.is_full() {
            warn!("bond table full, evicting oldest bond");
            self.bonds.remove(0);
        }
        // Room was made above.
        let _ = self.bonds.push(record);
        info!("bond stored, {} total", self.bonds.len());
    }

    pub fn find_by_master_id(&self, master_id: &MasterKeyId) -> Option<&BondRecord> {
        self.bonds.iter().find(|b| b.master_id == *master_id)
    }

    pub fn find_by_peer(&self, peer: &BdAddr) -> Option<&BondRecord> {
        self.bonds.iter().find(|b| b.peer_addr == *peer)
    }

    /// Store the system attributes of the bond with `master_id`. The table
    /// is only marked dirty when they changed.
    pub fn set_sys_attrs(&mut self, master_id: &MasterKeyId, attrs: &[u8]) -> Result<bool, Error> {
        let bond = self
            .bonds
            .iter_mut()
            .find(|b| b.master_id == *master_id)
            .ok_or(Error::UnknownBond)?;
        let changed = bond.set_sys_attrs(attrs)?;
        self.dirty |= changed;
        Ok(changed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BondRecord> {
        self.bonds.iter()
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    /// Whether the table changed since it was last loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn clear(&mut self) {
        self.dirty |= !self.bonds.is_empty();
        self.bonds.clear();
    }

    /// Write the table as `[count][records...]`.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let needed = 1 + self.bonds.len() * RECORD_SIZE;
        if buf.len() < needed {
            return Err(Error::BufferOverflow);
        }
        buf[0] = self.bonds.len() as u8;
        let mut offset = 1;
        for bond in &self.bonds {
            offset += bond.serialize(&mut buf[offset..])?;
        }
        Ok(offset)
    }

    /// Replace the table with the records in `data`. Truncated trailing
    /// records are dropped.
    pub fn load(&mut self, data: &[u8]) {
        self.bonds.clear();
        self.dirty = false;
        let Some((&count, mut rest)) = data.split_first() else {
            return;
        };
        for _ in 0..count {
            let Some(record) = BondRecord::deserialize(rest) else {
                warn!("truncated bond record");
                break;
            };
            if self.bonds.push(record).is_err() {
                break;
            }
            rest = &rest[RECORD_SIZE..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ediv: u16, addr_last: u8) -> BondRecord {
        BondRecord::new(
            MasterKeyId {
                ediv,
                rand: [ediv as u8; 8],
            },
            [0xA5; 16],
            0x03,
            1,
            [1, 2, 3, 4, 5, addr_last],
            [0x5A; 16],
        )
    }

    #[test]
    fn record_layout() {
        let r = record(0x1234, 9);
        let mut buf = [0u8; RECORD_SIZE];
        assert_eq!(r.serialize(&mut buf), Ok(RECORD_SIZE));
        assert_eq!(&buf[0..2], &[0x34, 0x12]);
        assert_eq!(buf[26], 0x03);
        assert_eq!(&buf[28..34], &[1, 2, 3, 4, 5, 9]);
        assert_eq!(BondRecord::deserialize(&buf), Some(r));
    }

    #[test]
    fn sys_attrs_survive_reload() {
        let mut table = BondTable::new();
        table.insert(record(3, 3));
        table.insert(record(4, 4));
        table.mark_clean();

        let attrs = [0x10, 0x00, 0x02, 0x00, 0x01, 0x00, 0xAB, 0xCD];
        let id = record(4, 4).master_id;
        assert_eq!(table.set_sys_attrs(&id, &attrs), Ok(true));
        assert!(table.is_dirty());

        let mut buf = [0u8; TABLE_SIZE];
        let len = table.serialize(&mut buf).unwrap();
        let mut loaded = BondTable::new();
        loaded.load(&buf[..len]);
        assert_eq!(loaded.find_by_master_id(&id).unwrap().sys_attrs(), &attrs);
        assert!(loaded.find_by_master_id(&record(3, 3).master_id).unwrap().sys_attrs().is_empty());
    }

    #[test]
    fn unchanged_sys_attrs_keep_table_clean() {
        let mut table = BondTable::new();
        table.insert(record(5, 5));
        let id = record(5, 5).master_id;
        table.set_sys_attrs(&id, &[1, 2, 3]).unwrap();
        table.mark_clean();

        assert_eq!(table.set_sys_attrs(&id, &[1, 2, 3]), Ok(false));
        assert!(!table.is_dirty());
        assert_eq!(
            table.set_sys_attrs(&id, &[0; SYS_ATTRS_MAX + 1]),
            Err(Error::BufferOverflow)
        );
        assert_eq!(
            table.set_sys_attrs(&record(9, 9).master_id, &[1]),
            Err(Error::UnknownBond)
        );
    }

    #[test]
    fn corrupt_sys_attrs_length_rejected() {
        let mut buf = [0u8; RECORD_SIZE];
        record(1, 1).serialize(&mut buf).unwrap();
        buf[50] = SYS_ATTRS_MAX as u8 + 1;
        assert_eq!(BondRecord::deserialize(&buf), None);
    }

    #[test]
    fn short_buffers_rejected() {
        let mut buf = [0u8; RECORD_SIZE - 1];
        assert_eq!(record(1, 1).serialize(&mut buf), Err(Error::BufferOverflow));
        assert_eq!(BondRecord::deserialize(&buf), None);
    }

    #[test]
    fn same_master_id_replaces() {
        let mut table = BondTable::new();
        table.insert(record(1, 1));
        let mut updated = record(1, 1);
        updated.ltk = [0x11; 16];
        table.insert(updated);
        assert_eq!(table.len(), 1);
        assert_eq!(table.find_by_master_id(&updated.master_id).unwrap().ltk, [0x11; 16]);
    }

    #[test]
    fn full_table_evicts_oldest() {
        let mut table = BondTable::new();
        for i in 0..MAX_BONDS as u16 {
            table.insert(record(i, i as u8));
        }
        table.insert(record(100, 100));
        assert_eq!(table.len(), MAX_BONDS);
        assert!(table.find_by_master_id(&record(0, 0).master_id).is_none());
        assert!(table.find_by_peer(&[1, 2, 3, 4, 5, 100]).is_some());
    }

    #[test]
    fn table_survives_reload() {
        let mut table = BondTable::new();
        table.insert(record(7, 7));
        table.insert(record(8, 8));
        assert!(table.is_dirty());

        let mut buf = [0u8; TABLE_SIZE];
        let len = table.serialize(&mut buf).unwrap();
        assert_eq!(len, 1 + 2 * RECORD_SIZE);

        let mut loaded = BondTable::new();
        loaded.load(&buf[..len]);
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.iter().next(), Some(&record(7, 7)));
    }

    #[test]
    fn truncated_data_keeps_complete_records() {
        let mut table = BondTable::new();
        table.insert(record(1, 1));
        table.insert(record(2, 2));
        let mut buf = [0u8; TABLE_SIZE];
        let len = table.serialize(&mut buf).unwrap();

        let mut loaded = BondTable::new();
        loaded.load(&buf[..len - 1]);
        assert_eq!(loaded.len(), 1);

        loaded.load(&[]);
        assert!(loaded.is_empty());
    }
}
