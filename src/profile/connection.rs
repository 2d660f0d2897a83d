//! Connection registry for host links.

use crate::config::HID_MAX_APPS;
use crate::gatt::{BdAddr, ConnId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionLink {
    pub in_use: bool,
    pub conn_id: ConnId,
    pub peer: BdAddr,
    pub connected: bool,
}

impl ConnectionLink {
    pub const fn empty() -> Self {
        Self {
            in_use: false,
            conn_id: 0,
            peer: [0; 6],
            connected: false,
        }
    }
}

/// Fixed table of [`HID_MAX_APPS`] links.
#[derive(Debug)]
pub struct ConnectionRegistry {
    links: [ConnectionLink; HID_MAX_APPS],
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub const fn new() -> Self {
        Self {
            links: [ConnectionLink::empty(); HID_MAX_APPS],
        }
    }

    /// Record a new link in the first free slot. Returns the slot index,
    /// or `None` when every slot is taken.
    pub fn alloc(&mut self, conn_id: ConnId, peer: BdAddr) -> Option<usize> {
        let Some(slot) = self.links.iter().position(|l| !l.in_use) else {
            warn!("no free connection slot for conn {}", conn_id);
            return None;
        };

        self.links[slot] = ConnectionLink {
            in_use: true,
            conn_id,
            peer,
            connected: true,
        };
        Some(slot)
    }

    /// Clear the slot holding `conn_id`. Returns `false` if no slot matched.
    pub fn dealloc(&mut self, conn_id: ConnId) -> bool {
        match self
            .links
            .iter_mut()
            .find(|l| l.in_use && l.conn_id == conn_id)
        {
            Some(link) => {
                *link = ConnectionLink::empty();
                true
            }
            None => false,
        }
    }

    pub fn find(&self, conn_id: ConnId) -> Option<&ConnectionLink> {
        self.links
            .iter()
            .find(|l| l.in_use && l.conn_id == conn_id)
    }

    /// The first connected link, if any.
    pub fn active(&self) -> Option<&ConnectionLink> {
        self.links.iter().find(|l| l.in_use && l.connected)
    }

    pub fn in_use_count(&self) -> usize {
        self.links.iter().filter(|l| l.in_use).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionLink> {
        self.links.iter()
    }

    pub fn clear(&mut self) {
        self.links = [ConnectionLink::empty(); HID_MAX_APPS];
    }
}
