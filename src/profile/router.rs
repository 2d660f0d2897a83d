//! Stack callback routing for the HID and Battery profiles.

use super::engine::ServiceEngine;
use super::{HidEvent, HidEventHandler};
use crate::error::Error;
use crate::gatt::{
    uuid, BdAddr, ConnId, EncryptionLevel, GattEvent, GattEventKind, GattIf, GattStatus,
    GattTransport, Handle, SecurityLayer,
};

pub(super) const PROFILE_NUM: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum ProfileKind {
    Hid,
    Battery,
}

/// A registered application profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileInstance {
    pub kind: ProfileKind,
    pub app_id: u16,
    /// Interface assigned by the stack; `None` until registration succeeds.
    pub gatt_if: Option<GattIf>,
}

impl ProfileInstance {
    pub(super) const fn defaults() -> [ProfileInstance; PROFILE_NUM] {
        [
            ProfileInstance {
                kind: ProfileKind::Hid,
                app_id: uuid::HID_APP_ID,
                gatt_if: None,
            },
            ProfileInstance {
                kind: ProfileKind::Battery,
                app_id: uuid::BATTERY_APP_ID,
                gatt_if: None,
            },
        ]
    }

    /// An event is delivered when it carries no interface yet or carries
    /// this profile's interface.
    fn accepts(&self, gatt_if: Option<GattIf>) -> bool {
        gatt_if.is_none() || gatt_if == self.gatt_if
    }
}

impl<T: GattTransport + SecurityLayer> ServiceEngine<T> {
    /// Feed one stack callback through the profiles.
    pub fn handle_event<H>(&mut self, event: GattEvent<'_>, handler: &mut H) -> Result<(), Error>
    where
        H: HidEventHandler<T> + ?Sized,
    {
        if let GattEventKind::Register { app_id, status } = event.kind {
            if !status.is_ok() {
                error!(
                    "profile registration failed, app id {:?} status {:?}",
                    app_id,
                    status
                );
                self.registration_failed(app_id, status, event.gatt_if, handler);
                return Err(Error::RegistrationFailed(status));
            }
            if let Some(profile) = self.profiles.iter_mut().find(|p| p.app_id == app_id) {
                profile.gatt_if = event.gatt_if;
            }
        }

        for idx in 0..PROFILE_NUM {
            let profile = self.profiles[idx];
            if !profile.accepts(event.gatt_if) {
                continue;
            }
            match profile.kind {
                ProfileKind::Hid => self.hid_profile_event(&event, handler)?,
                ProfileKind::Battery => self.battery_profile_event(&event, handler),
            }
        }
        Ok(())
    }

    /// Tell the application which profile failed to register. No interface
    /// is stored and no table is created.
    fn registration_failed<H>(
        &mut self,
        app_id: u16,
        status: GattStatus,
        gatt_if: Option<GattIf>,
        handler: &mut H,
    ) where
        H: HidEventHandler<T> + ?Sized,
    {
        let event = match self.profiles.iter().find(|p| p.app_id == app_id) {
            Some(p) if p.kind == ProfileKind::Hid => HidEvent::RegFinish { status, gatt_if },
            Some(_) => HidEvent::BatteryRegistered { status, gatt_if },
            None => return,
        };
        handler.on_hid_event(&mut self.stack, event);
    }

    fn battery_profile_event<H>(&mut self, event: &GattEvent<'_>, handler: &mut H)
    where
        H: HidEventHandler<T> + ?Sized,
    {
        if let GattEventKind::Register { app_id, status } = event.kind {
            if app_id == uuid::BATTERY_APP_ID {
                info!("battery profile registered");
                handler.on_hid_event(
                    &mut self.stack,
                    HidEvent::BatteryRegistered {
                        status,
                        gatt_if: event.gatt_if,
                    },
                );
            }
        }
    }

    fn hid_profile_event<H>(&mut self, event: &GattEvent<'_>, handler: &mut H) -> Result<(), Error>
    where
        H: HidEventHandler<T> + ?Sized,
    {
        match event.kind {
            GattEventKind::Register { app_id, status } => {
                if app_id != uuid::HID_APP_ID {
                    return Ok(());
                }
                self.on_hid_registered(status, event.gatt_if, handler)
            }
            GattEventKind::Unregister { status } => {
                info!("HID profile unregistered");
                self.reset();
                handler.on_hid_event(&mut self.stack, HidEvent::DeinitFinish { status });
                Ok(())
            }
            GattEventKind::TableCreated {
                status,
                service_uuid,
                handles,
            } => {
                let gatt_if = event.gatt_if.or(self.hid_if()).unwrap_or_default();
                self.builder.on_table_created(
                    &mut self.stack,
                    gatt_if,
                    status,
                    service_uuid,
                    handles,
                    &mut self.reports,
                )
            }
            GattEventKind::Connect { conn_id, peer } => {
                self.on_connect(conn_id, peer, handler);
                Ok(())
            }
            GattEventKind::Disconnect { conn_id } => {
                self.on_disconnect(conn_id, handler);
                Ok(())
            }
            GattEventKind::Write {
                conn_id,
                handle,
                data,
            } => {
                self.on_write(conn_id, handle, data, handler);
                Ok(())
            }
            GattEventKind::Confirm { conn_id, status } => {
                trace!("confirm conn {} status {:?}", conn_id, status);
                Ok(())
            }
            GattEventKind::Close { conn_id } => {
                debug!("close conn {}", conn_id);
                Ok(())
            }
            GattEventKind::Create {
                status,
                service_handle,
            } => {
                debug!("service {} created, status {:?}", service_handle, status);
                Ok(())
            }
        }
    }

    fn on_hid_registered<H>(
        &mut self,
        status: GattStatus,
        gatt_if: Option<GattIf>,
        handler: &mut H,
    ) -> Result<(), Error>
    where
        H: HidEventHandler<T> + ?Sized,
    {
        info!("HID profile registered, interface {:?}", gatt_if);
        handler.on_hid_event(&mut self.stack, HidEvent::RegFinish { status, gatt_if });

        let Some(gatt_if) = gatt_if else {
            warn!("HID registration carried no interface");
            return Ok(());
        };
        self.builder.create_battery_table(&mut self.stack, gatt_if)
    }

    fn on_connect<H>(&mut self, conn_id: ConnId, peer: BdAddr, handler: &mut H)
    where
        H: HidEventHandler<T> + ?Sized,
    {
        info!("HID connection established, conn_id = {}", conn_id);
        self.connections.alloc(conn_id, peer);
        if let Err(e) = self.stack.request_encryption(&peer, EncryptionLevel::NoMitm) {
            warn!("encryption request failed: {:?}", e);
        }
        handler.on_hid_event(&mut self.stack, HidEvent::Connected { conn_id, peer });
    }

    fn on_disconnect<H>(&mut self, conn_id: ConnId, handler: &mut H)
    where
        H: HidEventHandler<T> + ?Sized,
    {
        let peer = self.connections.find(conn_id).map(|l| l.peer);
        if peer.is_none() {
            debug!("disconnect for unknown conn {}", conn_id);
        }
        info!("HID disconnected, conn_id = {}", conn_id);
        handler.on_hid_event(&mut self.stack, HidEvent::Disconnected { peer });
        self.connections.dealloc(conn_id);
    }

    /// Peer writes change no profile state. Writes to an output or feature
    /// report are passed up with the report id.
    fn on_write<H>(&mut self, conn_id: ConnId, handle: Handle, data: &[u8], handler: &mut H)
    where
        H: HidEventHandler<T> + ?Sized,
    {
        debug!(
            "write conn {} handle {} ({} bytes)",
            conn_id,
            handle,
            data.len()
        );
        let Some(entry) = self.reports.find_writable(handle) else {
            return;
        };
        let report_id = entry.id;
        handler.on_hid_event(
            &mut self.stack,
            HidEvent::VendorReportWritten {
                conn_id,
                report_id,
                data,
            },
        );
    }
}
