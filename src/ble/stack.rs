//! `nrf-softdevice` backend for the HID service engine.
//!
//! The SoftDevice registers services synchronously and has no notion of
//! application profiles, so registration and table creation complete
//! inside the call. The engine still expects them as callbacks: they are
//! queued here as [`StackEvent`]s and delivered by [`super::pump`].

use bt_macropad::error::TransportError;
use bt_macropad::gap::{AdvKind, AdvertisingData, AdvertisingParams, GapEvent, GapLayer};
use bt_macropad::gatt::{
    props, uuid, AttributeDecl, BdAddr, ConnId, EncryptionLevel, GattEvent, GattEventKind, GattIf,
    GattStatus, GattTransport, Handle, HidIdx, Permissions, SecurityLayer,
};
use defmt::{debug, error, info, trace, warn, Format};
use heapless::{Deque, Vec};
use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementDataType, LegacyAdvertisementBuilder, LegacyAdvertisementPayload,
};
use nrf_softdevice::ble::gatt_server::builder::{ServiceBuilder, ServiceHandle};
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{
    self, GetValueError, IndicateValueError, NotifyValueError, RegisterError, SetValueError,
};
use nrf_softdevice::ble::{AuthenticateError, Connection, SecurityMode, Uuid};
use nrf_softdevice::{raw, RawError, Softdevice};

/// Largest table the engine submits.
const MAX_HANDLES: usize = HidIdx::COUNT;

/// Longest peer write forwarded to the engine.
const MAX_WRITE: usize = 16;

/// Legacy advertising payload length.
const ADV_LEN: usize = 31;

/// Status reported when the SoftDevice refuses a service.
const STATUS_REJECTED: u8 = 0x85;

/// CCC descriptors across all built services.
const MAX_CCCDS: usize = 8;

/// A queued stack callback, owned until it is delivered.
pub enum StackEvent {
    Register {
        gatt_if: GattIf,
        app_id: u16,
    },
    Unregister {
        gatt_if: GattIf,
    },
    TableCreated {
        gatt_if: GattIf,
        status: GattStatus,
        service_uuid: u16,
        handles: Vec<Handle, MAX_HANDLES>,
    },
    Connect {
        conn_id: ConnId,
        peer: BdAddr,
    },
    Disconnect {
        conn_id: ConnId,
    },
    Write {
        conn_id: ConnId,
        handle: Handle,
        data: Vec<u8, MAX_WRITE>,
    },
}

impl StackEvent {
    pub fn as_event(&self) -> GattEvent<'_> {
        match self {
            StackEvent::Register { gatt_if, app_id } => GattEvent::new(
                Some(*gatt_if),
                GattEventKind::Register {
                    app_id: *app_id,
                    status: GattStatus::Ok,
                },
            ),
            StackEvent::Unregister { gatt_if } => GattEvent::new(
                Some(*gatt_if),
                GattEventKind::Unregister {
                    status: GattStatus::Ok,
                },
            ),
            StackEvent::TableCreated {
                gatt_if,
                status,
                service_uuid,
                handles,
            } => GattEvent::new(
                Some(*gatt_if),
                GattEventKind::TableCreated {
                    status: *status,
                    service_uuid: *service_uuid,
                    handles,
                },
            ),
            // Link events are not tied to one profile.
            StackEvent::Connect { conn_id, peer } => GattEvent::new(
                None,
                GattEventKind::Connect {
                    conn_id: *conn_id,
                    peer: *peer,
                },
            ),
            StackEvent::Disconnect { conn_id } => {
                GattEvent::new(None, GattEventKind::Disconnect { conn_id: *conn_id })
            }
            StackEvent::Write {
                conn_id,
                handle,
                data,
            } => GattEvent::new(
                None,
                GattEventKind::Write {
                    conn_id: *conn_id,
                    handle: *handle,
                    data,
                },
            ),
        }
    }
}

/// Advertising the BLE task should start next.
#[derive(Clone)]
pub struct AdvRequest {
    pub adv_data: Vec<u8, ADV_LEN>,
    pub scan_data: Vec<u8, ADV_LEN>,
    /// 0.625 ms units.
    pub interval: u32,
}

#[derive(Debug, Format)]
enum BuildError {
    Register(RegisterError),
    /// Declarations out of order, or more than the handle buffer holds.
    Malformed(usize),
    /// An include points at a service that was not built here.
    UnknownInclude(Handle),
}

impl From<RegisterError> for BuildError {
    fn from(e: RegisterError) -> Self {
        BuildError::Register(e)
    }
}

pub struct SoftdeviceStack {
    sd: &'static mut Softdevice,
    next_if: GattIf,
    /// Built services, keyed by their declaration handle.
    services: Vec<(Handle, ServiceHandle), 2>,
    /// CCC values live per connection in the SoftDevice.
    cccds: Vec<Handle, MAX_CCCDS>,
    link: Option<(ConnId, Connection)>,
    events: Deque<StackEvent, 8>,
    gap_events: Deque<GapEvent, 4>,
    adv: Option<AdvRequest>,
    adv_pending: bool,
}

impl SoftdeviceStack {
    pub fn new(sd: &'static mut Softdevice) -> Self {
        Self {
            sd,
            next_if: 1,
            services: Vec::new(),
            cccds: Vec::new(),
            link: None,
            events: Deque::new(),
            gap_events: Deque::new(),
            adv: None,
            adv_pending: false,
        }
    }

    pub fn next_event(&mut self) -> Option<StackEvent> {
        self.events.pop_front()
    }

    pub fn next_gap_event(&mut self) -> Option<GapEvent> {
        self.gap_events.pop_front()
    }

    /// Advertising requested since the last call, if any.
    pub fn take_adv_request(&mut self) -> Option<AdvRequest> {
        if !self.adv_pending {
            return None;
        }
        self.adv_pending = false;
        self.adv.clone()
    }

    /// A host connected.
    pub fn attach(&mut self, conn: Connection) {
        let Some(conn_id) = conn.handle() else {
            warn!("attach: connection already closed");
            return;
        };
        let peer = conn.peer_address().bytes();
        self.link = Some((conn_id, conn));
        self.queue(StackEvent::Connect { conn_id, peer });
    }

    /// The GATT server for the current link stopped.
    pub fn detach(&mut self) {
        if let Some((conn_id, _)) = self.link.take() {
            self.queue(StackEvent::Disconnect { conn_id });
        }
    }

    pub fn on_write(&mut self, conn_id: ConnId, handle: Handle, data: &[u8]) {
        let len = data.len().min(MAX_WRITE);
        let mut buf = Vec::new();
        // Cannot fail, `len` is bounded by the capacity.
        let _ = buf.extend_from_slice(&data[..len]);
        self.queue(StackEvent::Write {
            conn_id,
            handle,
            data: buf,
        });
    }

    fn queue(&mut self, event: StackEvent) {
        if self.events.push_back(event).is_err() {
            error!("stack event queue full, event dropped");
        }
    }

    fn connection(&self, conn_id: ConnId) -> Result<&Connection, TransportError> {
        match &self.link {
            Some((id, conn)) if *id == conn_id => Ok(conn),
            _ => Err(TransportError::Disconnected),
        }
    }

    fn build_service(
        &mut self,
        service_uuid: u16,
        table: &[AttributeDecl<'_>],
    ) -> Result<Vec<Handle, MAX_HANDLES>, BuildError> {
        let mut handles: Vec<Handle, MAX_HANDLES> = Vec::new();
        handles
            .resize(table.len(), 0)
            .map_err(|_| BuildError::Malformed(table.len()))?;

        let mut sb = ServiceBuilder::new(&mut *self.sd, Uuid::new_16(service_uuid))?;
        let mut i = 1;
        while i < table.len() {
            let decl = &table[i];
            match decl.uuid {
                uuid::INCLUDE => {
                    let start = le_u16(decl.value);
                    let (_, included) = self
                        .services
                        .iter()
                        .find(|(h, _)| *h == start)
                        .ok_or(BuildError::UnknownInclude(start))?;
                    handles[i] = sb.include_service(included)?.handle();
                    i += 1;
                }
                uuid::CHARACTERISTIC => {
                    let value = table.get(i + 1).ok_or(BuildError::Malformed(i))?;
                    let props = decl.value.first().copied().unwrap_or(0);
                    let mut cb = sb.add_characteristic(
                        Uuid::new_16(value.uuid),
                        attribute(value),
                        Metadata::new(properties(props)),
                    )?;

                    // The SoftDevice adds the CCC itself for notifying
                    // characteristics; every other descriptor is explicit.
                    let mut ccc_slot = None;
                    let mut j = i + 2;
                    while let Some(desc) = table.get(j) {
                        if matches!(desc.uuid, uuid::CHARACTERISTIC | uuid::INCLUDE) {
                            break;
                        }
                        if desc.uuid == uuid::CLIENT_CHARACTERISTIC_CONFIGURATION {
                            ccc_slot = Some(j);
                        } else {
                            handles[j] = cb
                                .add_descriptor(Uuid::new_16(desc.uuid), attribute(desc))?
                                .handle();
                        }
                        j += 1;
                    }

                    let ch = cb.build();
                    handles[i] = ch.value_handle - 1;
                    handles[i + 1] = ch.value_handle;
                    if let Some(slot) = ccc_slot {
                        handles[slot] = ch.cccd_handle;
                        if self.cccds.push(ch.cccd_handle).is_err() {
                            warn!("CCC {} not tracked", ch.cccd_handle);
                        }
                    }
                    i = j;
                }
                _ => return Err(BuildError::Malformed(i)),
            }
        }

        let service = sb.build();
        handles[0] = service.handle();
        if self.services.push((handles[0], service)).is_err() {
            warn!("service {} not kept for includes", handles[0]);
        }
        Ok(handles)
    }
}

impl SoftdeviceStack {
    /// Reads a CCC as the connected host last wrote it. Without a host
    /// every CCC reads as zero.
    fn get_cccd_value(&self, handle: Handle, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(conn_handle) = self.link.as_ref().and_then(|(_, c)| c.handle()) else {
            buf.fill(0);
            return Ok(buf.len());
        };
        let mut value = raw::ble_gatts_value_t {
            len: buf.len() as u16,
            offset: 0,
            p_value: buf.as_mut_ptr(),
        };
        let ret = unsafe { raw::sd_ble_gatts_value_get(conn_handle, handle, &mut value) };
        RawError::convert(ret).map_err(raw_error)?;
        Ok(usize::from(value.len).min(buf.len()))
    }
}

fn le_u16(bytes: &[u8]) -> u16 {
    match bytes {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        _ => 0,
    }
}

fn security(perm: Permissions, open: Permissions, encrypted: Permissions) -> SecurityMode {
    if perm.contains(encrypted) {
        SecurityMode::JustWorks
    } else if perm.contains(open) {
        SecurityMode::Open
    } else {
        SecurityMode::NoAccess
    }
}

fn attribute<'a>(decl: &AttributeDecl<'a>) -> Attribute<&'a [u8]> {
    let max_len = decl.max_len.max(decl.value.len() as u16);
    Attribute::new(decl.value)
        .read_security(security(
            decl.perm,
            Permissions::READ,
            Permissions::READ_ENCRYPTED,
        ))
        .write_security(security(
            decl.perm,
            Permissions::WRITE,
            Permissions::WRITE_ENCRYPTED,
        ))
        .variable_len(max_len)
}

fn properties(bits: u8) -> Properties {
    let mut p = Properties::new();
    if bits & props::READ != 0 {
        p = p.read();
    }
    if bits & props::WRITE != 0 {
        p = p.write();
    }
    if bits & props::WRITE_NO_RSP != 0 {
        p = p.write_without_response();
    }
    if bits & props::NOTIFY != 0 {
        p = p.notify();
    }
    p
}

fn raw_error(e: RawError) -> TransportError {
    TransportError::Raw(e as u32)
}

impl GattTransport for SoftdeviceStack {
    fn register_profile(&mut self, app_id: u16) -> Result<(), TransportError> {
        let gatt_if = self.next_if;
        self.next_if = self.next_if.wrapping_add(1);
        debug!("profile {} -> interface {}", app_id, gatt_if);
        self.queue(StackEvent::Register { gatt_if, app_id });
        Ok(())
    }

    fn create_attribute_table(
        &mut self,
        gatt_if: GattIf,
        table: &[AttributeDecl<'_>],
        _svc_inst: u8,
    ) -> Result<(), TransportError> {
        let service_uuid = table.first().map(|d| le_u16(d.value)).unwrap_or(0);
        let (status, handles) = match self.build_service(service_uuid, table) {
            Ok(handles) => {
                info!("service {} built, {} attributes", service_uuid, handles.len());
                (GattStatus::Ok, handles)
            }
            Err(e) => {
                error!("service {} rejected: {:?}", service_uuid, e);
                (GattStatus::Error(STATUS_REJECTED), Vec::new())
            }
        };
        self.queue(StackEvent::TableCreated {
            gatt_if,
            status,
            service_uuid,
            handles,
        });
        Ok(())
    }

    fn start_service(&mut self, service_handle: Handle) -> Result<(), TransportError> {
        // SoftDevice services are live as soon as they are built.
        trace!("service {} started", service_handle);
        Ok(())
    }

    fn stop_service(&mut self, service_handle: Handle) -> Result<(), TransportError> {
        warn!("service {} cannot be stopped before reset", service_handle);
        Err(TransportError::Unsupported)
    }

    fn delete_service(&mut self, service_handle: Handle) -> Result<(), TransportError> {
        warn!("service {} cannot be deleted before reset", service_handle);
        Err(TransportError::Unsupported)
    }

    fn unregister_profile(&mut self, gatt_if: GattIf) -> Result<(), TransportError> {
        self.queue(StackEvent::Unregister { gatt_if });
        Ok(())
    }

    fn set_attribute_value(&mut self, handle: Handle, value: &[u8]) -> Result<(), TransportError> {
        gatt_server::set_value(self.sd, handle, value).map_err(|e| match e {
            SetValueError::Raw(e) => raw_error(e),
            _ => TransportError::NoResources,
        })
    }

    fn get_attribute_value(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.cccds.contains(&handle) {
            return self.get_cccd_value(handle, buf);
        }
        gatt_server::get_value(self.sd, handle, buf).map_err(|e| match e {
            GetValueError::Raw(e) => raw_error(e),
            _ => TransportError::NoResources,
        })
    }

    fn send_notification(
        &mut self,
        _gatt_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        data: &[u8],
        need_confirm: bool,
    ) -> Result<(), TransportError> {
        let conn = self.connection(conn_id)?;
        if need_confirm {
            gatt_server::indicate_value(conn, handle, data).map_err(|e| match e {
                IndicateValueError::Disconnected => TransportError::Disconnected,
                IndicateValueError::Raw(e) => raw_error(e),
            })
        } else {
            gatt_server::notify_value(conn, handle, data).map_err(|e| match e {
                NotifyValueError::Disconnected => TransportError::Disconnected,
                NotifyValueError::Raw(e) => raw_error(e),
            })
        }
    }
}

impl SecurityLayer for SoftdeviceStack {
    fn request_encryption(&mut self, peer: &BdAddr, level: EncryptionLevel) -> Result<(), TransportError> {
        let Some((_, conn)) = self
            .link
            .as_ref()
            .filter(|(_, c)| c.peer_address().bytes() == *peer)
        else {
            return Err(TransportError::Disconnected);
        };
        if level == EncryptionLevel::Mitm {
            warn!("no IO capability, pairing without MITM protection");
        }
        conn.request_pairing().map_err(|e| match e {
            AuthenticateError::Disconnected => TransportError::Disconnected,
            AuthenticateError::Raw(e) => raw_error(e),
        })
    }
}

impl GapLayer for SoftdeviceStack {
    fn set_device_name(&mut self, name: &str) -> Result<(), TransportError> {
        // Readable by anyone, not writable.
        let perm = raw::ble_gap_conn_sec_mode_t {
            _bitfield_1: raw::ble_gap_conn_sec_mode_t::new_bitfield_1(1, 1),
        };
        let ret = unsafe { raw::sd_ble_gap_device_name_set(&perm, name.as_ptr(), name.len() as u16) };
        RawError::convert(ret).map_err(raw_error)
    }

    fn configure_advertising_data(&mut self, data: &AdvertisingData) -> Result<(), TransportError> {
        let mut adv = LegacyAdvertisementBuilder::new()
            .raw(AdvertisementDataType::FLAGS, &[data.flags])
            .raw(
                AdvertisementDataType::INCOMPLETE_16_SERVICE_LIST,
                &data.service_uuid.to_le_bytes(),
            )
            .raw(AdvertisementDataType::APPEARANCE, &data.appearance.to_le_bytes());
        if data.include_txpower {
            adv = adv.raw(AdvertisementDataType::TXPOWER_LEVEL, &[0]);
        }
        if data.include_name {
            adv = adv.full_name(data.name);
        }
        let adv = adv.try_build().map_err(|_| TransportError::NoResources)?;

        // Hosts that scan get the name even when it did not fit above.
        let scan: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
            .full_name(data.name)
            .try_build()
            .map_err(|_| TransportError::NoResources)?;

        self.adv = Some(AdvRequest {
            adv_data: Vec::from_slice(&adv).map_err(|_| TransportError::NoResources)?,
            scan_data: Vec::from_slice(&scan).map_err(|_| TransportError::NoResources)?,
            interval: 0,
        });
        if self.gap_events.push_back(GapEvent::AdvDataSetComplete).is_err() {
            error!("GAP event queue full");
        }
        Ok(())
    }

    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), TransportError> {
        if params.kind == AdvKind::NonConnectable {
            return Err(TransportError::Unsupported);
        }
        let Some(adv) = self.adv.as_mut() else {
            warn!("advertising requested before its data was set");
            return Err(TransportError::Unsupported);
        };
        adv.interval = u32::from(params.interval_min);
        self.adv_pending = true;
        Ok(())
    }

    fn security_response(&mut self, peer: &BdAddr, accept: bool) -> Result<(), TransportError> {
        // The SoftDevice answers through the bonder.
        trace!("security response for {:?}: {}", peer, accept);
        Ok(())
    }
}
