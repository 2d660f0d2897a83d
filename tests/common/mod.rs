//! Shared fixtures: a fake BLE stack and a recording event handler.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use bt_macropad::gap::{AdvertisingData, AdvertisingParams, GapLayer};
use bt_macropad::gatt::{
    AttributeDecl, BdAddr, ConnId, EncryptionLevel, GattEvent, GattEventKind, GattIf, GattStatus,
    GattTransport, Handle, HidIdx, SecurityLayer,
};
use bt_macropad::profile::{HidEvent, HidEventHandler, ServiceEngine};
use bt_macropad::TransportError;

#[ctor::ctor]
fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub const HID_IF: GattIf = 3;
pub const BATTERY_IF: GattIf = 4;
pub const PEER: BdAddr = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

/// Every call the engine made on the stack, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RegisterProfile(u16),
    CreateTable { gatt_if: GattIf, service_uuid: u16, len: usize },
    StartService(Handle),
    StopService(Handle),
    DeleteService(Handle),
    UnregisterProfile(GattIf),
    SetValue(Handle, Vec<u8>),
    Notify { gatt_if: GattIf, conn_id: ConnId, handle: Handle, data: Vec<u8> },
    RequestEncryption(BdAddr),
    SetDeviceName(String),
    ConfigureAdvertising(AdvertisingData),
    StartAdvertising(AdvertisingParams),
    SecurityResponse(BdAddr, bool),
}

/// Table submitted but not yet answered with `TableCreated`.
#[derive(Debug, Clone)]
pub struct PendingTable {
    pub gatt_if: GattIf,
    pub service_uuid: u16,
    pub handles: Vec<Handle>,
}

struct Attribute {
    value: Vec<u8>,
    max_len: usize,
}

/// In-memory GATT server that assigns handles sequentially.
pub struct FakeStack {
    pub calls: Vec<Call>,
    pub pending: VecDeque<PendingTable>,
    attributes: HashMap<Handle, Attribute>,
    next_handle: Handle,
    /// When set, `send_notification` fails with this error.
    pub notify_error: Option<TransportError>,
}

impl FakeStack {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            pending: VecDeque::new(),
            attributes: HashMap::new(),
            next_handle: 40,
            notify_error: None,
        }
    }

    pub fn notifications(&self) -> Vec<(Handle, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Notify { handle, data, .. } => Some((*handle, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn value(&self, handle: Handle) -> Option<&[u8]> {
        self.attributes.get(&handle).map(|a| a.value.as_slice())
    }
}

impl GattTransport for FakeStack {
    fn register_profile(&mut self, app_id: u16) -> Result<(), TransportError> {
        self.calls.push(Call::RegisterProfile(app_id));
        Ok(())
    }

    fn create_attribute_table(
        &mut self,
        gatt_if: GattIf,
        table: &[AttributeDecl<'_>],
        _svc_inst: u8,
    ) -> Result<(), TransportError> {
        let service_uuid = table
            .first()
            .map(|d| u16::from_le_bytes([d.value[0], d.value[1]]))
            .ok_or(TransportError::Unsupported)?;
        let mut handles = Vec::with_capacity(table.len());
        for decl in table {
            let handle = self.next_handle;
            self.next_handle += 1;
            self.attributes.insert(
                handle,
                Attribute {
                    value: decl.value.to_vec(),
                    max_len: decl.max_len as usize,
                },
            );
            handles.push(handle);
        }
        self.calls.push(Call::CreateTable {
            gatt_if,
            service_uuid,
            len: table.len(),
        });
        self.pending.push_back(PendingTable {
            gatt_if,
            service_uuid,
            handles,
        });
        Ok(())
    }

    fn start_service(&mut self, service_handle: Handle) -> Result<(), TransportError> {
        self.calls.push(Call::StartService(service_handle));
        Ok(())
    }

    fn stop_service(&mut self, service_handle: Handle) -> Result<(), TransportError> {
        self.calls.push(Call::StopService(service_handle));
        Ok(())
    }

    fn delete_service(&mut self, service_handle: Handle) -> Result<(), TransportError> {
        self.calls.push(Call::DeleteService(service_handle));
        Ok(())
    }

    fn unregister_profile(&mut self, gatt_if: GattIf) -> Result<(), TransportError> {
        self.calls.push(Call::UnregisterProfile(gatt_if));
        Ok(())
    }

    fn set_attribute_value(&mut self, handle: Handle, value: &[u8]) -> Result<(), TransportError> {
        let attr = self
            .attributes
            .get_mut(&handle)
            .ok_or(TransportError::Unsupported)?;
        if value.len() > attr.max_len {
            return Err(TransportError::NoResources);
        }
        attr.value = value.to_vec();
        self.calls.push(Call::SetValue(handle, value.to_vec()));
        Ok(())
    }

    fn get_attribute_value(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, TransportError> {
        let attr = self
            .attributes
            .get(&handle)
            .ok_or(TransportError::Unsupported)?;
        let len = attr.value.len().min(buf.len());
        buf[..len].copy_from_slice(&attr.value[..len]);
        Ok(len)
    }

    fn send_notification(
        &mut self,
        gatt_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        data: &[u8],
        _need_confirm: bool,
    ) -> Result<(), TransportError> {
        if let Some(e) = self.notify_error {
            return Err(e);
        }
        self.calls.push(Call::Notify {
            gatt_if,
            conn_id,
            handle,
            data: data.to_vec(),
        });
        Ok(())
    }
}

impl SecurityLayer for FakeStack {
    fn request_encryption(&mut self, peer: &BdAddr, _level: EncryptionLevel) -> Result<(), TransportError> {
        self.calls.push(Call::RequestEncryption(*peer));
        Ok(())
    }
}

impl GapLayer for FakeStack {
    fn set_device_name(&mut self, name: &str) -> Result<(), TransportError> {
        self.calls.push(Call::SetDeviceName(name.to_string()));
        Ok(())
    }

    fn configure_advertising_data(&mut self, data: &AdvertisingData) -> Result<(), TransportError> {
        self.calls.push(Call::ConfigureAdvertising(*data));
        Ok(())
    }

    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), TransportError> {
        self.calls.push(Call::StartAdvertising(*params));
        Ok(())
    }

    fn security_response(&mut self, peer: &BdAddr, accept: bool) -> Result<(), TransportError> {
        self.calls.push(Call::SecurityResponse(*peer, accept));
        Ok(())
    }
}

/// Owned copy of a [`HidEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    RegFinish(GattStatus, Option<GattIf>),
    BatteryRegistered(GattStatus, Option<GattIf>),
    DeinitFinish(GattStatus),
    Connected(ConnId, BdAddr),
    Disconnected(Option<BdAddr>),
    VendorReportWritten(ConnId, u8, Vec<u8>),
}

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<Seen>,
}

impl<T: ?Sized> HidEventHandler<T> for Recorder {
    fn on_hid_event(&mut self, _stack: &mut T, event: HidEvent<'_>) {
        self.events.push(match event {
            HidEvent::RegFinish { status, gatt_if } => Seen::RegFinish(status, gatt_if),
            HidEvent::BatteryRegistered { status, gatt_if } => {
                Seen::BatteryRegistered(status, gatt_if)
            }
            HidEvent::DeinitFinish { status } => Seen::DeinitFinish(status),
            HidEvent::Connected { conn_id, peer } => Seen::Connected(conn_id, peer),
            HidEvent::Disconnected { peer } => Seen::Disconnected(peer),
            HidEvent::VendorReportWritten {
                conn_id,
                report_id,
                data,
            } => Seen::VendorReportWritten(conn_id, report_id, data.to_vec()),
        });
    }
}

pub type Engine = ServiceEngine<FakeStack>;

pub fn engine() -> Engine {
    let mut engine = ServiceEngine::new(FakeStack::new());
    engine.init();
    engine
}

pub fn register<H: HidEventHandler<FakeStack>>(engine: &mut Engine, handler: &mut H) {
    engine.register_profiles().unwrap();
    engine
        .handle_event(
            GattEvent::new(
                Some(BATTERY_IF),
                GattEventKind::Register {
                    app_id: 0x180F,
                    status: GattStatus::Ok,
                },
            ),
            handler,
        )
        .unwrap();
    engine
        .handle_event(
            GattEvent::new(
                Some(HID_IF),
                GattEventKind::Register {
                    app_id: 0x1812,
                    status: GattStatus::Ok,
                },
            ),
            handler,
        )
        .unwrap();
}

/// Answer the oldest submitted table with a successful `TableCreated`.
pub fn complete_table<H: HidEventHandler<FakeStack>>(
    engine: &mut Engine,
    handler: &mut H,
) -> PendingTable {
    let table = engine
        .stack_mut()
        .pending
        .pop_front()
        .expect("no table pending");
    engine
        .handle_event(
            GattEvent::new(
                Some(table.gatt_if),
                GattEventKind::TableCreated {
                    status: GattStatus::Ok,
                    service_uuid: table.service_uuid,
                    handles: &table.handles,
                },
            ),
            handler,
        )
        .unwrap();
    table
}

/// Register both profiles and build both tables.
pub fn active_engine<H: HidEventHandler<FakeStack>>(handler: &mut H) -> Engine {
    let mut engine = engine();
    register(&mut engine, handler);
    complete_table(&mut engine, handler);
    complete_table(&mut engine, handler);
    engine
}

pub fn connect<H: HidEventHandler<FakeStack>>(engine: &mut Engine, handler: &mut H, conn_id: ConnId) {
    engine
        .handle_event(
            GattEvent::new(Some(HID_IF), GattEventKind::Connect { conn_id, peer: PEER }),
            handler,
        )
        .unwrap();
}

pub fn disconnect<H: HidEventHandler<FakeStack>>(
    engine: &mut Engine,
    handler: &mut H,
    conn_id: ConnId,
) {
    engine
        .handle_event(
            GattEvent::new(Some(HID_IF), GattEventKind::Disconnect { conn_id }),
            handler,
        )
        .unwrap();
}

/// Host enables notifications on the CCC at `ccc`.
pub fn subscribe_handle(engine: &mut Engine, ccc: Handle) {
    engine.stack_mut().set_attribute_value(ccc, &[0x01, 0x00]).unwrap();
}

/// Host enables notifications on a HID report CCC.
pub fn subscribe(engine: &mut Engine, ccc: HidIdx) {
    let handle = engine.builder().handle(ccc);
    subscribe_handle(engine, handle);
}

pub fn write<H: HidEventHandler<FakeStack>>(
    engine: &mut Engine,
    handler: &mut H,
    conn_id: ConnId,
    handle: Handle,
    data: &[u8],
) {
    engine
        .handle_event(
            GattEvent::new(Some(HID_IF), GattEventKind::Write { conn_id, handle, data }),
            handler,
        )
        .unwrap();
}
