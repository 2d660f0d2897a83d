//! The HID service engine: owns the stack and all profile state.

use core::ops::RangeInclusive;

use super::builder::{BuildStage, ServiceBuilder};
use super::connection::ConnectionRegistry;
use super::report_map::{ReportEntry, ReportRegistry};
use super::router::{ProfileInstance, ProfileKind, PROFILE_NUM};
use crate::error::Error;
use crate::gatt::{
    ccc, uuid, BatteryIdx, ConnId, GattIf, GattTransport, Handle, HidIdx, SecurityLayer,
};
use crate::hid::{ProtocolMode, ReportType};

/// HID device context.
///
/// Created once by the firmware (or a test) around a stack implementation.
/// Every stack callback goes through [`ServiceEngine::handle_event`];
/// input tasks call the `send_*` methods.
pub struct ServiceEngine<T> {
    pub(super) stack: T,
    pub(super) enabled: bool,
    pub(super) profiles: [ProfileInstance; PROFILE_NUM],
    pub(super) builder: ServiceBuilder,
    pub(super) reports: ReportRegistry,
    pub(super) connections: ConnectionRegistry,
    pub(super) protocol_mode: ProtocolMode,
}

impl<T: GattTransport + SecurityLayer> ServiceEngine<T> {
    pub fn new(stack: T) -> Self {
        Self {
            stack,
            enabled: false,
            profiles: ProfileInstance::defaults(),
            builder: ServiceBuilder::new(),
            reports: ReportRegistry::new(),
            connections: ConnectionRegistry::new(),
            protocol_mode: ProtocolMode::Report,
        }
    }

    /// Reset all profile state and mark the engine enabled. Does nothing
    /// if already enabled.
    pub fn init(&mut self) {
        if self.enabled {
            return;
        }
        self.reset();
        self.enabled = true;
        debug!("HID engine initialised");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register the Battery and HID application profiles with the stack.
    pub fn register_profiles(&mut self) -> Result<(), Error> {
        if !self.enabled {
            return Err(Error::NotInitialized);
        }
        self.stack.register_profile(uuid::BATTERY_APP_ID)?;
        self.stack.register_profile(uuid::HID_APP_ID)?;
        Ok(())
    }

    /// Stop and delete the HID service and unregister the HID profile.
    ///
    /// Completion is reported as `HidEvent::DeinitFinish` when the stack
    /// confirms the unregistration.
    pub fn deinit(&mut self) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }
        let svc = self.builder.handle(HidIdx::Svc);
        if svc == 0 {
            return Ok(());
        }

        self.stack.stop_service(svc)?;
        self.stack.delete_service(svc)?;
        if let Some(gatt_if) = self.hid_if() {
            self.stack.unregister_profile(gatt_if)?;
        }
        info!("HID service {} stopped", svc);
        Ok(())
    }

    /// Handles a host may access through the attribute accessors, once the
    /// HID table is installed.
    pub fn hid_value_range(&self) -> Option<RangeInclusive<Handle>> {
        self.builder.hid_installed().then(|| {
            self.builder.handle(HidIdx::HidInfoVal)..=self.builder.handle(HidIdx::ReportRepRef)
        })
    }

    fn check_handle(&self, handle: Handle) -> Result<(), Error> {
        match self.hid_value_range() {
            Some(range) if range.contains(&handle) => Ok(()),
            _ => {
                error!("attribute handle {} outside the HID service", handle);
                Err(Error::InvalidHandle(handle))
            }
        }
    }

    pub fn set_attribute_value(&mut self, handle: Handle, value: &[u8]) -> Result<(), Error> {
        self.check_handle(handle)?;
        self.stack.set_attribute_value(handle, value)?;
        Ok(())
    }

    /// Read an attribute into `buf`, returning the value length.
    pub fn get_attribute_value(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, Error> {
        self.check_handle(handle)?;
        Ok(self.stack.get_attribute_value(handle, buf)?)
    }

    /// Update the battery level characteristic and notify the host.
    pub fn set_battery_level(&mut self, percent: u8) -> Result<(), Error> {
        if !self.builder.battery_installed() {
            return Ok(());
        }
        let handle = self.builder.battery_handle(BatteryIdx::LevelVal);
        self.stack.set_attribute_value(handle, &[percent])?;

        let Some((gatt_if, link)) = self.hid_if().zip(self.connections.active()) else {
            return Ok(());
        };
        let conn_id = link.conn_id;
        if !self.notifications_enabled(self.builder.battery_handle(BatteryIdx::LevelCcc))? {
            trace!("battery level not subscribed");
            return Ok(());
        }
        self.stack
            .send_notification(gatt_if, conn_id, handle, &[percent], false)?;
        Ok(())
    }

    /// Whether the host enabled notifications through the CCC at `cccd`.
    /// A characteristic without a CCC (`cccd == 0`) is always sent.
    pub(super) fn notifications_enabled(&mut self, cccd: Handle) -> Result<bool, Error> {
        if cccd == 0 {
            return Ok(true);
        }
        let mut buf = [0u8; 2];
        self.stack.get_attribute_value(cccd, &mut buf)?;
        Ok(u16::from_le_bytes(buf) & ccc::NOTIFY != 0)
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        self.protocol_mode
    }

    pub fn set_protocol_mode(&mut self, mode: ProtocolMode) {
        if mode != self.protocol_mode {
            info!("protocol mode {:?}", mode);
        }
        self.protocol_mode = mode;
    }

    /// Report entry for `(id, report_type)` under the active protocol mode.
    pub fn lookup_report(&self, id: u8, report_type: ReportType) -> Option<&ReportEntry> {
        self.reports.lookup(id, report_type, self.protocol_mode)
    }

    pub(super) fn profile(&self, kind: ProfileKind) -> &ProfileInstance {
        &self.profiles[kind as usize]
    }

    /// Interface of the HID profile once registered.
    pub fn hid_if(&self) -> Option<GattIf> {
        self.profile(ProfileKind::Hid).gatt_if
    }

    /// Interface of the Battery profile once registered.
    pub fn battery_if(&self) -> Option<GattIf> {
        self.profile(ProfileKind::Battery).gatt_if
    }

    pub fn stage(&self) -> BuildStage {
        self.builder.stage()
    }

    pub fn builder(&self) -> &ServiceBuilder {
        &self.builder
    }

    pub fn reports(&self) -> &ReportRegistry {
        &self.reports
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Connection id of the host link, if connected.
    pub fn active_conn_id(&self) -> Option<ConnId> {
        self.connections.active().map(|l| l.conn_id)
    }

    pub fn stack(&self) -> &T {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut T {
        &mut self.stack
    }

    pub(super) fn reset(&mut self) {
        self.enabled = false;
        self.profiles = ProfileInstance::defaults();
        self.builder.reset();
        self.reports.clear();
        self.connections.clear();
        self.protocol_mode = ProtocolMode::Report;
    }
}
