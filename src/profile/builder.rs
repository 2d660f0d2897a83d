//! Two-phase creation of the Battery and HID services.
//!
//! The HID table includes the Battery service, so the battery handles must
//! be known before the HID table can be submitted:
//!
//! ```text
//! Idle ── create_battery_table ──▶ BatteryPending
//! BatteryPending ── battery TableCreated ──▶ HidPending   (HID table submitted)
//! HidPending ── HID TableCreated ──▶ Active               (reports registered)
//! any ── failed Battery/HID table or wrong handle count ──▶ Failed
//! ```

use super::report_map::{hid_report_entries, ReportRegistry};
use crate::error::Error;
use crate::gatt::{
    battery_table, hid_table, uuid, BatteryIdx, GattIf, GattStatus, GattTransport, Handle, HidIdx,
    IncludedService,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BuildStage {
    #[default]
    Idle,
    BatteryPending,
    HidPending,
    Active,
    Failed,
}

#[derive(Debug)]
pub struct ServiceBuilder {
    stage: BuildStage,
    include: IncludedService,
    include_value: [u8; 6],
    battery: [Handle; BatteryIdx::COUNT],
    hid: [Handle; HidIdx::COUNT],
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceBuilder {
    pub const fn new() -> Self {
        Self {
            stage: BuildStage::Idle,
            include: IncludedService {
                start: 0,
                end: 0,
                uuid: 0,
            },
            include_value: [0; 6],
            battery: [0; BatteryIdx::COUNT],
            hid: [0; HidIdx::COUNT],
        }
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Include record installed into the HID table.
    pub fn included_service(&self) -> IncludedService {
        self.include
    }

    pub fn handle(&self, idx: HidIdx) -> Handle {
        self.hid[idx as usize]
    }

    pub fn handles(&self) -> &[Handle; HidIdx::COUNT] {
        &self.hid
    }

    pub fn battery_handle(&self, idx: BatteryIdx) -> Handle {
        self.battery[idx as usize]
    }

    /// Whether the HID table has been installed.
    pub fn hid_installed(&self) -> bool {
        self.hid[HidIdx::Svc as usize] != 0
    }

    /// Whether the Battery table has been installed.
    pub fn battery_installed(&self) -> bool {
        self.battery[BatteryIdx::Svc as usize] != 0
    }

    /// Submit the Battery table. First step of the build.
    pub fn create_battery_table<T: GattTransport + ?Sized>(
        &mut self,
        stack: &mut T,
        gatt_if: GattIf,
    ) -> Result<(), Error> {
        if self.stage != BuildStage::Idle {
            warn!("battery table requested in stage {:?}", self.stage);
        }
        stack.create_attribute_table(gatt_if, &battery_table(), 0)?;
        self.stage = BuildStage::BatteryPending;
        Ok(())
    }

    /// Handle a `TableCreated` event.
    pub fn on_table_created<T: GattTransport + ?Sized>(
        &mut self,
        stack: &mut T,
        gatt_if: GattIf,
        status: GattStatus,
        service_uuid: u16,
        handles: &[Handle],
        reports: &mut ReportRegistry,
    ) -> Result<(), Error> {
        if !status.is_ok() {
            error!(
                "attribute table {:?} creation failed: {:?}",
                service_uuid,
                status
            );
            if matches!(service_uuid, uuid::BATTERY_SERVICE | uuid::HID_SERVICE) {
                self.stage = BuildStage::Failed;
            }
            return Err(Error::TableCreationFailed(status));
        }

        match service_uuid {
            uuid::BATTERY_SERVICE => self.on_battery_table(stack, gatt_if, handles),
            uuid::HID_SERVICE => self.on_hid_table(stack, handles, reports),
            _ => {
                let Some(&first) = handles.first() else {
                    warn!("table {:?} created without handles", service_uuid);
                    return Ok(());
                };
                debug!("starting service {:?} at handle {}", service_uuid, first);
                stack.start_service(first)?;
                Ok(())
            }
        }
    }

    fn on_battery_table<T: GattTransport + ?Sized>(
        &mut self,
        stack: &mut T,
        gatt_if: GattIf,
        handles: &[Handle],
    ) -> Result<(), Error> {
        let battery: [Handle; BatteryIdx::COUNT] = match handles.try_into() {
            Ok(h) => h,
            Err(_) => return self.mismatch(BatteryIdx::COUNT, handles.len()),
        };
        if self.stage != BuildStage::BatteryPending {
            warn!("unexpected battery table in stage {:?}, ignoring", self.stage);
            return Ok(());
        }

        self.battery = battery;
        self.include = IncludedService::battery(battery[BatteryIdx::Svc as usize]);
        self.include_value = self.include.encode();
        info!(
            "battery service at {}..={}, creating HID table",
            self.include.start,
            self.include.end
        );

        stack.create_attribute_table(gatt_if, &hid_table(&self.include_value), 0)?;
        self.stage = BuildStage::HidPending;
        stack.start_service(battery[BatteryIdx::Svc as usize])?;
        Ok(())
    }

    fn on_hid_table<T: GattTransport + ?Sized>(
        &mut self,
        stack: &mut T,
        handles: &[Handle],
        reports: &mut ReportRegistry,
    ) -> Result<(), Error> {
        let hid: [Handle; HidIdx::COUNT] = match handles.try_into() {
            Ok(h) => h,
            Err(_) => return self.mismatch(HidIdx::COUNT, handles.len()),
        };
        if self.stage != BuildStage::HidPending {
            warn!(
                "HID table created before the battery table (stage {:?}), ignoring",
                self.stage
            );
            return Ok(());
        }

        self.hid = hid;
        info!("HID service handle = {}", hid[HidIdx::Svc as usize]);
        reports.register(&hid_report_entries(&self.hid))?;
        stack.start_service(hid[HidIdx::Svc as usize])?;
        self.stage = BuildStage::Active;
        Ok(())
    }

    fn mismatch(&mut self, expected: usize, actual: usize) -> Result<(), Error> {
        error!(
            "attribute table returned {} handles, expected {}",
            actual,
            expected
        );
        self.stage = BuildStage::Failed;
        Err(Error::HandleCountMismatch { expected, actual })
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
