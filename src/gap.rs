//! GAP side of the device: advertising, pairing and link state.
//!
//! [`LinkHandler`] receives the HID profile events and the stack's GAP
//! events and decides when the macropad may send input.

use crate::config::{
    ADV_FLAGS, ADV_INTERVAL_MAX, ADV_INTERVAL_MIN, APPEARANCE_GENERIC_HID, CONN_INTERVAL_MAX,
    CONN_INTERVAL_MIN, DEVICE_NAME,
};
use crate::error::TransportError;
use crate::gatt::{uuid, BdAddr, ConnId};
use crate::mode::KeyboardMode;
use crate::profile::{HidEvent, HidEventHandler};

/// Advertising payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingData {
    pub name: &'static str,
    pub include_name: bool,
    pub include_txpower: bool,
    pub appearance: u16,
    /// 16-bit service UUID listed in the payload.
    pub service_uuid: u16,
    pub flags: u8,
    /// Preferred peripheral connection interval, 1.25 ms units.
    pub conn_interval_min: u16,
    pub conn_interval_max: u16,
}

impl AdvertisingData {
    pub const fn hid() -> Self {
        Self {
            name: DEVICE_NAME,
            include_name: true,
            include_txpower: true,
            appearance: APPEARANCE_GENERIC_HID,
            service_uuid: uuid::HID_SERVICE,
            flags: ADV_FLAGS,
            conn_interval_min: CONN_INTERVAL_MIN,
            conn_interval_max: CONN_INTERVAL_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvKind {
    ConnectableUndirected,
    ScannableUndirected,
    NonConnectable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OwnAddress {
    Public,
    Random,
}

/// Advertising channels 37, 38 and 39.
pub const ADV_CHANNEL_ALL: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParams {
    /// 0.625 ms units.
    pub interval_min: u16,
    pub interval_max: u16,
    pub kind: AdvKind,
    pub own_address: OwnAddress,
    pub channel_map: u8,
}

impl AdvertisingParams {
    pub const fn hid() -> Self {
        Self {
            interval_min: ADV_INTERVAL_MIN,
            interval_max: ADV_INTERVAL_MAX,
            kind: AdvKind::ConnectableUndirected,
            own_address: OwnAddress::Public,
            channel_map: ADV_CHANNEL_ALL,
        }
    }
}

/// Advertising and security control offered by the BLE stack.
pub trait GapLayer {
    fn set_device_name(&mut self, name: &str) -> Result<(), TransportError>;

    /// Completion is reported as [`GapEvent::AdvDataSetComplete`].
    fn configure_advertising_data(&mut self, data: &AdvertisingData)
        -> Result<(), TransportError>;

    fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), TransportError>;

    /// Answer a peer's security request.
    fn security_response(&mut self, peer: &BdAddr, accept: bool) -> Result<(), TransportError>;
}

/// GAP notifications from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GapEvent {
    AdvDataSetComplete,
    SecurityRequest {
        peer: BdAddr,
    },
    AuthComplete {
        peer: BdAddr,
        success: bool,
        fail_reason: u8,
    },
}

/// Tracks the host link and restarts advertising when it drops.
#[derive(Debug, Default)]
pub struct LinkHandler {
    conn_id: Option<ConnId>,
    secure: bool,
}

impl LinkHandler {
    pub const fn new() -> Self {
        Self {
            conn_id: None,
            secure: false,
        }
    }

    pub fn conn_id(&self) -> Option<ConnId> {
        self.conn_id
    }

    /// Whether pairing completed on the current link.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Input may be sent to the host.
    pub fn is_ready(&self, mode: KeyboardMode) -> bool {
        self.secure && mode == KeyboardMode::Bluetooth
    }

    pub fn on_gap_event<T: GapLayer + ?Sized>(&mut self, stack: &mut T, event: GapEvent) {
        match event {
            GapEvent::AdvDataSetComplete => {
                info!("advertising data set, starting advertising");
                if let Err(e) = stack.start_advertising(&AdvertisingParams::hid()) {
                    error!("start advertising failed: {:?}", e);
                }
            }
            GapEvent::SecurityRequest { peer } => {
                debug!("security request from {:?}", peer);
                if let Err(e) = stack.security_response(&peer, true) {
                    error!("security response failed: {:?}", e);
                }
            }
            GapEvent::AuthComplete {
                peer,
                success,
                fail_reason,
            } => {
                if success {
                    info!("paired with {:?}", peer);
                    self.secure = true;
                } else {
                    error!("pairing with {:?} failed, reason {}", peer, fail_reason);
                }
            }
        }
    }
}

impl<T: GapLayer + ?Sized> HidEventHandler<T> for LinkHandler {
    fn on_hid_event(&mut self, stack: &mut T, event: HidEvent<'_>) {
        match event {
            HidEvent::RegFinish { status, .. } => {
                if !status.is_ok() {
                    error!("HID registration failed: {:?}", status);
                    return;
                }
                if let Err(e) = stack.set_device_name(DEVICE_NAME) {
                    error!("set device name failed: {:?}", e);
                }
                if let Err(e) = stack.configure_advertising_data(&AdvertisingData::hid()) {
                    error!("advertising data rejected: {:?}", e);
                }
            }
            HidEvent::BatteryRegistered { .. } => debug!("battery profile ready"),
            HidEvent::DeinitFinish { status } => info!("HID deinit finished: {:?}", status),
            HidEvent::Connected { conn_id, .. } => {
                self.conn_id = Some(conn_id);
            }
            HidEvent::Disconnected { .. } => {
                self.secure = false;
                self.conn_id = None;
                if let Err(e) = stack.start_advertising(&AdvertisingParams::hid()) {
                    error!("restart advertising failed: {:?}", e);
                }
            }
            HidEvent::VendorReportWritten {
                conn_id,
                report_id,
                data,
            } => {
                debug!(
                    "vendor report {} written on conn {}: {:?}",
                    report_id,
                    conn_id,
                    data
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::GattStatus;

    #[derive(Default)]
    struct Recorder {
        names: usize,
        adv_data: usize,
        adv_started: usize,
        accepted: usize,
    }

    impl GapLayer for Recorder {
        fn set_device_name(&mut self, name: &str) -> Result<(), TransportError> {
            assert_eq!(name, DEVICE_NAME);
            self.names += 1;
            Ok(())
        }

        fn configure_advertising_data(
            &mut self,
            data: &AdvertisingData,
        ) -> Result<(), TransportError> {
            assert_eq!(data.appearance, 0x03C0);
            self.adv_data += 1;
            Ok(())
        }

        fn start_advertising(&mut self, params: &AdvertisingParams) -> Result<(), TransportError> {
            assert_eq!((params.interval_min, params.interval_max), (0x20, 0x30));
            self.adv_started += 1;
            Ok(())
        }

        fn security_response(&mut self, _peer: &BdAddr, accept: bool) -> Result<(), TransportError> {
            if accept {
                self.accepted += 1;
            }
            Ok(())
        }
    }

    const PEER: BdAddr = [0xA0, 1, 2, 3, 4, 5];

    #[test]
    fn reg_finish_configures_advertising() {
        let mut gap = Recorder::default();
        let mut link = LinkHandler::new();
        link.on_hid_event(
            &mut gap,
            HidEvent::RegFinish {
                status: GattStatus::Ok,
                gatt_if: Some(3),
            },
        );
        assert_eq!((gap.names, gap.adv_data), (1, 1));

        link.on_gap_event(&mut gap, GapEvent::AdvDataSetComplete);
        assert_eq!(gap.adv_started, 1);
    }

    #[test]
    fn failed_registration_does_not_advertise() {
        let mut gap = Recorder::default();
        let mut link = LinkHandler::new();
        link.on_hid_event(
            &mut gap,
            HidEvent::RegFinish {
                status: GattStatus::Error(0x85),
                gatt_if: None,
            },
        );
        assert_eq!((gap.names, gap.adv_data), (0, 0));
    }

    #[test]
    fn ready_only_after_pairing_in_bluetooth_mode() {
        let mut gap = Recorder::default();
        let mut link = LinkHandler::new();
        link.on_hid_event(&mut gap, HidEvent::Connected { conn_id: 4, peer: PEER });
        assert_eq!(link.conn_id(), Some(4));
        assert!(!link.is_ready(KeyboardMode::Bluetooth));

        link.on_gap_event(&mut gap, GapEvent::SecurityRequest { peer: PEER });
        assert_eq!(gap.accepted, 1);

        link.on_gap_event(
            &mut gap,
            GapEvent::AuthComplete {
                peer: PEER,
                success: true,
                fail_reason: 0,
            },
        );
        assert!(link.is_ready(KeyboardMode::Bluetooth));
        assert!(!link.is_ready(KeyboardMode::Usb));
    }

    #[test]
    fn failed_pairing_stays_insecure() {
        let mut gap = Recorder::default();
        let mut link = LinkHandler::new();
        link.on_gap_event(
            &mut gap,
            GapEvent::AuthComplete {
                peer: PEER,
                success: false,
                fail_reason: 0x66,
            },
        );
        assert!(!link.is_secure());
    }

    #[test]
    fn disconnect_restarts_advertising() {
        let mut gap = Recorder::default();
        let mut link = LinkHandler::new();
        link.on_hid_event(&mut gap, HidEvent::Connected { conn_id: 1, peer: PEER });
        link.on_gap_event(
            &mut gap,
            GapEvent::AuthComplete {
                peer: PEER,
                success: true,
                fail_reason: 0,
            },
        );

        link.on_hid_event(&mut gap, HidEvent::Disconnected { peer: Some(PEER) });
        assert!(!link.is_secure());
        assert_eq!(link.conn_id(), None);
        assert_eq!(gap.adv_started, 1);
    }
}
