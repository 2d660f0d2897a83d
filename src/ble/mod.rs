//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Stack** - [`stack::SoftdeviceStack`] adapts the SoftDevice to the
//!    library's GATT/GAP traits so the HID service engine can build and
//!    serve the Battery and HID services.
//! 2. **Bonder** - pairing and bond keys, persisted through `storage`.
//! 3. **Peripheral** - advertise, accept a host, run the GATT server until
//!    the link drops.
//!
//! The engine and the link handler live together in [`DEVICE`]. Every
//! task that touches them goes through [`with_device`], and every call
//! that may make the stack queue events is followed by [`pump`].

pub mod bonder;
pub mod peripheral;
pub mod stack;

use core::cell::RefCell;
use core::mem;

use bt_macropad::config::{DEVICE_NAME, HID_MAX_APPS};
use bt_macropad::{GapEvent, LinkHandler, ServiceEngine};
use defmt::error;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::{raw, Softdevice};

use stack::SoftdeviceStack;

/// HID engine plus the application handler that receives its events.
pub struct Device {
    pub engine: ServiceEngine<SoftdeviceStack>,
    pub link: LinkHandler,
}

impl Device {
    pub fn new(stack: SoftdeviceStack) -> Self {
        Self {
            engine: ServiceEngine::new(stack),
            link: LinkHandler::new(),
        }
    }
}

pub static DEVICE: Mutex<CriticalSectionRawMutex, RefCell<Option<Device>>> =
    Mutex::new(RefCell::new(None));

/// GAP events raised from SoftDevice callbacks outside the GATT path.
pub static GAP_EVENTS: Channel<CriticalSectionRawMutex, GapEvent, 4> = Channel::new();

/// Run `f` on the device, if it has been installed.
pub fn with_device<R>(f: impl FnOnce(&mut Device) -> R) -> Option<R> {
    DEVICE.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

/// Deliver every event the stack has queued.
pub fn pump(device: &mut Device) {
    loop {
        if let Some(event) = device.engine.stack_mut().next_event() {
            if let Err(e) = device.engine.handle_event(event.as_event(), &mut device.link) {
                error!("HID engine rejected event: {:?}", e);
            }
            continue;
        }
        if let Some(event) = device.engine.stack_mut().next_gap_event() {
            device.link.on_gap_event(device.engine.stack_mut(), event);
            continue;
        }
        break;
    }
}

/// SoftDevice configuration: one peripheral link, GATT server, bonding.
pub fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: HID_MAX_APPS as u8,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: 2048,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: HID_MAX_APPS as u8,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        conn_gatts: Some(raw::ble_gatts_conn_cfg_t {
            hvn_tx_queue_size: 4,
        }),
        ..Default::default()
    }
}

pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}
