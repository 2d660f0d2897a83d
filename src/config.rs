//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// BLE / GAP

/// Name advertised to hosts and exposed through the GAP device name.
pub const DEVICE_NAME: &str = "BT HID Macropad";

/// GAP appearance: generic HID.
pub const APPEARANCE_GENERIC_HID: u16 = 0x03C0;

/// Advertising interval range (in 0.625 ms units). 0x20..0x30 = 20..30 ms.
pub const ADV_INTERVAL_MIN: u16 = 0x20;
pub const ADV_INTERVAL_MAX: u16 = 0x30;

/// Preferred connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms, 16 = 20 ms.
pub const CONN_INTERVAL_MIN: u16 = 0x06;
pub const CONN_INTERVAL_MAX: u16 = 0x10;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const SUP_TIMEOUT: u16 = 400;

/// Advertising flags: LE general discoverable, BR/EDR not supported.
pub const ADV_FLAGS: u8 = 0x06;

// HID

/// Maximum simultaneous host links (one HID host at a time).
pub const HID_MAX_APPS: usize = 1;

/// Number of report mappings installed after the HID table is created.
pub const HID_NUM_REPORTS: usize = 8;

// Inter-MCU UART

/// Baud rate of the link to the companion (USB) microcontroller.
pub const IMCU_BAUD: u32 = 38_400;

/// Depth of the outgoing inter-MCU frame queue.
pub const IMCU_TX_QUEUE: usize = 8;

// Input scanning
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Column 0..2     → P0.11, P0.12, P0.13
//   Row 0..2        → P0.14, P0.15, P0.16 (pull-down)
//   Encoder A / B   → P0.04, P0.05
//   Encoder switch  → P0.26
//   Battery sense   → P0.02 / AIN0
//   5 V detect      → P1.13
//   UART TX / RX    → P0.06 / P0.08

/// Key matrix scan period (ms).
pub const MATRIX_SCAN_MS: u64 = 10;

/// Lower bound of the encoder poll period (ms).
pub const ENCODER_MIN_PERIOD_MS: u64 = 10;

/// Keyboard-mode switch poll period (ms).
pub const MODE_POLL_MS: u64 = 10;

/// Battery sampling period (ms).
pub const BATTERY_PERIOD_MS: u64 = 1_000;

// Bond storage

/// Maximum number of bonded hosts kept in flash.
pub const MAX_BONDS: usize = 4;

/// Flash page index where bond storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 252;

/// Number of flash pages reserved for bond storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
