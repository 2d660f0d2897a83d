//! bt-macropad firmware: nRF52840 + S140 SoftDevice.
//!
//! Tasks:
//! - SoftDevice runner
//! - BLE: advertise, accept a host, serve the HID and Battery services
//! - key matrix scan, volume knob (QDEC), keyboard mode switch
//! - battery sampling (SAADC)
//! - inter-MCU UART receive and transmit
//! - bond storage

#![no_std]
#![no_main]

mod ble;
mod keypad;
mod power;
mod storage;
mod uart;

use bt_macropad::bond::BondTable;
use bt_macropad::input::ButtonMatrix;
use defmt::{error, info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Flex, Input, OutputDrive, Pull};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::{QDEC, SAADC, UARTE0};
use embassy_nrf::qdec::{self, Qdec};
use embassy_nrf::saadc::{self, Saadc};
use embassy_nrf::uarte::{self, Uarte, UarteRx, UarteTx};
use embassy_nrf::bind_interrupts;
use nrf_softdevice::{Flash, Softdevice};
use {defmt_rtt as _, panic_probe as _};

use ble::bonder::bonder;
use ble::stack::SoftdeviceStack;
use ble::{pump, Device, DEVICE};
use keypad::Matrix;

bind_interrupts!(struct Irqs {
    QDEC => qdec::InterruptHandler<QDEC>;
    SAADC => saadc::InterruptHandler;
    UARTE0_UART0 => uarte::InterruptHandler<UARTE0>;
});

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    info!("SD is running");
    ble::softdevice_task(sd).await
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, bonds: BondTable) -> ! {
    ble::peripheral::run(sd, bonder(bonds)).await
}

#[embassy_executor::task]
async fn storage_task(flash: Flash) -> ! {
    storage::run(flash).await
}

#[embassy_executor::task]
async fn matrix_task(matrix: Matrix) -> ! {
    keypad::matrix_task(matrix).await
}

#[embassy_executor::task]
async fn encoder_task(qdec: Qdec<'static, QDEC>) -> ! {
    keypad::encoder_task(qdec).await
}

#[embassy_executor::task]
async fn mode_task() -> ! {
    keypad::mode_task().await
}

#[embassy_executor::task]
async fn battery_task(saadc: Saadc<'static, 1>, usb_power: Input<'static>) -> ! {
    power::battery_task(saadc, usb_power).await
}

#[embassy_executor::task]
async fn uart_rx_task(rx: UarteRx<'static, UARTE0>) -> ! {
    uart::rx_task(rx).await
}

#[embassy_executor::task]
async fn uart_tx_task(tx: UarteTx<'static, UARTE0>) -> ! {
    uart::tx_task(tx).await
}

fn column(mut pin: Flex<'static>) -> Flex<'static> {
    pin.set_as_output(OutputDrive::Standard);
    pin
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // Priorities 0, 1 and 4 belong to the SoftDevice.
    let mut conf = embassy_nrf::config::Config::default();
    conf.gpiote_interrupt_priority = Priority::P2;
    conf.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(conf);

    interrupt::QDEC.set_priority(Priority::P3);
    interrupt::SAADC.set_priority(Priority::P3);
    interrupt::UARTE0_UART0.set_priority(Priority::P3);

    let sd = Softdevice::enable(&ble::softdevice_config());
    // Shared reference for the runner and flash; `sd` stays with the
    // stack, which needs it mutably to build services.
    let sdv = unsafe { Softdevice::steal() };
    unwrap!(spawner.spawn(softdevice_task(sdv)));

    let mut flash = Flash::take(sdv);
    let mut bonds = BondTable::new();
    storage::load_bonds(&mut flash, &mut bonds).await;

    let mut device = Device::new(SoftdeviceStack::new(sd));
    device.engine.init();
    if let Err(e) = device.engine.register_profiles() {
        error!("HID profile registration failed: {:?}", e);
    }
    pump(&mut device);
    DEVICE.lock(|cell| cell.replace(Some(device)));

    unwrap!(spawner.spawn(ble_task(sdv, bonds)));
    unwrap!(spawner.spawn(storage_task(flash)));

    // Input
    let matrix = ButtonMatrix::new(
        [
            column(Flex::new(p.P0_11)),
            column(Flex::new(p.P0_12)),
            column(Flex::new(p.P0_13)),
        ],
        [
            Input::new(p.P0_14, Pull::Down),
            Input::new(p.P0_15, Pull::Down),
            Input::new(p.P0_16, Pull::Down),
        ],
        Input::new(p.P0_26, Pull::Down),
    );
    unwrap!(spawner.spawn(matrix_task(matrix)));
    unwrap!(spawner.spawn(mode_task()));

    let qdec = Qdec::new(p.QDEC, Irqs, p.P0_04, p.P0_05, qdec::Config::default());
    unwrap!(spawner.spawn(encoder_task(qdec)));

    // Battery
    let channel = saadc::ChannelConfig::single_ended(p.P0_02);
    let adc = Saadc::new(p.SAADC, Irqs, saadc::Config::default(), [channel]);
    let usb_power = Input::new(p.P1_13, Pull::None);
    unwrap!(spawner.spawn(battery_task(adc, usb_power)));

    // Companion MCU
    let mut uart_config = uarte::Config::default();
    uart_config.parity = uarte::Parity::EXCLUDED;
    uart_config.baudrate = uart::baudrate();
    let uart = Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_06, uart_config);
    let (tx, rx) = uart.split();
    unwrap!(spawner.spawn(uart_rx_task(rx)));
    unwrap!(spawner.spawn(uart_tx_task(tx)));

    info!("bt-macropad running");
}
