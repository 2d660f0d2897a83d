//! Battery monitoring.
//!
//! Once per `BATTERY_PERIOD_MS` the SAADC samples the divided battery
//! voltage. The raw count goes two ways:
//! - scaled (`power_logic::scaled_battery`) to the companion MCU as a
//!   `BATT_UPDATE` frame;
//! - as a percentage to the GATT battery level characteristic.

use bt_macropad::config::BATTERY_PERIOD_MS;
use bt_macropad::intermcu::{command, Frame};
use bt_macropad::power_logic;
use defmt::{trace, warn};
use embassy_nrf::gpio::Input;
use embassy_nrf::saadc::Saadc;
use embassy_time::{Duration, Ticker};

use crate::ble::with_device;
use crate::uart::IMCU_TX;

pub async fn battery_task(mut saadc: Saadc<'static, 1>, usb_power: Input<'static>) -> ! {
    saadc.calibrate().await;
    let mut ticker = Ticker::every(Duration::from_millis(BATTERY_PERIOD_MS));

    loop {
        ticker.next().await;

        trace!("5V present: {}", usb_power.is_high());

        let mut buf = [0i16; 1];
        saadc.sample(&mut buf).await;
        let raw = buf[0].max(0) as u16;
        trace!(
            "battery raw {} = {} V",
            raw,
            power_logic::battery_voltage(raw)
        );

        let frame = Frame::new(command::BATT_UPDATE, power_logic::scaled_battery(raw));
        if IMCU_TX.try_send(frame).is_err() {
            warn!("inter-MCU queue full, battery update dropped");
        }

        let percent = power_logic::battery_percent(raw);
        if let Some(Err(e)) = with_device(|d| d.engine.set_battery_level(percent)) {
            warn!("battery level update failed: {:?}", e);
        }
    }
}
