//! UART link to the companion (USB) microcontroller.
//!
//! Frames are `[0x2B, 0x2B, command, data, 0x00]` at 38400 baud 8N1, see
//! `bt_macropad::intermcu`. Any task may queue an outgoing frame on
//! [`IMCU_TX`]; the TX task writes them in order.

use bt_macropad::config::{IMCU_BAUD, IMCU_TX_QUEUE};
use bt_macropad::intermcu::{handle_command, Frame, FrameDecoder};
use defmt::{debug, warn};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::uarte::{Baudrate, UarteRx, UarteTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::keypad::MODE;

/// UARTE setting for `IMCU_BAUD`.
pub const fn baudrate() -> Baudrate {
    match IMCU_BAUD {
        9_600 => Baudrate::BAUD9600,
        19_200 => Baudrate::BAUD19200,
        57_600 => Baudrate::BAUD57600,
        115_200 => Baudrate::BAUD115200,
        _ => Baudrate::BAUD38400,
    }
}

pub static IMCU_TX: Channel<CriticalSectionRawMutex, Frame, IMCU_TX_QUEUE> = Channel::new();

pub async fn rx_task(mut rx: UarteRx<'static, UARTE0>) -> ! {
    let mut decoder = FrameDecoder::new();
    let mut byte = [0u8; 1];

    loop {
        if let Err(e) = rx.read(&mut byte).await {
            warn!("inter-MCU rx error: {:?}", e);
            decoder.reset();
            continue;
        }
        let Some(frame) = decoder.push(byte[0]) else {
            continue;
        };
        debug!("inter-MCU frame {:?}", frame);
        let reply = MODE.lock(|m| handle_command(frame, &mut m.borrow_mut()));
        if let Some(reply) = reply {
            IMCU_TX.send(reply).await;
        }
    }
}

pub async fn tx_task(mut tx: UarteTx<'static, UARTE0>) -> ! {
    loop {
        let frame = IMCU_TX.receive().await;
        if let Err(e) = tx.write(&frame.encode()).await {
            warn!("inter-MCU tx error: {:?}", e);
        }
    }
}
