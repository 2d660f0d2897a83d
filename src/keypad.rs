//! Input tasks: key matrix, volume knob and keyboard mode.
//!
//! Input only reaches the host while the link handler reports ready
//! (paired link, Bluetooth mode). The companion MCU hears about the knob
//! regardless.

use core::cell::RefCell;

use bt_macropad::config::{ENCODER_MIN_PERIOD_MS, MATRIX_SCAN_MS, MODE_POLL_MS};
use bt_macropad::hid::keyboard::MAX_KEYS;
use bt_macropad::hid::ConsumerCmd;
use bt_macropad::input::{pressed_keys, ButtonMatrix, EdgeLatch, VolumeKnob, SWITCH_BIT};
use bt_macropad::intermcu::{command, Frame};
use bt_macropad::{Error, KeyboardMode, ModeSwitch};
use defmt::{error, info, warn};
use embassy_nrf::gpio::{Flex, Input, OutputDrive};
use embassy_nrf::peripherals::QDEC;
use embassy_nrf::qdec::Qdec;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Ticker};

use crate::ble::with_device;
use crate::uart::IMCU_TX;

pub type Matrix = ButtonMatrix<Flex<'static>, Input<'static>, Input<'static>>;

/// Requested and applied keyboard mode, shared with the UART receiver.
pub static MODE: Mutex<CriticalSectionRawMutex, RefCell<ModeSwitch>> =
    Mutex::new(RefCell::new(ModeSwitch::new()));

/// Mode the matrix task must reconfigure its columns for.
static COLUMN_MODE: Signal<CriticalSectionRawMutex, KeyboardMode> = Signal::new();

fn current_mode() -> KeyboardMode {
    MODE.lock(|m| m.borrow().current())
}

fn send_frame(frame: Frame) {
    if IMCU_TX.try_send(frame).is_err() {
        warn!("inter-MCU queue full, frame {} dropped", frame.command);
    }
}

fn configure_columns(matrix: &mut Matrix, mode: KeyboardMode) {
    for col in matrix.columns_mut().iter_mut() {
        match mode {
            KeyboardMode::Bluetooth => col.set_as_output(OutputDrive::Standard),
            // The companion MCU drives the columns in USB mode.
            KeyboardMode::Usb => col.set_as_disconnected(),
        }
    }
}

pub async fn matrix_task(mut matrix: Matrix) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(MATRIX_SCAN_MS));
    let mut last_keys = pressed_keys(0);
    let mut switch = EdgeLatch::new();

    loop {
        ticker.next().await;

        if let Some(mode) = COLUMN_MODE.try_take() {
            configure_columns(&mut matrix, mode);
            last_keys.clear();
        }
        let mode = current_mode();
        if mode != KeyboardMode::Bluetooth {
            continue;
        }

        let status = match matrix.scan() {
            Ok(status) => status,
            Err(e) => {
                error!("matrix scan failed: {:?}", e);
                continue;
            }
        };
        let keys = pressed_keys(status);
        let switch_edge = switch.update(status & SWITCH_BIT != 0);
        if let Some(pressed) = switch_edge {
            send_frame(Frame::new(command::ROT_SW_UPDATE, pressed as u8));
        }
        if keys == last_keys && switch_edge.is_none() {
            continue;
        }

        let sent = with_device(|d| -> Result<bool, Error> {
            let Some(conn_id) = d.link.conn_id().filter(|_| d.link.is_ready(mode)) else {
                return Ok(false);
            };
            if keys != last_keys {
                let n = keys.len().min(MAX_KEYS);
                d.engine.send_keyboard(conn_id, 0, &keys[..n])?;
            }
            if let Some(pressed) = switch_edge {
                d.engine.send_consumer(conn_id, ConsumerCmd::Mute, pressed)?;
            }
            Ok(true)
        });
        match sent {
            Some(Err(e)) => warn!("key report not sent: {:?}", e),
            // Not ready: keep the old key set so the change is sent once ready.
            Some(Ok(false)) | None => continue,
            Some(Ok(true)) => {}
        }
        last_keys = keys;
    }
}

pub async fn encoder_task(mut qdec: Qdec<'static, QDEC>) -> ! {
    let mut knob = VolumeKnob::new();
    let mut delay_ms = ENCODER_MIN_PERIOD_MS;

    loop {
        let delta = with_timeout(Duration::from_millis(delay_ms), qdec.read())
            .await
            .unwrap_or(0);
        let step = knob.step(delta);
        delay_ms = step.delay_ms;
        send_frame(step.message);

        if step.actions.is_empty() {
            continue;
        }
        let mode = current_mode();
        let result = with_device(|d| -> Result<(), Error> {
            let Some(conn_id) = d.link.conn_id().filter(|_| d.link.is_ready(mode)) else {
                return Ok(());
            };
            for action in &step.actions {
                d.engine.send_consumer(conn_id, action.cmd, action.pressed)?;
            }
            Ok(())
        });
        if let Some(Err(e)) = result {
            warn!("volume report not sent: {:?}", e);
        }
    }
}

pub async fn mode_task() -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(MODE_POLL_MS));
    loop {
        ticker.next().await;
        if let Some(mode) = MODE.lock(|m| m.borrow_mut().poll()) {
            info!("keyboard mode now {:?}", mode);
            COLUMN_MODE.signal(mode);
        }
    }
}
