//! Advertise, accept one host, serve GATT until it leaves.

use bt_macropad::config::{CONN_INTERVAL_MAX, CONN_INTERVAL_MIN, SLAVE_LATENCY, SUP_TIMEOUT};
use defmt::{error, info};
use embassy_futures::select::{select, Either};
use embassy_time::Timer;
use nrf_softdevice::ble::gatt_server::{self, WriteOp};
use nrf_softdevice::ble::security::SecurityHandler;
use nrf_softdevice::ble::{peripheral, Connection};
use nrf_softdevice::{raw, Softdevice};

use super::bonder::Bonder;
use super::stack::AdvRequest;
use super::{pump, with_device, GAP_EVENTS};

/// Delay before re-checking for an advertising request or retrying a
/// failed advertisement.
const ADV_RETRY_MS: u64 = 200;

/// GATT server glue: peer writes go straight to the engine.
struct HidServer;

impl gatt_server::Server for HidServer {
    type Event = ();

    fn on_write(
        &self,
        conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        let conn_id = conn.handle()?;
        with_device(|d| {
            d.engine.stack_mut().on_write(conn_id, handle, data);
            pump(d);
        });
        None
    }
}

async fn forward_gap_events() {
    loop {
        let event = GAP_EVENTS.receive().await;
        with_device(|d| {
            d.link.on_gap_event(d.engine.stack_mut(), event);
            pump(d);
        });
    }
}

fn request_conn_params(conn: &Connection) {
    let params = raw::ble_gap_conn_params_t {
        min_conn_interval: CONN_INTERVAL_MIN,
        max_conn_interval: CONN_INTERVAL_MAX,
        slave_latency: SLAVE_LATENCY,
        conn_sup_timeout: SUP_TIMEOUT,
    };
    if let Err(e) = conn.set_conn_params(params) {
        error!("set_conn_params error - {:?}", e);
    }
}

async fn serve(conn: Connection, bonder: &'static Bonder) {
    info!("host connected");
    bonder.load_sys_attrs(&conn);
    request_conn_params(&conn);
    with_device(|d| {
        d.engine.stack_mut().attach(conn.clone());
        pump(d);
    });

    let server = HidServer;
    match select(gatt_server::run(&conn, &server, |_| {}), forward_gap_events()).await {
        Either::First(e) => info!("gatt_server run exited: {:?}", e),
        Either::Second(()) => {}
    }

    with_device(|d| {
        d.engine.stack_mut().detach();
        pump(d);
    });
}

/// BLE task body. Advertising starts whenever the link handler asks the
/// stack for it.
pub async fn run(sd: &'static Softdevice, bonder: &'static Bonder) -> ! {
    let mut pending: Option<AdvRequest> = None;
    loop {
        if let Some(request) = with_device(|d| d.engine.stack_mut().take_adv_request()).flatten() {
            pending = Some(request);
        }
        let Some(request) = pending.take() else {
            Timer::after_millis(ADV_RETRY_MS).await;
            continue;
        };

        let config = peripheral::Config {
            interval: request.interval,
            ..Default::default()
        };
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &request.adv_data,
            scan_data: &request.scan_data,
        };
        info!("BLE advertising");
        match peripheral::advertise_pairable(sd, adv, &config, bonder).await {
            Ok(conn) => serve(conn, bonder).await,
            Err(e) => {
                error!("Advertise error: {}", e);
                pending = Some(request);
                Timer::after_millis(ADV_RETRY_MS).await;
            }
        }
    }
}
