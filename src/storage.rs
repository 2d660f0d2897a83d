//! Persistent storage for bonded hosts.
//!
//! Uses the nRF52840's internal flash via `sequential-storage` crate
//! to keep the bond table so a paired host can reconnect after a power
//! cycle without pairing again.
//!
//! Storage layout:
//!   - One map item under `KEY_BONDS` holding the serialized `BondTable`
//!     (`[count][record]...`, see `bt_macropad::bond`).
//!   - The flash pages are managed by `sequential-storage` which handles
//!     wear levelling and GC.

use bt_macropad::bond::{BondTable, TABLE_SIZE};
use bt_macropad::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use defmt::{debug, error, info};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_storage_async::nor_flash::NorFlash;

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key for the bond table in the map storage. Changes with the record
/// layout, so a table in an older layout reads as missing.
const KEY_BONDS: u8 = 0x02;

/// Item buffer: the table plus the map's key and header.
const ITEM_BUF_SIZE: usize = TABLE_SIZE + 32;

/// Latest bond table to persist. Only the newest snapshot matters.
pub static BOND_SAVE: Signal<CriticalSectionRawMutex, BondTable> = Signal::new();

/// Load the bond table from flash. A missing or unreadable item leaves
/// the table empty.
pub async fn load_bonds(flash: &mut impl NorFlash, table: &mut BondTable) {
    let mut buf = [0u8; ITEM_BUF_SIZE];

    match sequential_storage::map::fetch_item::<u8, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut sequential_storage::cache::NoCache::new(),
        &mut buf,
        &KEY_BONDS,
    )
    .await
    {
        Ok(Some(data)) => {
            table.load(data);
            info!("Loaded {} bonds from flash", table.len());
        }
        Ok(None) => {
            info!("No bonds in flash");
            table.clear();
        }
        Err(e) => {
            error!("Flash read error: {:?}", defmt::Debug2Format(&e));
            table.clear();
        }
    }
    table.mark_clean();
}

/// Persist the bond table if it changed since it was loaded.
pub async fn save_bonds(flash: &mut impl NorFlash, table: &mut BondTable) {
    if !table.is_dirty() {
        debug!("bond table unchanged, nothing to save");
        return;
    }

    let mut buf = [0u8; ITEM_BUF_SIZE];
    let mut data_buf = [0u8; TABLE_SIZE];
    let len = match table.serialize(&mut data_buf) {
        Ok(len) => len,
        Err(e) => {
            error!("bond table serialization failed: {:?}", e);
            return;
        }
    };
    let item = &data_buf[..len];

    match sequential_storage::map::store_item::<u8, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut sequential_storage::cache::NoCache::new(),
        &mut buf,
        &KEY_BONDS,
        &item,
    )
    .await
    {
        Ok(_) => {
            info!("Saved {} bonds to flash", table.len());
            table.mark_clean();
        }
        Err(e) => {
            error!("Flash write error: {:?}", defmt::Debug2Format(&e));
        }
    }
}

/// Storage task body: write every bond table the bonder publishes.
pub async fn run(mut flash: impl NorFlash) -> ! {
    loop {
        let mut table = BOND_SAVE.wait().await;
        save_bonds(&mut flash, &mut table).await;
    }
}
