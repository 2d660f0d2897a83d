//! Report registry: which attribute carries which report.

use heapless::Vec;

use crate::config::HID_NUM_REPORTS;
use crate::error::Error;
use crate::gatt::{Handle, HidIdx};
use crate::hid::{report_id, ProtocolMode, ReportType};

/// One report and the attributes behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportEntry {
    pub id: u8,
    pub report_type: ReportType,
    pub mode: ProtocolMode,
    /// Value handle notifications are sent on.
    pub handle: Handle,
    /// Client characteristic configuration handle, 0 if the report has none.
    pub cccd_handle: Handle,
}

impl ReportEntry {
    pub const fn new(
        id: u8,
        report_type: ReportType,
        mode: ProtocolMode,
        handle: Handle,
        cccd_handle: Handle,
    ) -> Self {
        Self {
            id,
            report_type,
            mode,
            handle,
            cccd_handle,
        }
    }

    fn key(&self) -> (u8, ReportType, ProtocolMode) {
        (self.id, self.report_type, self.mode)
    }
}

/// Derive the report entries from an installed HID handle table.
pub fn hid_report_entries(att: &[Handle; HidIdx::COUNT]) -> [ReportEntry; HID_NUM_REPORTS] {
    use ProtocolMode::{Boot, Report};
    use ReportType::{Feature, Input, Output};

    let h = |idx: HidIdx| att[idx as usize];

    [
        ReportEntry::new(report_id::MOUSE_IN, Input, Report, h(HidIdx::MouseInVal), h(HidIdx::MouseInCcc)),
        ReportEntry::new(report_id::KEY_IN, Input, Report, h(HidIdx::KeyInVal), h(HidIdx::KeyInCcc)),
        ReportEntry::new(report_id::CC_IN, Input, Report, h(HidIdx::CcInVal), h(HidIdx::CcInCcc)),
        ReportEntry::new(report_id::LED_OUT, Output, Report, h(HidIdx::LedOutVal), 0),
        ReportEntry::new(
            report_id::KEY_IN,
            Input,
            Boot,
            h(HidIdx::BootKbInVal),
            h(HidIdx::BootKbInNtfCfg),
        ),
        ReportEntry::new(report_id::LED_OUT, Output, Boot, h(HidIdx::BootKbOutVal), 0),
        ReportEntry::new(
            report_id::MOUSE_IN,
            Input,
            Boot,
            h(HidIdx::BootMouseInVal),
            h(HidIdx::BootMouseInNtfCfg),
        ),
        ReportEntry::new(report_id::FEATURE, Feature, Report, h(HidIdx::ReportVal), 0),
    ]
}

/// Fixed-capacity table of report entries.
#[derive(Debug, Default)]
pub struct ReportRegistry {
    entries: Vec<ReportEntry, HID_NUM_REPORTS>,
}

impl ReportRegistry {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Replace the whole table. On error the previous table is kept.
    pub fn register(&mut self, entries: &[ReportEntry]) -> Result<(), Error> {
        let mut table: Vec<ReportEntry, HID_NUM_REPORTS> = Vec::new();
        for entry in entries {
            if table.iter().any(|e| e.key() == entry.key()) {
                error!(
                    "duplicate report id {} type {:?} mode {:?}",
                    entry.id,
                    entry.report_type,
                    entry.mode
                );
                return Err(Error::DuplicateReport {
                    id: entry.id,
                    report_type: entry.report_type,
                    mode: entry.mode,
                });
            }
            table.push(*entry).map_err(|_| Error::ReportTableFull)?;
        }

        debug!("registered {} reports", table.len());
        self.entries = table;
        Ok(())
    }

    /// Find the entry for `(id, report_type)` under protocol `mode`.
    pub fn lookup(&self, id: u8, report_type: ReportType, mode: ProtocolMode) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id && e.report_type == report_type && e.mode == mode)
    }

    /// Output or feature report whose value lives at `handle`.
    pub fn find_writable(&self, handle: Handle) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| {
            e.handle == handle && matches!(e.report_type, ReportType::Output | ReportType::Feature)
        })
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles() -> [Handle; HidIdx::COUNT] {
        core::array::from_fn(|i| 100 + i as Handle)
    }

    fn registry() -> ReportRegistry {
        let mut reg = ReportRegistry::new();
        reg.register(&hid_report_entries(&handles())).unwrap();
        reg
    }

    #[test]
    fn eight_entries_registered() {
        assert_eq!(registry().len(), HID_NUM_REPORTS);
    }

    #[test]
    fn input_reports_point_at_their_own_ccc() {
        let att = handles();
        let reg = registry();

        let mouse = reg.lookup(1, ReportType::Input, ProtocolMode::Report).unwrap();
        assert_eq!(mouse.handle, att[HidIdx::MouseInVal as usize]);
        assert_eq!(mouse.cccd_handle, att[HidIdx::MouseInCcc as usize]);

        let key = reg.lookup(2, ReportType::Input, ProtocolMode::Report).unwrap();
        assert_eq!(key.cccd_handle, att[HidIdx::KeyInCcc as usize]);

        let cc = reg.lookup(3, ReportType::Input, ProtocolMode::Report).unwrap();
        assert_eq!(cc.handle, att[HidIdx::CcInVal as usize]);
        assert_eq!(cc.cccd_handle, att[HidIdx::CcInCcc as usize]);
    }

    #[test]
    fn boot_reports_only_under_boot_mode() {
        let att = handles();
        let reg = registry();

        let boot_kb = reg.lookup(2, ReportType::Input, ProtocolMode::Boot).unwrap();
        assert_eq!(boot_kb.handle, att[HidIdx::BootKbInVal as usize]);
        assert_eq!(boot_kb.cccd_handle, att[HidIdx::BootKbInNtfCfg as usize]);

        let boot_mouse = reg.lookup(1, ReportType::Input, ProtocolMode::Boot).unwrap();
        assert_eq!(boot_mouse.handle, att[HidIdx::BootMouseInVal as usize]);

        assert!(reg.lookup(3, ReportType::Input, ProtocolMode::Boot).is_none());
    }

    #[test]
    fn output_and_feature_have_no_ccc() {
        let reg = registry();
        for (id, ty, mode) in [
            (0, ReportType::Output, ProtocolMode::Report),
            (0, ReportType::Output, ProtocolMode::Boot),
            (0, ReportType::Feature, ProtocolMode::Report),
        ] {
            assert_eq!(reg.lookup(id, ty, mode).unwrap().cccd_handle, 0);
        }
    }

    #[test]
    fn unknown_report_not_found() {
        let reg = registry();
        assert!(reg.lookup(4, ReportType::Output, ProtocolMode::Report).is_none());
        assert!(ReportRegistry::new()
            .lookup(2, ReportType::Input, ProtocolMode::Report)
            .is_none());
    }

    #[test]
    fn duplicate_key_rejected_and_table_kept() {
        let mut reg = registry();
        let dup = [
            ReportEntry::new(2, ReportType::Input, ProtocolMode::Report, 1, 2),
            ReportEntry::new(2, ReportType::Input, ProtocolMode::Report, 3, 4),
        ];
        assert_eq!(
            reg.register(&dup),
            Err(Error::DuplicateReport {
                id: 2,
                report_type: ReportType::Input,
                mode: ProtocolMode::Report,
            })
        );
        assert_eq!(reg.len(), HID_NUM_REPORTS);
    }

    #[test]
    fn register_replaces_previous_table() {
        let mut reg = registry();
        reg.register(&[ReportEntry::new(9, ReportType::Input, ProtocolMode::Report, 1, 2)])
            .unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.lookup(2, ReportType::Input, ProtocolMode::Report).is_none());
    }

    #[test]
    fn too_many_entries_rejected() {
        let mut reg = ReportRegistry::new();
        let entries: [ReportEntry; HID_NUM_REPORTS + 1] = core::array::from_fn(|i| {
            ReportEntry::new(i as u8 + 10, ReportType::Input, ProtocolMode::Report, 1, 0)
        });
        assert_eq!(reg.register(&entries), Err(Error::ReportTableFull));
        assert!(reg.is_empty());
    }
}
