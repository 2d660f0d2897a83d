//! Attribute tables for the Battery and HID services.
//!
//! The stack assigns handles positionally, so each table is produced by
//! mapping its index enum through a declaration function. Index `i` of
//! the returned array is always the declaration for the enum variant with
//! discriminant `i`, and the handle array the stack returns is parallel
//! to it.

use super::{props, uuid, AttributeDecl, Handle, Permissions};
use crate::hid::descriptor::REPORT_MAP;
use crate::hid::{report_id, ProtocolMode, ReportType};

/// Positions in the Battery service table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum BatteryIdx {
    Svc,
    LevelChar,
    LevelVal,
    LevelCcc,
    LevelPresFmt,
}

impl BatteryIdx {
    pub const ALL: [BatteryIdx; 5] = [
        BatteryIdx::Svc,
        BatteryIdx::LevelChar,
        BatteryIdx::LevelVal,
        BatteryIdx::LevelCcc,
        BatteryIdx::LevelPresFmt,
    ];

    /// Number of attributes in the Battery service.
    pub const COUNT: usize = BatteryIdx::LevelPresFmt as usize + 1;
}

/// Positions in the HID service table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum HidIdx {
    Svc,
    InclSvc,

    HidInfoChar,
    HidInfoVal,

    CtnlPtChar,
    CtnlPtVal,

    ReportMapChar,
    ReportMapVal,
    ReportMapExtRepRef,

    ProtoModeChar,
    ProtoModeVal,

    MouseInChar,
    MouseInVal,
    MouseInCcc,
    MouseInRepRef,

    KeyInChar,
    KeyInVal,
    KeyInCcc,
    KeyInRepRef,

    LedOutChar,
    LedOutVal,
    LedOutRepRef,

    CcInChar,
    CcInVal,
    CcInCcc,
    CcInRepRef,

    BootKbInChar,
    BootKbInVal,
    BootKbInNtfCfg,

    BootKbOutChar,
    BootKbOutVal,

    BootMouseInChar,
    BootMouseInVal,
    BootMouseInNtfCfg,

    ReportChar,
    ReportVal,
    ReportRepRef,
}

impl HidIdx {
    pub const ALL: [HidIdx; 37] = [
        HidIdx::Svc,
        HidIdx::InclSvc,
        HidIdx::HidInfoChar,
        HidIdx::HidInfoVal,
        HidIdx::CtnlPtChar,
        HidIdx::CtnlPtVal,
        HidIdx::ReportMapChar,
        HidIdx::ReportMapVal,
        HidIdx::ReportMapExtRepRef,
        HidIdx::ProtoModeChar,
        HidIdx::ProtoModeVal,
        HidIdx::MouseInChar,
        HidIdx::MouseInVal,
        HidIdx::MouseInCcc,
        HidIdx::MouseInRepRef,
        HidIdx::KeyInChar,
        HidIdx::KeyInVal,
        HidIdx::KeyInCcc,
        HidIdx::KeyInRepRef,
        HidIdx::LedOutChar,
        HidIdx::LedOutVal,
        HidIdx::LedOutRepRef,
        HidIdx::CcInChar,
        HidIdx::CcInVal,
        HidIdx::CcInCcc,
        HidIdx::CcInRepRef,
        HidIdx::BootKbInChar,
        HidIdx::BootKbInVal,
        HidIdx::BootKbInNtfCfg,
        HidIdx::BootKbOutChar,
        HidIdx::BootKbOutVal,
        HidIdx::BootMouseInChar,
        HidIdx::BootMouseInVal,
        HidIdx::BootMouseInNtfCfg,
        HidIdx::ReportChar,
        HidIdx::ReportVal,
        HidIdx::ReportRepRef,
    ];

    /// Number of attributes in the HID service.
    pub const COUNT: usize = HidIdx::ReportRepRef as usize + 1;
}

const _: () = {
    assert!(BatteryIdx::ALL.len() == BatteryIdx::COUNT);
    let mut i = 0;
    while i < BatteryIdx::COUNT {
        assert!(BatteryIdx::ALL[i] as usize == i);
        i += 1;
    }

    assert!(HidIdx::ALL.len() == HidIdx::COUNT);
    let mut i = 0;
    while i < HidIdx::COUNT {
        assert!(HidIdx::ALL[i] as usize == i);
        i += 1;
    }
};

// Maximum attribute lengths
pub const REPORT_MAX_LEN: u16 = 255;
pub const REPORT_MAP_MAX_LEN: u16 = 512;
pub const BOOT_REPORT_MAX_LEN: u16 = 8;

/// HID information: bcdHID 1.11, country code 0, remote wake.
pub const HID_INFORMATION: [u8; 4] = [0x11, 0x01, 0x00, HID_FLAGS_REMOTE_WAKE];
pub const HID_FLAGS_REMOTE_WAKE: u8 = 0x01;
pub const HID_FLAGS_NORMALLY_CONNECTABLE: u8 = 0x02;

/// Default battery level reported before the first ADC sample.
pub const BATTERY_LEVEL_DEFAULT: u8 = 50;

// Presentation format: uint8, exponent 0, unit percentage, SIG namespace,
// no description.
const BATTERY_PRES_FMT: [u8; 7] = {
    let unit = uuid::UNIT_PERCENTAGE.to_le_bytes();
    [0x04, 0x00, unit[0], unit[1], 0x01, 0x00, 0x00]
};

const SERVICE_HID: [u8; 2] = uuid::HID_SERVICE.to_le_bytes();
const SERVICE_BATTERY: [u8; 2] = uuid::BATTERY_SERVICE.to_le_bytes();
const EXT_REPORT_REF: [u8; 2] = uuid::BATTERY_LEVEL.to_le_bytes();
const CCC_DEFAULT: [u8; 2] = [0x00, 0x00];
const BATTERY_LEVEL_INIT: [u8; 1] = [BATTERY_LEVEL_DEFAULT];
const PROTOCOL_MODE_INIT: [u8; 1] = [ProtocolMode::Report as u8];

const PROP_READ: [u8; 1] = [props::READ];
const PROP_WRITE_NR: [u8; 1] = [props::WRITE_NO_RSP];
const PROP_READ_WRITE: [u8; 1] = [props::READ | props::WRITE];
const PROP_READ_NOTIFY: [u8; 1] = [props::READ | props::NOTIFY];

const REF_MOUSE_IN: [u8; 2] = report_reference(report_id::MOUSE_IN, ReportType::Input);
const REF_KEY_IN: [u8; 2] = report_reference(report_id::KEY_IN, ReportType::Input);
const REF_LED_OUT: [u8; 2] = report_reference(report_id::LED_OUT, ReportType::Output);
const REF_CC_IN: [u8; 2] = report_reference(report_id::CC_IN, ReportType::Input);
const REF_FEATURE: [u8; 2] = report_reference(report_id::FEATURE, ReportType::Feature);

/// Value of a report reference descriptor: `[report id, report type]`.
pub const fn report_reference(id: u8, report_type: ReportType) -> [u8; 2] {
    [id, report_type as u8]
}

const READ: Permissions = Permissions::READ;
const READ_WRITE: Permissions = Permissions::READ.union(Permissions::WRITE);

/// Handle range of a service referenced through an include declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IncludedService {
    pub start: Handle,
    pub end: Handle,
    pub uuid: u16,
}

impl IncludedService {
    /// Include record covering a whole battery table starting at `start`.
    pub const fn battery(start: Handle) -> Self {
        Self {
            start,
            end: start + (BatteryIdx::COUNT as Handle - 1),
            uuid: uuid::BATTERY_SERVICE,
        }
    }

    /// Include declaration value: start handle, end handle, service UUID (LE).
    pub const fn encode(&self) -> [u8; 6] {
        let s = self.start.to_le_bytes();
        let e = self.end.to_le_bytes();
        let u = self.uuid.to_le_bytes();
        [s[0], s[1], e[0], e[1], u[0], u[1]]
    }
}

fn battery_decl(idx: BatteryIdx) -> AttributeDecl<'static> {
    match idx {
        BatteryIdx::Svc => AttributeDecl::new(uuid::PRIMARY_SERVICE, READ, 2, &SERVICE_BATTERY),
        BatteryIdx::LevelChar => AttributeDecl::characteristic(&PROP_READ_NOTIFY),
        BatteryIdx::LevelVal => AttributeDecl::new(uuid::BATTERY_LEVEL, READ, 1, &BATTERY_LEVEL_INIT),
        BatteryIdx::LevelCcc => AttributeDecl::new(
            uuid::CLIENT_CHARACTERISTIC_CONFIGURATION,
            READ_WRITE,
            2,
            &CCC_DEFAULT,
        ),
        BatteryIdx::LevelPresFmt => {
            AttributeDecl::new(uuid::PRESENTATION_FORMAT, READ, 7, &BATTERY_PRES_FMT)
        }
    }
}

fn hid_decl(idx: HidIdx, include: &[u8; 6]) -> AttributeDecl<'_> {
    use HidIdx::*;

    let ccc = |perm| AttributeDecl::new(uuid::CLIENT_CHARACTERISTIC_CONFIGURATION, perm, 2, &[]);
    let rep_ref = |value: &'static [u8; 2]| AttributeDecl::new(uuid::REPORT_REFERENCE, READ, 2, value);

    match idx {
        Svc => AttributeDecl::new(
            uuid::PRIMARY_SERVICE,
            Permissions::READ_ENCRYPTED,
            2,
            &SERVICE_HID,
        ),
        InclSvc => AttributeDecl::new(uuid::INCLUDE, READ, 6, include),

        HidInfoChar => AttributeDecl::characteristic(&PROP_READ),
        HidInfoVal => AttributeDecl::new(uuid::HID_INFORMATION, READ, 4, &HID_INFORMATION),

        CtnlPtChar => AttributeDecl::characteristic(&PROP_WRITE_NR),
        CtnlPtVal => AttributeDecl::new(uuid::HID_CONTROL_POINT, Permissions::WRITE, 1, &[]),

        ReportMapChar => AttributeDecl::characteristic(&PROP_READ),
        ReportMapVal => AttributeDecl::new(uuid::REPORT_MAP, READ, REPORT_MAP_MAX_LEN, REPORT_MAP),
        ReportMapExtRepRef => {
            AttributeDecl::new(uuid::EXTERNAL_REPORT_REFERENCE, READ, 2, &EXT_REPORT_REF)
        }

        ProtoModeChar => AttributeDecl::characteristic(&PROP_READ_WRITE),
        ProtoModeVal => AttributeDecl::new(uuid::PROTOCOL_MODE, READ_WRITE, 1, &PROTOCOL_MODE_INIT),

        MouseInChar => AttributeDecl::characteristic(&PROP_READ_NOTIFY),
        MouseInVal => AttributeDecl::new(uuid::REPORT, READ, REPORT_MAX_LEN, &[]),
        MouseInCcc => ccc(READ_WRITE),
        MouseInRepRef => rep_ref(&REF_MOUSE_IN),

        KeyInChar => AttributeDecl::characteristic(&PROP_READ_NOTIFY),
        KeyInVal => AttributeDecl::new(uuid::REPORT, READ, REPORT_MAX_LEN, &[]),
        KeyInCcc => ccc(READ_WRITE),
        KeyInRepRef => rep_ref(&REF_KEY_IN),

        LedOutChar => AttributeDecl::characteristic(&PROP_READ_WRITE),
        LedOutVal => AttributeDecl::new(uuid::REPORT, READ_WRITE, REPORT_MAX_LEN, &[]),
        LedOutRepRef => rep_ref(&REF_LED_OUT),

        CcInChar => AttributeDecl::characteristic(&PROP_READ_NOTIFY),
        CcInVal => AttributeDecl::new(uuid::REPORT, READ, REPORT_MAX_LEN, &[]),
        CcInCcc => ccc(READ | Permissions::WRITE_ENCRYPTED),
        CcInRepRef => rep_ref(&REF_CC_IN),

        BootKbInChar => AttributeDecl::characteristic(&PROP_READ_NOTIFY),
        BootKbInVal => {
            AttributeDecl::new(uuid::BOOT_KEYBOARD_INPUT, READ, BOOT_REPORT_MAX_LEN, &[])
        }
        BootKbInNtfCfg => ccc(READ_WRITE),

        BootKbOutChar => AttributeDecl::characteristic(&PROP_READ_WRITE),
        BootKbOutVal => AttributeDecl::new(
            uuid::BOOT_KEYBOARD_OUTPUT,
            READ_WRITE,
            BOOT_REPORT_MAX_LEN,
            &[],
        ),

        BootMouseInChar => AttributeDecl::characteristic(&PROP_READ_NOTIFY),
        BootMouseInVal => {
            AttributeDecl::new(uuid::BOOT_MOUSE_INPUT, READ, BOOT_REPORT_MAX_LEN, &[])
        }
        BootMouseInNtfCfg => ccc(READ_WRITE),

        ReportChar => AttributeDecl::characteristic(&PROP_READ_WRITE),
        ReportVal => AttributeDecl::new(uuid::REPORT, READ, REPORT_MAX_LEN, &[]),
        ReportRepRef => rep_ref(&REF_FEATURE),
    }
}

/// Battery service declarations, in [`BatteryIdx`] order.
pub fn battery_table() -> [AttributeDecl<'static>; BatteryIdx::COUNT] {
    BatteryIdx::ALL.map(battery_decl)
}

/// HID service declarations, in [`HidIdx`] order.
///
/// `include` is the encoded include declaration pointing at the battery
/// service (see [`IncludedService::encode`]).
pub fn hid_table(include: &[u8; 6]) -> [AttributeDecl<'_>; HidIdx::COUNT] {
    HidIdx::ALL.map(|idx| hid_decl(idx, include))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_table_layout() {
        let table = battery_table();
        assert_eq!(table.len(), 5);
        assert_eq!(table[BatteryIdx::Svc as usize].uuid, uuid::PRIMARY_SERVICE);
        assert_eq!(table[BatteryIdx::Svc as usize].value, &[0x0F, 0x18]);
        assert_eq!(table[BatteryIdx::LevelVal as usize].value, &[50]);
        assert_eq!(table[BatteryIdx::LevelCcc as usize].value, &[0, 0]);
        assert_eq!(table[BatteryIdx::LevelPresFmt as usize].value.len(), 7);
        assert_eq!(
            table[BatteryIdx::LevelPresFmt as usize].value[2..4],
            [0xAD, 0x27]
        );
    }

    #[test]
    fn hid_table_has_one_declaration_per_index() {
        let include = IncludedService::battery(40).encode();
        let table = hid_table(&include);
        assert_eq!(table.len(), HidIdx::COUNT);
        assert_eq!(HidIdx::COUNT, 37);
    }

    #[test]
    fn hid_table_values() {
        let include = IncludedService::battery(40).encode();
        let table = hid_table(&include);

        let svc = table[HidIdx::Svc as usize];
        assert_eq!(svc.uuid, uuid::PRIMARY_SERVICE);
        assert_eq!(svc.value, &[0x12, 0x18]);
        assert_eq!(svc.perm, Permissions::READ_ENCRYPTED);

        assert_eq!(table[HidIdx::InclSvc as usize].value, &[40, 0, 44, 0, 0x0F, 0x18]);
        assert_eq!(table[HidIdx::HidInfoVal as usize].value, &[0x11, 0x01, 0x00, 0x01]);
        assert_eq!(table[HidIdx::ReportMapVal as usize].value, REPORT_MAP);
        assert_eq!(table[HidIdx::ReportMapVal as usize].max_len, 512);
        assert_eq!(table[HidIdx::ReportMapExtRepRef as usize].value, &[0x19, 0x2A]);
        assert_eq!(table[HidIdx::ProtoModeVal as usize].value, &[1]);
        assert_eq!(table[HidIdx::CtnlPtChar as usize].value, &[props::WRITE_NO_RSP]);
    }

    #[test]
    fn hid_table_report_references() {
        let include = [0; 6];
        let table = hid_table(&include);
        assert_eq!(table[HidIdx::MouseInRepRef as usize].value, &[1, 1]);
        assert_eq!(table[HidIdx::KeyInRepRef as usize].value, &[2, 1]);
        assert_eq!(table[HidIdx::LedOutRepRef as usize].value, &[0, 2]);
        assert_eq!(table[HidIdx::CcInRepRef as usize].value, &[3, 1]);
        assert_eq!(table[HidIdx::ReportRepRef as usize].value, &[0, 3]);
    }

    #[test]
    fn input_characteristics_notify() {
        let include = [0; 6];
        let table = hid_table(&include);
        for idx in [
            HidIdx::MouseInChar,
            HidIdx::KeyInChar,
            HidIdx::CcInChar,
            HidIdx::BootKbInChar,
            HidIdx::BootMouseInChar,
        ] {
            let decl = table[idx as usize];
            assert_eq!(decl.uuid, uuid::CHARACTERISTIC);
            assert_eq!(decl.value[0] & props::NOTIFY, props::NOTIFY, "{:?}", idx);
        }
    }

    #[test]
    fn consumer_ccc_requires_encrypted_write() {
        let include = [0; 6];
        let table = hid_table(&include);
        let ccc = table[HidIdx::CcInCcc as usize];
        assert!(ccc.perm.contains(Permissions::WRITE_ENCRYPTED));
        assert!(!ccc.perm.contains(Permissions::WRITE));
    }

    #[test]
    fn included_service_spans_battery_table() {
        let incl = IncludedService::battery(0x0010);
        assert_eq!(incl.end, 0x0014);
        assert_eq!(incl.encode(), [0x10, 0x00, 0x14, 0x00, 0x0F, 0x18]);
    }
}
