//! Battery sense conversion.
//!
//! The sense divider is sampled by a 12-bit ADC. Calibration points:
//! 2914 counts at 3.7 V and 3308 counts at 4.2 V.

/// ADC counts at 3.7 V.
pub const ADC_3V7: u16 = 2914;

/// ADC counts at 4.2 V.
pub const ADC_4V2: u16 = 3308;

/// Volts per count, `1 / (ADC_4V2 - ADC_3V7)` rounded.
const ADC_CONST: f32 = 0.0025;

/// Divider correction applied on top of the count slope.
const DIVIDER_GAIN: f32 = 0.282;

/// Battery voltage for a raw ADC sample.
pub fn battery_voltage(raw: u16) -> f32 {
    ((raw as f32 - ADC_3V7 as f32) * ADC_CONST) * DIVIDER_GAIN + 3.7
}

/// Voltage in units of 20 mV, as sent in `BATT_UPDATE`.
pub fn scaled_battery(raw: u16) -> u8 {
    let centivolts = (battery_voltage(raw) * 100.0) as i32;
    (centivolts / 2).clamp(0, u8::MAX as i32) as u8
}

/// Charge estimate for the GATT battery level, linear between the
/// calibration points.
pub fn battery_percent(raw: u16) -> u8 {
    if raw <= ADC_3V7 {
        return 0;
    }
    if raw >= ADC_4V2 {
        return 100;
    }
    let span = u32::from(ADC_4V2 - ADC_3V7);
    (u32::from(raw - ADC_3V7) * 100 / span) as u8
}
