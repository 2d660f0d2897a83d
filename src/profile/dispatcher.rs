//! Report dispatch: build a report and notify it on the matching handle.

use super::engine::ServiceEngine;
use crate::error::Error;
use crate::gatt::{ConnId, GattTransport, SecurityLayer};
use crate::hid::{report_id, ConsumerCmd, ConsumerReport, KeyboardReport, MouseReport, ReportType};

impl<T: GattTransport + SecurityLayer> ServiceEngine<T> {
    /// Notify `data` on the attribute registered for `(report_id, report_type)`
    /// under the active protocol mode.
    ///
    /// Returns `Ok(())` without sending when the report is not registered
    /// (service not built yet, or no such report in this mode) or the host
    /// has not subscribed to it.
    pub fn send_report(
        &mut self,
        conn_id: ConnId,
        report_id: u8,
        report_type: ReportType,
        data: &[u8],
    ) -> Result<(), Error> {
        let Some(gatt_if) = self.hid_if() else {
            return Ok(());
        };
        let Some(entry) = self.lookup_report(report_id, report_type) else {
            trace!(
                "no report {} {:?} in mode {:?}",
                report_id,
                report_type,
                self.protocol_mode()
            );
            return Ok(());
        };

        let (handle, cccd) = (entry.handle, entry.cccd_handle);
        if !self.notifications_enabled(cccd)? {
            trace!("report {} not subscribed", report_id);
            return Ok(());
        }
        debug!("send report {} on handle {}", report_id, handle);
        self.stack
            .send_notification(gatt_if, conn_id, handle, data, false)?;
        Ok(())
    }

    /// Send a keyboard report. More than six keys is rejected and nothing
    /// is sent.
    pub fn send_keyboard(&mut self, conn_id: ConnId, modifier: u8, keys: &[u8]) -> Result<(), Error> {
        let report = KeyboardReport::from_keys(modifier, keys)?;
        self.send_report(conn_id, report_id::KEY_IN, ReportType::Input, &report.to_bytes())
    }

    pub fn send_mouse(&mut self, conn_id: ConnId, buttons: u8, dx: i8, dy: i8) -> Result<(), Error> {
        let report = MouseReport::new(buttons, dx, dy);
        self.send_report(conn_id, report_id::MOUSE_IN, ReportType::Input, &report.to_bytes())
    }

    /// Send a consumer command press, or the empty release report.
    pub fn send_consumer(&mut self, conn_id: ConnId, cmd: ConsumerCmd, pressed: bool) -> Result<(), Error> {
        let report = ConsumerReport::new(cmd, pressed);
        self.send_report(conn_id, report_id::CC_IN, ReportType::Input, &report.to_bytes())
    }
}
