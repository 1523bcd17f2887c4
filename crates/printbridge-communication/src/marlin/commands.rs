//! Marlin command codes and the generic-path allow-list
//!
//! Query commands go through `MarlinDriver::send_command` and must be
//! members of the allow-list. The administrative codes used by the
//! startup and shutdown handshakes are driver-internal and bypass it.

/// SD print status report
pub const SD_PRINT_STATUS: &str = "M27";

/// Temperature report (hotend and bed, actual and target)
pub const REPORT_TEMPERATURES: &str = "M105";

/// Current position report
pub const REPORT_POSITION: &str = "M114";

/// Firmware identity report
pub const FIRMWARE_INFO: &str = "M115";

/// Show a message on the printer's display (administrative)
pub(crate) const DISPLAY_MESSAGE: &str = "M117";

/// Power off the board (administrative)
pub(crate) const POWER_OFF: &str = "M81";

/// The acknowledgment token ending every reply
pub const ACK_TOKEN: &str = "ok";

/// Commands permitted through the generic command-execution path
pub const ALLOWED_COMMANDS: &[&str] = &[
    SD_PRINT_STATUS,
    REPORT_TEMPERATURES,
    REPORT_POSITION,
    FIRMWARE_INFO,
];

/// Check allow-list membership for the generic command path
pub fn is_allowed(code: &str) -> bool {
    ALLOWED_COMMANDS.contains(&code.trim())
}

/// Build an `M117` display-message command
pub(crate) fn display_message(text: &str) -> String {
    format!("{} {}", DISPLAY_MESSAGE, text)
}

/// Check whether a reply line terminates the reply.
///
/// The token normally stands on its own line, but temperature reports
/// prepend it to the payload ("ok T:... B:..."), so a leading
/// "ok " also counts.
pub(crate) fn is_ack_line(line: &str) -> bool {
    let line = line.trim();
    line == ACK_TOKEN || line.starts_with("ok ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_membership() {
        assert!(is_allowed("M27"));
        assert!(is_allowed("M114"));
        assert!(!is_allowed("M81"));
        assert!(!is_allowed("G28"));
        assert!(!is_allowed("M117 hi"));
    }

    #[test]
    fn ack_detection() {
        assert!(is_ack_line("ok"));
        assert!(is_ack_line("ok\r"));
        assert!(is_ack_line("ok T:18.40 /0.00 B:18.28 /0.00"));
        assert!(!is_ack_line("okay then"));
        assert!(!is_ack_line("echo:busy processing"));
    }
}
