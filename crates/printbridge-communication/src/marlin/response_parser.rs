//! Marlin reply parsing
//!
//! Parses the fixed-format telemetry lines Marlin emits for M114
//! (position), M105 (temperatures), M115 (identity), and M27 (SD print
//! status). All parsing is label-anchored: find the label, then read
//! the value that follows. Field widths vary between firmware builds,
//! so nothing here slices at fixed character offsets.

use printbridge_core::{DriverError, Identity, Position, Result, Temperatures};

/// SD print job state reported by M27
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdPrintState {
    /// Fraction is textually `0/0`
    Idle,
    /// A recognizable fraction with progress
    Printing,
    /// Reply matched neither shape
    Unknown,
}

fn malformed(expected: &str, reply: &str) -> DriverError {
    DriverError::MalformedReply {
        expected: expected.to_string(),
        reply: reply.to_string(),
    }
}

/// Find `label` and read the maximal numeric run following it
fn scan_numeric(reply: &str, label: &str) -> Option<f64> {
    let start = reply.find(label)? + label.len();
    let rest = &reply[start..];
    let end = rest
        .char_indices()
        .find(|(_, c)| !matches!(c, '0'..='9' | '.' | '-' | '+'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Parse a positional report
///
/// Shape: `X:<f> Y:<f> Z:<f> E:<f> Count X:...` followed by the
/// acknowledgment line.
pub fn parse_position(reply: &str) -> Result<Position> {
    Ok(Position {
        x: scan_numeric(reply, "X:").ok_or_else(|| malformed("X: field", reply))?,
        y: scan_numeric(reply, "Y:").ok_or_else(|| malformed("Y: field", reply))?,
        z: scan_numeric(reply, "Z:").ok_or_else(|| malformed("Z: field", reply))?,
        e: scan_numeric(reply, "E:").ok_or_else(|| malformed("E: field", reply))?,
    })
}

/// Parse an actual/target pair: the token carrying `label`, then the
/// `/`-prefixed target in the same or the following token
fn scan_pair(reply: &str, label: &str) -> Option<(f64, f64)> {
    let mut tokens = reply.split_whitespace();
    while let Some(token) = tokens.next() {
        let Some(value) = token.strip_prefix(label) else {
            continue;
        };
        // Some builds write "T:18.40/0.00" without the space
        if let Some((actual, target)) = value.split_once('/') {
            return Some((actual.parse().ok()?, target.parse().ok()?));
        }
        let actual = value.parse().ok()?;
        let target = tokens.next()?.strip_prefix('/')?.parse().ok()?;
        return Some((actual, target));
    }
    None
}

/// Parse a temperature report
///
/// Shape: `ok T:<f> /<f> B:<f> /<f> @:0 B@:0`. The `@:`/`B@:` power
/// tokens do not carry the `T:`/`B:` labels, so the token scan cannot
/// mistake them for the temperature pairs.
pub fn parse_temperatures(reply: &str) -> Result<Temperatures> {
    let (hotend_actual, hotend_target) =
        scan_pair(reply, "T:").ok_or_else(|| malformed("T:<actual> /<target>", reply))?;
    let (bed_actual, bed_target) =
        scan_pair(reply, "B:").ok_or_else(|| malformed("B:<actual> /<target>", reply))?;

    Ok(Temperatures {
        hotend_actual,
        hotend_target,
        bed_actual,
        bed_target,
    })
}

/// Check for a `KEY:`-shaped label token (uppercase word, then colon)
fn is_label_token(token: &str) -> bool {
    match token.find(':') {
        Some(0) | None => false,
        Some(i) => token[..i]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_'),
    }
}

/// Find `label` and read its value up to the next label token or end
/// of line
fn scan_labeled(reply: &str, label: &str) -> Option<String> {
    let start = reply.find(label)? + label.len();
    let rest = &reply[start..];
    let line = &rest[..rest.find('\n').unwrap_or(rest.len())];

    let mut end = line.len();
    let mut pos = 0;
    for token in line.split(' ') {
        if pos > 0 && is_label_token(token) {
            end = pos - 1;
            break;
        }
        pos += token.len() + 1;
    }

    let value = line[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a firmware identity report
///
/// Shape: space-separated `KEY:value` fields where values may contain
/// spaces (`MACHINE_TYPE:Anet A8 Plus`), terminated by the next label
/// token.
pub fn parse_identity(reply: &str) -> Result<Identity> {
    Ok(Identity {
        firmware_name: scan_labeled(reply, "FIRMWARE_NAME:")
            .ok_or_else(|| malformed("FIRMWARE_NAME: field", reply))?,
        protocol_version: scan_labeled(reply, "PROTOCOL_VERSION:")
            .ok_or_else(|| malformed("PROTOCOL_VERSION: field", reply))?,
        machine_type: scan_labeled(reply, "MACHINE_TYPE:")
            .ok_or_else(|| malformed("MACHINE_TYPE: field", reply))?,
        uuid: scan_labeled(reply, "UUID:").ok_or_else(|| malformed("UUID: field", reply))?,
    })
}

/// Parse an SD print status report
///
/// `SD printing byte <done>/<total>`: the fraction `0/0` means idle,
/// any other digit fraction means a job is in progress. Anything else
/// (including "Not SD printing") is `Unknown`; the driver resolves
/// that case with its fail-safe policy.
pub fn parse_sd_state(reply: &str) -> SdPrintState {
    const MARKER: &str = "SD printing byte ";

    let Some(start) = reply.find(MARKER) else {
        return SdPrintState::Unknown;
    };
    let rest = &reply[start + MARKER.len()..];
    let Some(fraction) = rest.split_whitespace().next() else {
        return SdPrintState::Unknown;
    };
    let Some((done, total)) = fraction.split_once('/') else {
        return SdPrintState::Unknown;
    };
    let all_digits =
        |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(done) || !all_digits(total) {
        return SdPrintState::Unknown;
    }

    if fraction == "0/0" {
        SdPrintState::Idle
    } else {
        SdPrintState::Printing
    }
}
