//! Output formatting utilities for the CLI
//!
//! Tables for discovered devices, pretty JSON for query replies, and
//! coloured status lines.

use tabled::{settings::Style, Table, Tabled};

use sofia_client::DiscoveredDevice;

/// Format discovered devices as a table
///
/// Returns "No devices found" when the list is empty.
pub fn format_devices(devices: &[DiscoveredDevice]) -> String {
    if devices.is_empty() {
        return "No devices found".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "ADDRESS")]
        address: String,
        #[tabled(rename = "PORT")]
        port: u16,
        #[tabled(rename = "HOSTNAME")]
        hostname: String,
        #[tabled(rename = "MAC")]
        mac: String,
        #[tabled(rename = "SERIAL")]
        serial: String,
        #[tabled(rename = "FIRMWARE")]
        firmware: String,
    }

    let mut rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| {
            let net = d.announcement.net_common.as_ref();
            DeviceRow {
                address: net
                    .and_then(|n| n.host_addr())
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| d.source.ip().to_string()),
                port: d.tcp_port(),
                hostname: d.host_name().unwrap_or("-").to_string(),
                mac: dash_if_empty(net.map(|n| n.mac.as_str())),
                serial: dash_if_empty(net.map(|n| n.serial_number.as_str())),
                firmware: dash_if_empty(net.map(|n| n.version.as_str())),
            }
        })
        .collect();
    rows.sort_by(|a, b| a.address.cmp(&b.address));

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-print a JSON value
pub fn format_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn dash_if_empty(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
