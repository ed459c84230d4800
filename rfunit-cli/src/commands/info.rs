//! Device info command implementation.

use anyhow::Result;
use console::style;
use rfunit::DeviceInfo;

use super::connect;
use crate::Cli;
use crate::config::Config;

fn info_json(info: &DeviceInfo) -> serde_json::Value {
    serde_json::json!({
        "ok": true,
        "data": {
            "address": info.address,
            "transport": info.transport,
            "status": info.status.0,
            "flags": info.status.flags(),
            "mode": info.mode.to_string(),
            "firmware_version": info.firmware_version,
            "application_version": info.application_version,
        }
    })
}

/// Info command implementation.
pub(crate) fn cmd_info(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let mut unit = connect(cli, config)?;
    let info = unit.device_info()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info_json(&info))?);
        return Ok(());
    }

    eprintln!("{}", style("RF unit").bold().underlined());
    eprintln!("  Address:     {:#04x}", info.address);
    eprintln!("  Transport:   {}", info.transport);
    eprintln!(
        "  Status:      {:#06x} (flags {:#04x})",
        info.status.0,
        info.status.flags()
    );
    eprintln!("  Mode:        {}", style(info.mode).cyan());
    if let Some(version) = &info.firmware_version {
        eprintln!("  Firmware:    {version}");
    }
    if let Some(version) = &info.application_version {
        eprintln!("  Application: {version}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfunit::{DeviceMode, StatusWord};

    #[test]
    fn test_info_json_application() {
        let info = DeviceInfo {
            address: 0x5A,
            transport: "dummy".to_string(),
            status: StatusWord(0x0080),
            mode: DeviceMode::Application,
            firmware_version: Some("FW 1.2.3".to_string()),
            application_version: Some("VPE 4.5".to_string()),
        };
        let value = info_json(&info);
        assert_eq!(value["ok"], true);
        assert_eq!(value["data"]["address"], 0x5A);
        assert_eq!(value["data"]["flags"], 0x80);
        assert_eq!(value["data"]["mode"], "APROM");
        assert_eq!(value["data"]["application_version"], "VPE 4.5");
    }

    #[test]
    fn test_info_json_bootloader_has_null_versions() {
        let info = DeviceInfo {
            address: 0x5A,
            transport: "linux".to_string(),
            status: StatusWord(0x008C),
            mode: DeviceMode::Bootloader,
            firmware_version: None,
            application_version: None,
        };
        let value = info_json(&info);
        assert_eq!(value["data"]["mode"], "LDROM");
        assert!(value["data"]["firmware_version"].is_null());
    }
}
