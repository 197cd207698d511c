//! Device command handlers.

use tabled::Tabled;

use commax_core::{Bridge, BridgeConfig, Device, DeviceId, SubDevice};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.name.clone(),
            category: d.category.to_string(),
            kind: d.root_device.clone().unwrap_or_default(),
            state: summary(d),
        }
    }
}

#[derive(Tabled)]
struct SubDeviceRow {
    #[tabled(rename = "Sub-device")]
    id: String,
    #[tabled(rename = "Sort")]
    sort: String,
    #[tabled(rename = "Access")]
    access: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Allowed")]
    allowed: String,
}

impl SubDeviceRow {
    fn new(s: &SubDevice, color: bool) -> Self {
        Self {
            id: s.id.to_string(),
            sort: s.sort.to_string(),
            access: if s.is_writable() { "rw" } else { "r" }.into(),
            value: output::paint_value(&s.value, color),
            allowed: s.allowed_values().join(","),
        }
    }
}

/// `sort=value` pairs, one per sub-device.
fn summary(d: &Device) -> String {
    d.sub_devices
        .iter()
        .map(|s| format!("{}={}", s.sort, s.value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn detail(d: &Device, color: bool) -> String {
    let header = [
        format!("ID:       {}", d.id),
        format!("Name:     {}", d.name),
        format!("Category: {}", d.category),
        format!("Kind:     {}", d.root_device.as_deref().unwrap_or("-")),
    ]
    .join("\n");

    let rows: Vec<SubDeviceRow> = d
        .sub_devices
        .iter()
        .map(|s| SubDeviceRow::new(s, color))
        .collect();
    format!("{header}\n\n{}", output::render_table(&rows))
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    config: BridgeConfig,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let snapshot =
                Bridge::oneshot(config, |bridge| async move { Ok(bridge.device_list()) }).await?;
            let devices: Vec<Device> = snapshot.devices().cloned().collect();
            let out = output::render_list(
                &global.output,
                &devices,
                |d| DeviceRow::from(d),
                |d| d.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let id = DeviceId::from(device);
            let device =
                Bridge::oneshot(config, |bridge| async move { bridge.device(&id) }).await?;
            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &device,
                |d| detail(d, color),
                |d| summary(d).replace(' ', "\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
