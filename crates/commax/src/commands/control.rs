//! Device control handlers: power, temperature, fan preset, raw values.

use commax_core::{
    Ack, Bridge, BridgeConfig, Command, CommandError, CoreError, DeviceId, FanPreset, Intent,
    SubDeviceId,
};

use crate::cli::{GlobalOpts, PresetArg, PresetArgs, SetArgs, TargetArgs, TemperatureArgs};
use crate::error::CliError;

impl From<PresetArg> for FanPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Bypass => Self::Bypass,
            PresetArg::Manual => Self::Manual,
            PresetArg::Auto => Self::Auto,
        }
    }
}

fn report(ack: &Ack, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    eprintln!(
        "Sent {} command(s) to {} device(s)",
        ack.commands, ack.devices
    );
}

async fn send_intent(
    config: BridgeConfig,
    device: String,
    intent: Intent,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = DeviceId::from(device);
    let ack = Bridge::oneshot(config, |bridge| async move {
        bridge.send_intent(&id, &intent).await
    })
    .await?;
    report(&ack, global);
    Ok(())
}

pub async fn power(
    config: BridgeConfig,
    args: TargetArgs,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let intent = if on { Intent::TurnOn } else { Intent::TurnOff };
    send_intent(config, args.device, intent, global).await
}

pub async fn temperature(
    config: BridgeConfig,
    args: TemperatureArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    send_intent(config, args.device, Intent::SetTemperature(args.celsius), global).await
}

/// Fan preset, optionally powering the fan on in the same envelope.
pub async fn preset(
    config: BridgeConfig,
    args: PresetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let preset = Intent::SetFanPreset(args.preset.into());
    if !args.power_on {
        return send_intent(config, args.device, preset, global).await;
    }

    let id = DeviceId::from(args.device);
    let ack = Bridge::oneshot(config, |bridge| async move {
        let device = bridge.device(&id)?;
        let commands = vec![
            Command::from_intent(&device, &Intent::TurnOn)?,
            Command::from_intent(&device, &preset)?,
        ];
        bridge.send_commands(commands).await
    })
    .await?;
    report(&ack, global);
    Ok(())
}

/// Write a vendor value as-is. The sort comes from the current snapshot.
pub async fn set_raw(
    config: BridgeConfig,
    args: SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = DeviceId::from(args.device);
    let sub = SubDeviceId::from(args.sub_device);
    let value = args.value;

    let ack = Bridge::oneshot(config, |bridge| async move {
        let device = bridge.device(&id)?;
        let sort = device
            .sub_device(&sub)
            .map(|s| s.sort.clone())
            .ok_or_else(|| {
                CoreError::from(CommandError::InvalidTarget {
                    device: id.to_string(),
                    sub: sub.to_string(),
                    reason: "unknown sub-device".into(),
                })
            })?;
        bridge
            .send_command(Command::new(id, sub, sort, value))
            .await
    })
    .await?;
    report(&ack, global);
    Ok(())
}
