// ── Command dispatch ──
//
// Commands are validated against the current registry snapshot before
// anything touches the network. Only a fully valid batch is serialized
// into the vendor envelope and submitted.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use commax_api::{CommandRequest, DeviceObject, SubDeviceCommand};

use crate::encoding::Intent;
use crate::error::CommandError;
use crate::model::{Device, DeviceId, RegistrySnapshot, Sort, SubDeviceId};
use crate::registry::DeviceRegistry;
use crate::session::AuthSessionManager;

/// A single sub-device mutation. Built per user intent, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub device_id: DeviceId,
    pub sub_id: SubDeviceId,
    pub sort: Sort,
    /// Vendor-encoded value.
    pub value: String,
}

impl Command {
    pub fn new(
        device_id: impl Into<DeviceId>,
        sub_id: impl Into<SubDeviceId>,
        sort: Sort,
        value: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            sub_id: sub_id.into(),
            sort,
            value: value.into(),
        }
    }

    /// Resolve an intent against a device using the category routing table.
    pub fn from_intent(device: &Device, intent: &Intent) -> Result<Self, CommandError> {
        let sort = intent
            .target_sort(&device.category)
            .ok_or_else(|| CommandError::UnsupportedIntent {
                device: device.id.to_string(),
                category: device.category.to_string(),
                intent: intent.to_string(),
            })?;

        let sub = device
            .find_sort(&sort)
            .ok_or_else(|| CommandError::InvalidTarget {
                device: device.id.to_string(),
                sub: sort.to_string(),
                reason: format!("device has no {sort} sub-device"),
            })?;

        if matches!(intent, Intent::SetTemperature(celsius) if !celsius.is_finite()) {
            return Err(CommandError::ValueNotAllowed {
                device: device.id.to_string(),
                sub: sub.id.to_string(),
                value: intent.encode(),
                allowed: sub.scale.clone(),
            });
        }

        Ok(Self {
            device_id: device.id.clone(),
            sub_id: sub.id.clone(),
            sort,
            value: intent.encode(),
        })
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Sub-device mutations submitted.
    pub commands: usize,
    /// Device objects in the envelope.
    pub devices: usize,
    pub message: Option<String>,
}

/// Check one command against a snapshot.
pub fn validate(snapshot: &RegistrySnapshot, command: &Command) -> Result<(), CommandError> {
    let invalid = |reason: String| CommandError::InvalidTarget {
        device: command.device_id.to_string(),
        sub: command.sub_id.to_string(),
        reason,
    };

    let device = snapshot
        .device(&command.device_id)
        .ok_or_else(|| invalid("unknown device".into()))?;
    let sub = device
        .sub_device(&command.sub_id)
        .ok_or_else(|| invalid("unknown sub-device".into()))?;

    if !sub.is_writable() {
        return Err(invalid("sub-device is read-only".into()));
    }
    if sub.sort != command.sort {
        return Err(invalid(format!(
            "sort mismatch: sub-device is {}, command targets {}",
            sub.sort, command.sort
        )));
    }
    if !sub.allows(&command.value) {
        return Err(CommandError::ValueNotAllowed {
            device: command.device_id.to_string(),
            sub: command.sub_id.to_string(),
            value: command.value.clone(),
            allowed: sub.allowed_values(),
        });
    }
    Ok(())
}

/// Serializes validated commands into vendor envelopes and submits them.
pub struct CommandDispatcher {
    auth: Arc<AuthSessionManager>,
    registry: Arc<DeviceRegistry>,
    /// Woken after every accepted submission.
    submitted: Option<Arc<Notify>>,
}

impl CommandDispatcher {
    pub fn new(auth: Arc<AuthSessionManager>, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            auth,
            registry,
            submitted: None,
        }
    }

    /// Notify `hint` after each accepted submission (used to schedule an
    /// early poll).
    #[must_use]
    pub fn with_submit_hint(mut self, hint: Arc<Notify>) -> Self {
        self.submitted = Some(hint);
        self
    }

    pub async fn send(&self, command: Command) -> Result<Ack, CommandError> {
        self.send_batch(vec![command]).await
    }

    /// Resolve `intent` for `device_id` and send it.
    pub async fn send_intent(
        &self,
        device_id: &DeviceId,
        intent: &Intent,
    ) -> Result<Ack, CommandError> {
        let device =
            self.registry
                .device(device_id)
                .ok_or_else(|| CommandError::InvalidTarget {
                    device: device_id.to_string(),
                    sub: String::new(),
                    reason: "unknown device".into(),
                })?;
        let command = Command::from_intent(&device, intent)?;
        self.send(command).await
    }

    /// Submit several commands in one request, one device object per
    /// device. Every command is validated before any network call.
    pub async fn send_batch(&self, commands: Vec<Command>) -> Result<Ack, CommandError> {
        if commands.is_empty() {
            return Ok(Ack {
                commands: 0,
                devices: 0,
                message: None,
            });
        }

        let snapshot = self.registry.current_snapshot();
        for command in &commands {
            validate(&snapshot, command)?;
        }

        let request = build_request(self.registry.resource_no(), &snapshot, &commands);
        let devices = request.len();
        debug!(commands = commands.len(), devices, "submitting command");

        let client = self.auth.client();
        let request = &request;
        let resp = self
            .auth
            .authorized(move |token| async move { client.send_command(&token, request).await })
            .await
            .map_err(|e| {
                warn!(error = %e, "command submission failed");
                CommandError::SubmissionFailed(e)
            })?;

        for command in &commands {
            if !self
                .registry
                .apply_optimistic(&command.device_id, &command.sub_id, &command.value)
            {
                debug!(device = %command.device_id, "target left the registry before optimistic update");
            }
        }
        info!(commands = commands.len(), devices, "command accepted");

        if let Some(hint) = &self.submitted {
            hint.notify_one();
        }

        Ok(Ack {
            commands: commands.len(),
            devices,
            message: resp.result_message,
        })
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("resource_no", &self.registry.resource_no())
            .finish_non_exhaustive()
    }
}

/// Group commands per device, preserving first-seen order. Callers
/// validate first, so every device is present in `snapshot`.
fn build_request(
    resource_no: &str,
    snapshot: &RegistrySnapshot,
    commands: &[Command],
) -> CommandRequest {
    let mut objects: IndexMap<&DeviceId, DeviceObject> = IndexMap::new();
    for command in commands {
        let object = objects.entry(&command.device_id).or_insert_with(|| {
            let device = snapshot.device(&command.device_id);
            DeviceObject {
                sub_device: Vec::new(),
                root_uuid: command.device_id.to_string(),
                nickname: device.map(|d| d.name.clone()),
                root_device: device.and_then(|d| d.root_device.clone()),
            }
        });
        object.sub_device.push(SubDeviceCommand::set(
            command.sub_id.as_str(),
            command.sort.as_str(),
            &command.value,
        ));
    }
    CommandRequest::set(resource_no, objects.into_values().collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encoding::FanPreset;
    use crate::model::{Access, DeviceCategory, SubDevice};
    use pretty_assertions::assert_eq;

    fn sub(id: &str, sort: Sort, access: Access, scale: &[&str]) -> SubDevice {
        SubDevice {
            id: SubDeviceId::from(id),
            sort,
            access,
            value: "0".into(),
            scale: scale.iter().map(|s| (*s).to_owned()).collect(),
            options: Vec::new(),
        }
    }

    fn fan() -> Device {
        Device {
            id: DeviceId::from("fan-1"),
            category: DeviceCategory::FanSystem,
            name: "Ventilation".into(),
            root_device: Some("fan".into()),
            sub_devices: vec![
                sub("fan-power", Sort::SwitchBinary, Access::ReadWrite, &[]),
                sub("fan-mode", Sort::FanMode, Access::ReadWrite, &["0", "1", "2"]),
                sub("fan-temp", Sort::AirTemperature, Access::Read, &[]),
            ],
        }
    }

    fn snapshot(devices: Vec<Device>) -> RegistrySnapshot {
        RegistrySnapshot::new(1, devices.into_iter().map(|d| (d.id.clone(), d)).collect())
    }

    #[test]
    fn intent_resolves_to_routed_sub_device() {
        let cmd = Command::from_intent(&fan(), &Intent::SetFanPreset(FanPreset::Auto)).unwrap();
        assert_eq!(cmd, Command::new("fan-1", "fan-mode", Sort::FanMode, "2"));

        let cmd = Command::from_intent(&fan(), &Intent::TurnOn).unwrap();
        assert_eq!(cmd.sub_id, SubDeviceId::from("fan-power"));
        assert_eq!(cmd.value, "1");
    }

    #[test]
    fn unsupported_intent_is_rejected() {
        let err = Command::from_intent(&fan(), &Intent::SetTemperature(21.0)).unwrap_err();
        assert!(matches!(err, CommandError::UnsupportedIntent { .. }));

        let mut unknown = fan();
        unknown.category = DeviceCategory::Unknown("gasValve".into());
        let err = Command::from_intent(&unknown, &Intent::TurnOn).unwrap_err();
        assert!(matches!(err, CommandError::UnsupportedIntent { .. }));
    }

    #[test]
    fn non_finite_temperature_is_rejected() {
        let boiler = Device {
            id: DeviceId::from("boiler-1"),
            category: DeviceCategory::Boiler,
            name: "Boiler".into(),
            root_device: None,
            sub_devices: vec![sub(
                "boiler-set",
                Sort::ThermostatSetpoint,
                Access::ReadWrite,
                &[],
            )],
        };

        for celsius in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = Command::from_intent(&boiler, &Intent::SetTemperature(celsius)).unwrap_err();
            assert!(
                matches!(err, CommandError::ValueNotAllowed { ref sub, .. } if sub == "boiler-set"),
                "{celsius}: {err:?}"
            );
        }

        let cmd = Command::from_intent(&boiler, &Intent::SetTemperature(21.5)).unwrap();
        assert_eq!(cmd.value, "21.5");
    }

    #[test]
    fn validation_rules() {
        let snap = snapshot(vec![fan()]);

        let ok = Command::new("fan-1", "fan-mode", Sort::FanMode, "1");
        assert!(validate(&snap, &ok).is_ok());

        let read_only = Command::new("fan-1", "fan-temp", Sort::AirTemperature, "20");
        assert!(matches!(
            validate(&snap, &read_only),
            Err(CommandError::InvalidTarget { ref reason, .. }) if reason.contains("read-only")
        ));

        let wrong_sort = Command::new("fan-1", "fan-mode", Sort::SwitchBinary, "1");
        assert!(matches!(
            validate(&snap, &wrong_sort),
            Err(CommandError::InvalidTarget { .. })
        ));

        let missing = Command::new("nope", "fan-mode", Sort::FanMode, "1");
        assert!(matches!(
            validate(&snap, &missing),
            Err(CommandError::InvalidTarget { .. })
        ));

        let out_of_scale = Command::new("fan-1", "fan-mode", Sort::FanMode, "7");
        assert_eq!(
            validate(&snap, &out_of_scale).unwrap_err(),
            CommandError::ValueNotAllowed {
                device: "fan-1".into(),
                sub: "fan-mode".into(),
                value: "7".into(),
                allowed: vec!["0".into(), "1".into(), "2".into()],
            }
        );
    }

    #[test]
    fn request_groups_commands_per_device() {
        let snap = snapshot(vec![fan()]);
        let commands = vec![
            Command::new("fan-1", "fan-power", Sort::SwitchBinary, "1"),
            Command::new("fan-1", "fan-mode", Sort::FanMode, "2"),
        ];
        let request = build_request("R-1", &snap, &commands);
        assert_eq!(request.len(), 1);

        let json = serde_json::to_value(&request).unwrap();
        let object = &json["commands"]["cgpCommand"][0]["cgp"]["object"];
        assert_eq!(object["rootUuid"], "fan-1");
        assert_eq!(object["rootDevice"], "fan");
        assert_eq!(object["nickname"], "Ventilation");
        assert_eq!(object["subDevice"].as_array().unwrap().len(), 2);
        assert_eq!(object["subDevice"][1]["value"], "2");
        assert_eq!(object["subDevice"][1]["sort"], "fanMode");
    }
}
