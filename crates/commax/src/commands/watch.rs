//! `watch`: keep a bridge connected and print each published snapshot.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use commax_core::{Bridge, BridgeConfig, RegistrySnapshot, SnapshotStream};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    mut config: BridgeConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.interval {
        config.update_interval = Duration::from_secs(secs);
    }

    let bridge = Bridge::new(config)?;
    let stream = bridge.subscribe();
    bridge.connect().await?;

    let result = watch_loop(stream, &args, global).await;
    bridge.disconnect().await;
    result
}

async fn watch_loop(
    mut stream: SnapshotStream,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut previous: Option<Arc<RegistrySnapshot>> = None;
    let mut seen = 0usize;

    loop {
        let snapshot = tokio::select! {
            changed = stream.changed() => match changed {
                Some(snapshot) => snapshot,
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };

        let out = render(&global.output, &snapshot, previous.as_deref(), color)?;
        output::print_output(&out, global.quiet);

        previous = Some(snapshot);
        seen += 1;
        if args.count.is_some_and(|n| seen >= n) {
            return Ok(());
        }
    }
}

fn render(
    format: &OutputFormat,
    snapshot: &RegistrySnapshot,
    previous: Option<&RegistrySnapshot>,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(changes(snapshot, previous, color)),
        // One document per snapshot so the stream stays line-parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(snapshot, true),
        OutputFormat::Yaml => output::render_yaml(snapshot).map(|doc| format!("---\n{doc}")),
        OutputFormat::Plain => Ok(snapshot.version.to_string()),
    }
}

/// Header line plus every sub-device whose value differs from `previous`
/// (all of them for the first snapshot).
fn changes(
    snapshot: &RegistrySnapshot,
    previous: Option<&RegistrySnapshot>,
    color: bool,
) -> String {
    let mut out = format!(
        "[{}] v{} {} device(s)",
        snapshot.updated_at.format("%H:%M:%S"),
        snapshot.version,
        snapshot.len()
    );

    for device in snapshot.devices() {
        for sub in &device.sub_devices {
            let before = previous.and_then(|p| p.lookup(&device.id, &sub.id));
            if before.is_some_and(|b| b.value == sub.value) {
                continue;
            }
            let _ = write!(
                out,
                "\n  {}/{} {} = {}",
                device.name,
                sub.id,
                sub.sort,
                output::paint_value(&sub.value, color)
            );
        }
    }
    out
}
