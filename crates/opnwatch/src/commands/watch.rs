//! `watch`: run the integration until Ctrl-C, printing indicator changes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use opnwatch_core::{BinarySensor, BinarySensorState, CoordinatorStatus, HttpFetcher, Integration};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut device = crate::config::resolve_device(global)?;
    if let Some(secs) = args.interval {
        device.scan_interval = Duration::from_secs(secs);
    }
    if device.scan_interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "watch needs a non-zero poll interval".into(),
        });
    }
    let interval = humantime::format_duration(device.scan_interval).to_string();

    // Readers reach the printer loop through this channel, including any
    // created on later polls.
    let (added_tx, mut added_rx) = mpsc::unbounded_channel::<Arc<BinarySensor>>();
    let fetcher = Arc::new(HttpFetcher::new(&device)?);
    let integration = Integration::setup_with(device, fetcher, move |added| {
        for sensor in added {
            let _ = added_tx.send(Arc::clone(sensor));
        }
    })
    .await?;

    let device_name = integration.context().device.name.clone();
    info!(device = %device_name, interval = %interval, "watching");
    output::print_output(
        &format!("Watching {device_name} every {interval} (Ctrl-C to stop)"),
        global.quiet,
    );

    let mut printers = JoinSet::new();
    let mut status = integration.coordinator().status();
    let quiet = global.quiet;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(sensor) = added_rx.recv() => {
                let name = sensor.name().to_owned();
                let mut rx = sensor.subscribe_state();
                drop(sensor);

                print_state(&name, &rx.borrow_and_update(), quiet);
                printers.spawn(async move {
                    while rx.changed().await.is_ok() {
                        let state = rx.borrow_and_update().clone();
                        print_state(&name, &state, quiet);
                    }
                });
            }
            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                print_status(&device_name, current, quiet);
            }
        }
    }

    debug!("shutting down");
    integration.teardown().await;
    // Readers are gone, so every printer sees its channel close.
    while printers.join_next().await.is_some() {}
    Ok(())
}

fn print_state(name: &str, state: &BinarySensorState, quiet: bool) {
    let availability = if state.available { "" } else { " (unavailable)" };
    output::print_output(
        &format!(
            "{} {name}: {}{availability}",
            Local::now().format("%H:%M:%S"),
            state.is_on
        ),
        quiet,
    );
}

fn print_status(device: &str, status: CoordinatorStatus, quiet: bool) {
    let line = match status {
        CoordinatorStatus::Degraded {
            consecutive_failures,
        } => format!("{device}: poll failed ({consecutive_failures} in a row), keeping last data"),
        CoordinatorStatus::Unavailable {
            consecutive_failures,
        } => format!("{device}: unavailable after {consecutive_failures} failed polls"),
        CoordinatorStatus::Ok | CoordinatorStatus::Idle | CoordinatorStatus::Stopped => return,
    };
    output::print_output(
        &format!("{} {line}", Local::now().format("%H:%M:%S")),
        quiet,
    );
}
