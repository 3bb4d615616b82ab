//! Nudge application entry point.
//!
//! Loads configuration, initializes tracing and wires the scheduling engine
//! with its in-process collaborators.

mod cli;

use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use nudge_core::types::ReminderEvent;
use nudge_core::NudgeConfig;
use nudge_engine::{
    plan, Clock, Coordinator, Delivery, EscalationSettings, EventBus, MemoryChecklistStore,
    MemoryReminderStore, MemorySink, NotificationSink, PlanContext, ReminderStore, SystemClock,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can seed the filter.
    let config_path = args.resolve_config_path();
    let loaded = NudgeConfig::load(&config_path);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    let filter = match args.log_level {
        Some(ref level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(args.resolve_log_level(&config.general.log_level))),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Nudge v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_path.display(), "Configuration loaded"),
        Err(_) if !config_path.exists() => {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults")
        }
        Err(e) => tracing::warn!(
            path = %config_path.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    match args.command {
        Command::Plan { due_in, interval } => {
            print_plan(&config, due_in, interval);
            Ok(())
        }
        Command::Remind { title, due_in } => remind(&config, title, due_in).await,
    }
}

fn print_plan(config: &NudgeConfig, due_in: i64, interval: Option<i64>) {
    let clock = SystemClock;
    let settings = EscalationSettings::from(&config.escalation);
    let ctx = PlanContext {
        now: clock.now(),
        offset: clock.local_offset(),
        quiet_hours: settings.quiet_hours,
    };
    let due_at = ctx.now + Duration::seconds(due_in);
    let entries = plan(
        due_at,
        "preview",
        interval.unwrap_or(settings.interval_secs),
        &ctx,
    );

    if entries.is_empty() {
        println!("Nothing to schedule: every step is already in the past.");
        return;
    }
    for entry in entries {
        println!(
            "{:<12} {}  {:<9} {}",
            entry.identifier,
            entry.fire_at.with_timezone(&ctx.offset).format("%Y-%m-%d %H:%M:%S"),
            entry.level,
            if entry.sound_suppressed { "silent" } else { "sound" },
        );
    }
}

async fn remind(
    config: &NudgeConfig,
    title: String,
    due_in: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let reminders = Arc::new(MemoryReminderStore::new());
    let sink = Arc::new(MemorySink::new(Arc::clone(&clock)));
    let events = EventBus::new(config.events.channel_capacity);
    let coordinator = Coordinator::new(
        reminders.clone(),
        Arc::new(MemoryChecklistStore::new()),
        sink.clone(),
        Arc::clone(&clock),
        events.clone(),
        EscalationSettings::from(&config.escalation),
    );

    // Log every domain event.
    let mut event_rx = events.subscribe();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            tracing::debug!(event = event.event_name(), at = %event.timestamp(), "Domain event");
        }
    });

    let event = ReminderEvent::new(title, clock.now() + Duration::seconds(due_in));
    reminders.save(&event).await?;
    let placed = coordinator.reschedule(&event).await?;
    if placed.is_empty() {
        println!("Nothing to schedule: every step is already in the past.");
        event_logger.abort();
        return Ok(());
    }
    println!("Scheduled {} alert(s) for \"{}\"", placed.len(), event.title);

    let mut deliveries = sink.subscribe();
    let delivery_loop = {
        let sink = Arc::clone(&sink);
        tokio::spawn(async move { sink.run().await })
    };

    loop {
        tokio::select! {
            delivery = deliveries.recv() => {
                let Ok(delivery) = delivery else { break };
                print_delivery(&delivery, clock.as_ref());
                if sink.pending_identifiers().is_empty() {
                    // Alerts fired in the same tick are already queued.
                    while let Ok(delivery) = deliveries.try_recv() {
                        print_delivery(&delivery, clock.as_ref());
                    }
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling remaining alerts");
                coordinator.cancel(&event).await?;
                break;
            }
        }
    }

    sink.shutdown();
    delivery_loop.await?;
    sink.set_badge_count(0).await;
    event_logger.abort();
    tracing::info!("Nudge stopped");
    Ok(())
}

fn print_delivery(delivery: &Delivery, clock: &dyn Clock) {
    let local = delivery.fired_at.with_timezone(&clock.local_offset());
    println!(
        "[{}] {}: {}{}",
        local.format("%H:%M:%S"),
        delivery.request.title,
        delivery.request.body,
        if delivery.request.sound_suppressed { " (silent)" } else { "" },
    );
}
