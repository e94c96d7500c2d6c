use std::path::PathBuf;

use anyhow::{Context, bail};
use cadence_core::config::{TimezoneConfig, load_config};
use cadence_rfc::error::RfcResult;
use cadence_rfc::rfc::ical::core::{CivilTime, Component, DateTime, Property, UtcOffset};
use cadence_rfc::rfc::ical::expand::{RecurrenceSetExpander, TimeZoneResolver};
use cadence_rfc::rfc::ical::parse::parse;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

const USAGE: &str = "usage: cadence <file.ics> [limit]";

#[derive(Debug, PartialEq, Eq)]
struct Args {
    path: PathBuf,
    limit: Option<usize>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let Some(path) = args.next() else {
        bail!(USAGE);
    };
    let limit = args
        .next()
        .map(|raw| {
            raw.parse::<usize>()
                .with_context(|| format!("invalid limit {raw:?}; {USAGE}"))
        })
        .transpose()?;
    if args.next().is_some() {
        bail!(USAGE);
    }
    Ok(Args {
        path: PathBuf::from(path),
        limit,
    })
}

fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let args = parse_args(std::env::args().skip(1))?;
    let limit = args.limit.unwrap_or(config.recurrence.max_occurrences);

    let input = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    tracing::info!(path = %args.path.display(), limit, "Expanding calendar");

    print_calendar(&input, config.timezone, limit)
        .with_context(|| format!("failed to expand {}", args.path.display()))
}

/// Parses `input` and prints the occurrences of every schedulable component.
fn print_calendar(input: &str, timezone: TimezoneConfig, limit: usize) -> RfcResult<()> {
    let calendar = parse(input)?;
    let mut resolver = TimeZoneResolver::from_calendar(&calendar, timezone)?;
    for component in calendar.schedulable() {
        print_occurrences(component, &mut resolver, limit)?;
    }
    Ok(())
}

/// Prints each occurrence of `component` with its UTC offset and UTC instant.
fn print_occurrences(
    component: &Component,
    resolver: &mut TimeZoneResolver,
    limit: usize,
) -> RfcResult<()> {
    let Some(dtstart) = component.get_property("DTSTART").and_then(Property::as_datetime) else {
        tracing::warn!(uid = ?component.uid(), "Skipping component without DTSTART");
        return Ok(());
    };

    let label = component
        .summary()
        .or_else(|| component.uid())
        .unwrap_or("(untitled)");
    println!("{} {label}", component.name);

    let expander = RecurrenceSetExpander::from_component_in(component, resolver)?;
    for occurrence in expander.take(limit) {
        let local = DateTime {
            civil: occurrence?,
            form: dtstart.form.clone(),
        };
        let offset = resolver.offset_for(&local)?;
        let mut utc = local.civil.normalized();
        utc.adjust(0, 0, 0, -offset);
        println!(
            "  {local}  {}  {}",
            UtcOffset::from_seconds(offset),
            format_utc(&utc)
        );
    }
    Ok(())
}

fn format_utc(utc: &CivilTime) -> String {
    utc.to_naive().map_or_else(
        || format!("{utc}Z"),
        |naive| naive.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )
}
