//! Console commands backed by the donation store.

use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{ColorChoice, Parser};
use tracing::{info, warn};

use crate::console::dispatcher::{CommandHandler, CommandRegistry};
use crate::store::{ChannelTotal, DonationStore};

pub const DONATION_COMMAND: &str = "donation";
pub const DONATION_HELP: &str = "Get all donations by streamer within a date range.";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const COLUMN_PADDING: usize = 2;

/// Arguments of `donation`.
#[derive(Parser, Debug)]
#[command(name = DONATION_COMMAND, color = ColorChoice::Never)]
struct DonationArgs {
    /// Start from date, format: YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,

    /// End date (inclusive), format: YYYY-MM-DD
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl DonationArgs {
    fn range(&self, now: DateTime<Utc>) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
        let from = match self.from {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => DateTime::<Utc>::MIN_UTC,
        };
        let to = match self.to {
            Some(date) => date
                .and_hms_opt(23, 59, 59)
                .context("invalid end date")?
                .and_utc(),
            None => now,
        };

        if from > to {
            bail!("--from must be before --to");
        }
        Ok((from, to))
    }
}

/// Register every console command.
pub fn register_commands(registry: &mut CommandRegistry, store: Arc<dyn DonationStore>) {
    registry.register(
        DONATION_COMMAND,
        CommandHandler::new(DONATION_HELP, move |invocation, sink| {
            info!("Console command {}: {}", invocation.command, invocation.raw);
            let reply = donation_report(&invocation.args, store.as_ref(), Utc::now())
                .unwrap_or_else(|e| {
                    warn!("donation command failed: {:#}", e);
                    format!("{:#}", e)
                });
            sink.send(&reply);
        }),
    );
}

/// Run `donation` with `args` against `store`.
pub fn donation_report(
    args: &[String],
    store: &dyn DonationStore,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let parsed = match DonationArgs::try_parse_from(
        std::iter::once(DONATION_COMMAND).chain(args.iter().map(String::as_str)),
    ) {
        Ok(parsed) => parsed,
        // Usage and parse errors go back to the console as-is.
        Err(e) => return Ok(e.to_string()),
    };

    let (from, to) = parsed.range(now)?;
    let totals = store
        .totals_by_channel(from, to)
        .context("Error getting donations")?;

    if totals.is_empty() {
        return Ok("No donations found.".to_string());
    }
    Ok(format!("```{}```", render_table(&totals)))
}

fn render_table(totals: &[ChannelTotal]) -> String {
    let mut rows = vec![[
        "Channel".to_string(),
        "Amount".to_string(),
        "StartingDate".to_string(),
        "EndingDate".to_string(),
    ]];
    rows.extend(totals.iter().map(|t| {
        [
            t.channel.clone(),
            t.amount.to_string(),
            t.first.format(DATE_FORMAT).to_string(),
            t.last.format(DATE_FORMAT).to_string(),
        ]
    }));

    let mut widths = [0usize; 4];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in &rows {
        let last = row.len() - 1;
        for (i, cell) in row.iter().enumerate() {
            if i == last {
                out.push_str(cell);
            } else {
                out.push_str(&format!("{:<w$}", cell, w = widths[i] + COLUMN_PADDING));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::Donation;
    use crate::console::dispatcher::RecordingSink;
    use crate::store::{DonationRecord, MemoryStore};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        for (channel, amount, day) in [("bar", 100, 1), ("bar", 50, 5), ("alpha", 7, 3)] {
            let donation = Donation::new("streamelements", channel, amount, "Alice donated");
            store
                .append(DonationRecord::new(&donation, at(day, 12)))
                .unwrap();
        }
        store
    }

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_table_output() {
        let report = donation_report(&[], &store(), at(30, 0)).unwrap();
        let expected = "```\
Channel  Amount  StartingDate         EndingDate
alpha    7       2024-03-03 12:00:00  2024-03-03 12:00:00
bar      150     2024-03-01 12:00:00  2024-03-05 12:00:00
```";
        assert_eq!(report, expected);
    }

    #[test]
    fn test_date_range_filters() {
        let report =
            donation_report(&args("--from 2024-03-02 --to 2024-03-03"), &store(), at(30, 0))
                .unwrap();
        assert!(report.contains("alpha"));
        assert!(!report.contains("bar"));
    }

    #[test]
    fn test_to_date_includes_whole_day() {
        let report = donation_report(&args("--to 2024-03-01"), &store(), at(30, 0)).unwrap();
        assert!(report.contains("bar      100"));
    }

    #[test]
    fn test_no_donations() {
        let report = donation_report(&[], &MemoryStore::new(), Utc::now()).unwrap();
        assert_eq!(report, "No donations found.");
    }

    #[test]
    fn test_reversed_range_is_error() {
        let err = donation_report(&args("--from 2024-03-05 --to 2024-03-01"), &store(), at(30, 0))
            .unwrap_err();
        assert!(err.to_string().contains("--from must be before --to"));
    }

    #[test]
    fn test_bad_date_reports_usage() {
        let report = donation_report(&args("--from yesterday"), &store(), at(30, 0)).unwrap();
        assert!(report.contains("--from"));
        assert!(report.contains("yesterday"));
    }

    #[test]
    fn test_registered_command_writes_to_sink() {
        let mut registry = CommandRegistry::new();
        register_commands(&mut registry, Arc::new(MemoryStore::new()));
        assert!(registry.is_registered(DONATION_COMMAND));

        let sink = RecordingSink::default();
        registry.dispatch("chan user donation", &sink);
        assert_eq!(sink.messages(), vec!["No donations found."]);

        let sink = RecordingSink::default();
        registry.dispatch("chan user donation help", &sink);
        assert_eq!(
            sink.messages(),
            vec![format!("donation: {}\n-----------------\n", DONATION_HELP)]
        );
    }
}
