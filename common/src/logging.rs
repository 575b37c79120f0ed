// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::str::FromStr;

use slog::{o, Drain};

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum LogFormat {
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "h" | "human" => Ok(LogFormat::Human),
            "j" | "json" => Ok(LogFormat::Json),
            _ => Err("invalid log format".to_string()),
        }
    }
}

// Depth of the async drain's queue.  Bursts come from crawls, which log a
// handful of lines per polled host.
const CHAN_SIZE: usize = 32768;

fn async_drain<D>(drain: D) -> slog::Fuse<slog_async::Async>
where
    D: Drain<Err = slog::Never, Ok = ()> + Send + 'static,
{
    slog_async::Async::new(drain)
        .chan_size(CHAN_SIZE)
        .build()
        .fuse()
}

/// Build the root logger for one of our daemons or tools.  Output goes to
/// `log_file` when one is given, and to the terminal otherwise.
pub fn init(
    name: &'static str,
    log_file: &Option<String>,
    log_format: LogFormat,
) -> anyhow::Result<slog::Logger> {
    let drain = match log_file {
        Some(log_file) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            match log_format {
                LogFormat::Json => async_drain(
                    slog_bunyan::with_name(name, log_file).build().fuse(),
                ),
                LogFormat::Human => {
                    let decorator = slog_term::PlainDecorator::new(log_file);
                    async_drain(
                        slog_term::FullFormat::new(decorator).build().fuse(),
                    )
                }
            }
        }
        None => match log_format {
            LogFormat::Json => async_drain(
                slog_bunyan::with_name(name, std::io::stdout())
                    .build()
                    .fuse(),
            ),
            LogFormat::Human => {
                let decorator = slog_term::TermDecorator::new().build();
                async_drain(slog_term::FullFormat::new(decorator).build().fuse())
            }
        },
    };
    Ok(slog::Logger::root(drain, o!("name" => name)))
}
