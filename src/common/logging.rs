// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! glog-style `tracing` output for hosts that do not install their own subscriber.
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Local};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

use super::app_config::MaxRowConfig;

pub use tracing::{debug, error, info, trace, warn};

const LOG_FILE_NAME: &str = "maxrow.log";

static INIT: OnceLock<()> = OnceLock::new();
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// `MAXROW_LOG_FILE` names the file directly; a log directory gets `maxrow.log`.
/// Without either the output stays on stderr.
pub(crate) fn log_target(file: Option<String>, dir: Option<String>) -> LogTarget {
    match (file, dir) {
        (Some(file), _) => LogTarget::File(PathBuf::from(file)),
        (None, Some(dir)) => LogTarget::File(PathBuf::from(dir).join(LOG_FILE_NAME)),
        (None, None) => LogTarget::Stderr,
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve_log_target() -> LogTarget {
    log_target(
        env_value("MAXROW_LOG_FILE"),
        env_value("MAXROW_LOG_DIR").or_else(|| env_value("LOG_DIR")),
    )
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn level_char(level: &tracing::Level) -> char {
    match *level {
        tracing::Level::ERROR => 'E',
        tracing::Level::WARN => 'W',
        tracing::Level::INFO => 'I',
        tracing::Level::DEBUG => 'D',
        tracing::Level::TRACE => 'T',
    }
}

// Lyyyymmdd hh:mm:ss.uuuuuu tid file:line]
fn glog_prefix(
    level: &tracing::Level,
    now: &DateTime<Local>,
    thread_id: u64,
    file: &str,
    line: u32,
) -> String {
    format!(
        "{}{} {} {}:{}] ",
        level_char(level),
        now.format("%Y%m%d %H:%M:%S%.6f"),
        thread_id,
        file,
        line
    )
}

struct GlogFormatter;

impl<S, N> FormatEvent<S, N> for GlogFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let prefix = glog_prefix(
            meta.level(),
            &Local::now(),
            THREAD_ID.with(|id| *id),
            meta.file().unwrap_or("unknown"),
            meta.line().unwrap_or(0),
        );
        write!(writer, "{prefix}")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global subscriber once. `filter` is a full `EnvFilter` expression,
/// e.g. `"info"` or `"maxrow=trace"`. Later calls, and hosts that already installed a
/// subscriber, are left alone.
pub fn init_with_level(filter: &str) {
    INIT.get_or_init(|| {
        let (make_writer, ansi) = match resolve_log_target() {
            LogTarget::File(path) => match open_log_file(&path) {
                Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
                Err(err) => {
                    eprintln!(
                        "failed to open log file {}: {}, logging to stderr",
                        path.display(),
                        err
                    );
                    (
                        BoxMakeWriter::new(std::io::stderr),
                        atty::is(atty::Stream::Stderr),
                    )
                }
            },
            LogTarget::Stderr => (
                BoxMakeWriter::new(std::io::stderr),
                atty::is(atty::Stream::Stderr),
            ),
        };
        let _ = tracing_fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(make_writer)
            .with_ansi(ansi)
            .event_format(GlogFormatter)
            .try_init();
    });
}

pub fn init_from_config(cfg: &MaxRowConfig) {
    init_with_level(cfg.effective_log_filter());
}

pub fn init() {
    init_with_level("info");
}
