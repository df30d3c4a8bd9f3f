use std::{any::Any, backtrace::BacktraceStatus, fmt};

use {
    chrono::{DateTime, SecondsFormat, Utc},
    relaybot_common::Message,
};

/// The single log entry written when a processor fails.
///
/// ```text
/// (2026-10-16T09:12:44.120Z) Error in weather
///   => message = {"group":"g","service":"s","text":"#weather"}
///   => error = upstream timed out
///   => backtrace:
///       0: ...
/// ```
pub struct FailureReport<'a> {
    pub processor: &'a str,
    pub message: &'a Message,
    pub error: &'a anyhow::Error,
    pub at: DateTime<Utc>,
}

impl<'a> FailureReport<'a> {
    pub fn new(processor: &'a str, message: &'a Message, error: &'a anyhow::Error) -> Self {
        Self {
            processor,
            message,
            error,
            at: Utc::now(),
        }
    }
}

impl fmt::Display for FailureReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "({}) Error in {}",
            self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.processor
        )?;
        writeln!(f, "  => message = {}", self.message)?;
        writeln!(f, "  => error = {:#}", self.error)?;
        write!(f, "  => backtrace:")?;

        let backtrace = self.error.backtrace();
        if backtrace.status() == BacktraceStatus::Captured {
            for line in backtrace.to_string().lines() {
                write!(f, "\n      {}", line.trim_start())?;
            }
        } else {
            write!(f, " (not captured, set RUST_BACKTRACE=1)")?;
        }
        Ok(())
    }
}

/// Turn a caught panic payload into an error.
pub fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let reason = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    anyhow::anyhow!("processor panicked: {reason}")
}
