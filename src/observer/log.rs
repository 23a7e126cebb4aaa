use tracing::{Level, debug, error, info, trace, warn};

use crate::config::LogObserverConfig;
use crate::error::{AdEventError, Result};

use super::{AdEventObserver, AdEventOutcome};

pub(super) struct LogObserver {
    name: String,
    config: LogObserverConfig,
}

impl LogObserver {
    pub(super) fn new(name: Option<String>, config: LogObserverConfig) -> Self {
        Self {
            name: name.unwrap_or_else(|| "log".to_string()),
            config,
        }
    }

    fn level(&self) -> Result<Level> {
        match self.config.level.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => Err(AdEventError::Config(format!(
                "unsupported log level '{}'",
                other
            ))),
        }
    }

    fn format_message(&self, outcome: &AdEventOutcome) -> String {
        match outcome {
            AdEventOutcome::Served(placement)
            | AdEventOutcome::Viewed(placement)
            | AdEventOutcome::Clicked(placement) => {
                if let Some(template) = &self.config.template {
                    template
                        .replace("{placement}", &placement.placement_id)
                        .replace("{creative}", &placement.creative_instance_id)
                        .replace("{outcome}", outcome_label(outcome))
                } else {
                    format!(
                        "outcome={} placement={} creative={} ad_type={}",
                        outcome_label(outcome),
                        placement.placement_id,
                        placement.creative_instance_id,
                        placement.ad_type
                    )
                }
            }
            AdEventOutcome::Failed {
                placement_id,
                creative_instance_id,
                event_type,
            } => format!(
                "outcome=failed placement={} creative={} event_type={}",
                placement_id, creative_instance_id, event_type
            ),
        }
    }

    fn log(&self, level: Level, message: String) {
        match level {
            Level::TRACE => trace!(target: "adpulse.observer.log", "{}", message),
            Level::DEBUG => debug!(target: "adpulse.observer.log", "{}", message),
            Level::INFO => info!(target: "adpulse.observer.log", "{}", message),
            Level::WARN => warn!(target: "adpulse.observer.log", "{}", message),
            Level::ERROR => error!(target: "adpulse.observer.log", "{}", message),
        }
    }
}

fn outcome_label(outcome: &AdEventOutcome) -> &'static str {
    match outcome {
        AdEventOutcome::Served(_) => "served",
        AdEventOutcome::Viewed(_) => "viewed",
        AdEventOutcome::Clicked(_) => "clicked",
        AdEventOutcome::Failed { .. } => "failed",
    }
}

impl AdEventObserver for LogObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, outcome: &AdEventOutcome) -> Result<()> {
        let level = self.level()?;
        let message = self.format_message(outcome);
        self.log(level, message);
        Ok(())
    }
}
