//! engine node

use crate::error::{DefinitionError, Result};
use crate::model::EngineSettings;
use kdl::{KdlNode, KdlValue};
use std::time::Duration;

/// Parse `5`, `"5s"`, `"500ms"`, `"20m"` or `"1h"`; bare integers are seconds
pub fn parse_duration(value: &KdlValue) -> Result<Duration> {
    if let Some(secs) = value.as_integer() {
        let secs = u64::try_from(secs)
            .map_err(|_| DefinitionError::InvalidConfig(format!("invalid duration: {}", secs)))?;
        return Ok(Duration::from_secs(secs));
    }

    let text = value
        .as_string()
        .ok_or_else(|| DefinitionError::InvalidConfig(format!("invalid duration: {}", value)))?
        .trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: u64 = number
        .parse()
        .map_err(|_| DefinitionError::InvalidConfig(format!("invalid duration: {}", text)))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(number)),
        "ms" => Ok(Duration::from_millis(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        "h" => Ok(Duration::from_secs(number * 3600)),
        _ => Err(DefinitionError::InvalidConfig(format!(
            "invalid duration unit: {}",
            text
        ))),
    }
}

/// Parse `engine { poll-interval ...; timeout ... }`
pub fn parse_engine(node: &KdlNode) -> Result<EngineSettings> {
    let mut settings = EngineSettings::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let Some(value) = child.entries().first().map(|e| e.value()) else {
                continue;
            };
            match child.name().value() {
                "poll-interval" | "poll_interval" => {
                    settings.poll_interval = parse_duration(value)?;
                }
                "timeout" => {
                    settings.timeout = parse_duration(value)?;
                }
                other => {
                    tracing::warn!("Ignoring unknown engine setting '{}'", other);
                }
            }
        }
    }

    if settings.poll_interval.is_zero() {
        return Err(DefinitionError::InvalidConfig(
            "poll-interval must be greater than zero".to_string(),
        ));
    }
    Ok(settings)
}
