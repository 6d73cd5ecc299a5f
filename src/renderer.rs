//! The renderer contract (spec §4.C) and two minimal reference renderers.

use serde_json::Value;

use crate::error::{ErrorContext, KoLogError};
use crate::record::EventData;

/// `render(event_data) -> payload`, pure with respect to event data. A
/// renderer may also signal [`Flow::Drop`], equivalent to a processor drop.
pub trait Renderer: Send + Sync {
    fn render(&self, data: &EventData) -> Result<RenderOutcome, KoLogError>;
}

/// The result of rendering: either a finite payload, or a drop signal.
pub enum RenderOutcome {
    Payload(String),
    Drop,
}

/// Renders the `event` field as plain text. This is the renderer the spec's
/// own scenario 1 assumes ("a renderer that emits `event` and newline");
/// shipped because a dispatch subsystem with no usable renderer at all isn't
/// a usable crate, not because renderer content is in scope generally.
pub struct LineRenderer;

impl Renderer for LineRenderer {
    fn render(&self, data: &EventData) -> Result<RenderOutcome, KoLogError> {
        let text = match data.get("event") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(KoLogError::Renderer {
                    message: "event data has no 'event' field".to_string(),
                    context: ErrorContext::new(),
                });
            }
        };
        Ok(RenderOutcome::Payload(text))
    }
}

/// Serializes the entire event-data map as one JSON line.
pub struct JsonRenderer {
    pub pretty: bool,
}

impl Renderer for JsonRenderer {
    fn render(&self, data: &EventData) -> Result<RenderOutcome, KoLogError> {
        let as_map: serde_json::Map<String, Value> =
            data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let value = Value::Object(as_map);
        let text = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .map_err(|e| KoLogError::Renderer {
            message: format!("failed to serialize event data: {e}"),
            context: ErrorContext::new(),
        })?;
        Ok(RenderOutcome::Payload(text))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::levels::Level;

    /// A renderer that signals drop for any event whose `level` field
    /// equals the configured threshold, otherwise delegates to
    /// [`LineRenderer`]. Mirrors
    /// [`crate::processor::test_support::DropLevelProcessor`] but for the
    /// renderer side of spec §4.C's drop contract; not part of the public
    /// API, since built-in renderer content is out of scope (spec §1).
    pub struct DropLevelRenderer {
        pub level_to_drop: Level,
    }

    impl Renderer for DropLevelRenderer {
        fn render(&self, data: &EventData) -> Result<RenderOutcome, KoLogError> {
            if data.get("level").and_then(Value::as_str) == Some(self.level_to_drop.as_str()) {
                return Ok(RenderOutcome::Drop);
            }
            LineRenderer.render(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_with_event(text: &str) -> EventData {
        let mut data = EventData::default();
        data.insert("event".to_string(), Value::String(text.to_string()));
        data
    }

    #[test]
    fn line_renderer_emits_event_field() {
        let data = data_with_event("hello");
        match LineRenderer.render(&data).unwrap() {
            RenderOutcome::Payload(text) => assert_eq!(text, "hello"),
            RenderOutcome::Drop => panic!("expected payload"),
        }
    }

    #[test]
    fn line_renderer_errors_without_event_field() {
        let data = EventData::default();
        assert!(LineRenderer.render(&data).is_err());
    }

    #[test]
    fn json_renderer_serializes_all_fields() {
        let mut data = data_with_event("hello");
        data.insert("name".to_string(), Value::String("app".to_string()));
        let text = match JsonRenderer { pretty: false }.render(&data).unwrap() {
            RenderOutcome::Payload(text) => text,
            RenderOutcome::Drop => panic!("expected payload"),
        };
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["event"], Value::String("hello".to_string()));
        assert_eq!(parsed["name"], Value::String("app".to_string()));
    }
}
