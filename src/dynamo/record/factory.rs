//! Record factories
//!
//! A factory owns the schema of the record type it produces and hands the
//! engine one fresh record per call. Factories are registered by name next
//! to their record type; `ObjectFactory` is the sentinel for "no factory,
//! create blank values".

use super::{FieldKind, FieldSpec, FieldValue, Record, RecordSchema};
use chrono::Utc;
use rand::Rng;

/// Producer of records of a single declared type.
pub trait RecordFactory: Send + Sync {
    /// Schema of the records this factory creates.
    fn schema(&self) -> &RecordSchema;

    /// Create one fresh record. Deterministic in shape, not in value.
    fn create(&self) -> Record;
}

const PLAYERS: &[&str] = &[
    "ada", "grace", "alan", "edsger", "barbara", "donald", "tony", "radia",
];

const ACTIONS: &[&str] = &[
    "spawn", "move", "attack", "defend", "trade", "score", "quit",
];

/// Factory for the demo `GameEvent` record type: a player performing an
/// action at a point in time.
pub struct GameEventFactory {
    schema: RecordSchema,
}

impl GameEventFactory {
    pub fn new() -> Self {
        GameEventFactory {
            schema: RecordSchema::new(
                "GameEvent",
                vec![
                    FieldSpec::new("event_id", FieldKind::Integer),
                    FieldSpec::new("player", FieldKind::String),
                    FieldSpec::new("action", FieldKind::String),
                    FieldSpec::new("score", FieldKind::Integer),
                    FieldSpec::new("timestamp", FieldKind::Timestamp),
                ],
            ),
        }
    }
}

impl Default for GameEventFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordFactory for GameEventFactory {
    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn create(&self) -> Record {
        let mut rng = rand::thread_rng();

        Record::new()
            .with("event_id", FieldValue::Integer(rng.gen_range(0..i64::MAX)))
            .with(
                "player",
                FieldValue::String(PLAYERS[rng.gen_range(0..PLAYERS.len())].to_string()),
            )
            .with(
                "action",
                FieldValue::String(ACTIONS[rng.gen_range(0..ACTIONS.len())].to_string()),
            )
            .with("score", FieldValue::Integer(rng.gen_range(0..10_000)))
            .with("timestamp", FieldValue::Timestamp(Utc::now()))
    }
}

/// Sentinel factory producing blank records with an empty schema.
pub struct ObjectFactory {
    schema: RecordSchema,
}

impl ObjectFactory {
    pub fn new() -> Self {
        ObjectFactory {
            schema: RecordSchema::new("Object", Vec::new()),
        }
    }
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordFactory for ObjectFactory {
    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn create(&self) -> Record {
        Record::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_event_matches_its_schema() {
        let factory = GameEventFactory::new();
        let record = factory.create();

        assert_eq!(record.len(), factory.schema().fields.len());
        for (spec, (name, value)) in factory.schema().fields.iter().zip(record.iter()) {
            assert_eq!(spec.name, name);
            assert_eq!(spec.kind, value.kind());
        }
    }

    #[test]
    fn test_object_factory_creates_blank_records() {
        let factory = ObjectFactory::new();
        assert!(factory.create().is_empty());
        assert!(factory.schema().fields.is_empty());
    }
}
