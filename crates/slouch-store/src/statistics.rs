//! Loading and saving the statistics record and the selected activity.
//!
//! A missing or malformed record is never an error: it is logged and the
//! default record is used, so a corrupt store cannot stop accounting.

use std::collections::HashMap;

use serde_json::Value;
use slouch_core::{Activity, StatisticsRecord};

use crate::{KeyValueStore, StoreError};

/// Key holding the serialized [`StatisticsRecord`].
pub const STATISTICS_KEY: &str = "statistics";

/// Key holding the last selected activity.
pub const CURRENT_ACTIVITY_KEY: &str = "currentActivity";

/// Loads the statistics record, falling back to defaults if it is absent or
/// invalid. Only store failures are returned as errors.
pub fn load_statistics<S: KeyValueStore + ?Sized>(
    store: &S,
) -> Result<StatisticsRecord, StoreError> {
    let value = match store.get(&[STATISTICS_KEY]) {
        Ok(mut values) => values.remove(STATISTICS_KEY),
        Err(StoreError::Json { source, .. }) => {
            tracing::warn!(error = %source, "stored statistics are not valid JSON, using defaults");
            return Ok(StatisticsRecord::default());
        }
        Err(e) => return Err(e),
    };

    let Some(value) = value else {
        tracing::debug!("no stored statistics, starting fresh");
        return Ok(StatisticsRecord::default());
    };

    match serde_json::from_value::<StatisticsRecord>(value) {
        Ok(mut record) => {
            record.normalize();
            Ok(record)
        }
        Err(e) => {
            tracing::warn!(error = %e, "stored statistics record is invalid, using defaults");
            Ok(StatisticsRecord::default())
        }
    }
}

/// Writes the statistics record.
pub fn save_statistics<S: KeyValueStore + ?Sized>(
    store: &mut S,
    record: &StatisticsRecord,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(record).map_err(|source| StoreError::Json {
        key: STATISTICS_KEY.to_string(),
        source,
    })?;
    store.set(HashMap::from([(STATISTICS_KEY.to_string(), value)]))
}

/// Deletes all stored statistics and the remembered activity.
pub fn clear_statistics<S: KeyValueStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    store.remove(&[STATISTICS_KEY, CURRENT_ACTIVITY_KEY])
}

/// Loads the remembered activity. Unknown values are treated as unset.
pub fn load_current_activity<S: KeyValueStore + ?Sized>(
    store: &S,
) -> Result<Option<Activity>, StoreError> {
    let mut values = store.get(&[CURRENT_ACTIVITY_KEY])?;
    let activity = match values.remove(CURRENT_ACTIVITY_KEY) {
        Some(Value::String(label)) => match label.parse() {
            Ok(activity) => Some(activity),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored activity");
                None
            }
        },
        Some(other) => {
            tracing::warn!(value = %other, "ignoring stored activity");
            None
        }
        None => None,
    };
    Ok(activity)
}

/// Remembers the selected activity; `None` forgets it.
pub fn save_current_activity<S: KeyValueStore + ?Sized>(
    store: &mut S,
    activity: Option<Activity>,
) -> Result<(), StoreError> {
    match activity {
        Some(activity) => store.set(HashMap::from([(
            CURRENT_ACTIVITY_KEY.to_string(),
            Value::String(activity.to_string()),
        )])),
        None => store.remove(&[CURRENT_ACTIVITY_KEY]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, SqliteStore};
    use serde_json::json;

    #[test]
    fn missing_record_loads_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load_statistics(&store).unwrap(), StatisticsRecord::default());
    }

    #[test]
    fn malformed_record_loads_defaults() {
        let mut store = MemoryStore::new();
        store
            .set(HashMap::from([(
                STATISTICS_KEY.to_string(),
                json!({"dailyDuration": "not a number"}),
            )]))
            .unwrap();
        assert_eq!(load_statistics(&store).unwrap(), StatisticsRecord::default());
    }

    #[test]
    fn non_json_record_loads_defaults() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES ('statistics', 'garbage', '2025-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        assert_eq!(load_statistics(&store).unwrap(), StatisticsRecord::default());
    }

    #[test]
    fn record_roundtrips_through_sqlite() {
        let mut record = StatisticsRecord {
            daily_bad_posture_duration: 40,
            daily_duration: 100,
            last_used_date_str: "2025-01-14".to_string(),
            longest_good_posture_duration: 3600,
            ..StatisticsRecord::default()
        };
        record.roll_over_to("2025-01-15");
        record.cumulative_study_duration.add(10, 20);

        let mut store = SqliteStore::open_in_memory().unwrap();
        save_statistics(&mut store, &record).unwrap();
        let loaded = load_statistics(&store).unwrap();

        assert_eq!(loaded, record);
        assert_eq!(loaded.lowest_bad_posture_percentage, Some(40.0));
    }

    #[test]
    fn loaded_record_is_normalized() {
        let mut store = MemoryStore::new();
        store
            .set(HashMap::from([(
                STATISTICS_KEY.to_string(),
                json!({"dailyBadPostureDuration": 90, "dailyDuration": 30}),
            )]))
            .unwrap();
        let record = load_statistics(&store).unwrap();
        assert_eq!(record.daily_duration, 90);
    }

    #[test]
    fn clear_removes_record_and_activity() {
        let mut store = MemoryStore::new();
        save_statistics(&mut store, &StatisticsRecord::default()).unwrap();
        save_current_activity(&mut store, Some(Activity::Work)).unwrap();

        clear_statistics(&mut store).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn current_activity_roundtrip_and_unset() {
        let mut store = MemoryStore::new();
        assert_eq!(load_current_activity(&store).unwrap(), None);

        save_current_activity(&mut store, Some(Activity::Entertainment)).unwrap();
        assert_eq!(
            load_current_activity(&store).unwrap(),
            Some(Activity::Entertainment)
        );

        save_current_activity(&mut store, None).unwrap();
        assert_eq!(load_current_activity(&store).unwrap(), None);
    }

    #[test]
    fn unknown_stored_activity_is_unset() {
        let mut store = MemoryStore::new();
        store
            .set(HashMap::from([(
                CURRENT_ACTIVITY_KEY.to_string(),
                json!("napping"),
            )]))
            .unwrap();
        assert_eq!(load_current_activity(&store).unwrap(), None);
    }
}
