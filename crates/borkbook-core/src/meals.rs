use crate::CoreError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const BREAKFAST: &str = "Breakfast";
pub const LUNCH: &str = "Lunch";
pub const DINNER: &str = "Dinner";

/// Slots synthesized for every subject/day in a default schedule, in display order.
pub const DEFAULT_MEAL_SLOTS: [&str; 3] = [BREAKFAST, LUNCH, DINNER];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }

    /// Exact match against the capitalized label; `monday` is not a day.
    pub fn from_label(label: &str) -> Option<Day> {
        Day::ALL.into_iter().find(|day| day.as_str() == label)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper-cases the first character of a meal slot and leaves the rest untouched,
/// so `breakfast` and `Breakfast` address the same flag.
pub fn normalize_meal_slot(slot: &str) -> String {
    let mut chars = slot.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fed flags for one subject on one day, keyed by capitalized slot name.
///
/// Loading accepts legacy lowercase keys and folds them onto the capitalized
/// form; when both spellings are present the capitalized one wins. Entries
/// whose value is not a boolean are carried along untouched in `extra` and
/// written back out after the flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayMeals {
    slots: BTreeMap<String, bool>,
    extra: BTreeMap<String, Value>,
}

impl DayMeals {
    pub fn unfed() -> Self {
        let slots = DEFAULT_MEAL_SLOTS
            .iter()
            .map(|slot| (slot.to_string(), false))
            .collect();
        Self {
            slots,
            extra: BTreeMap::new(),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut meals = DayMeals::default();
        for (key, value) in map {
            match value {
                Value::Bool(fed) => meals.insert_raw(key, fed),
                other => {
                    meals.extra.insert(key, other);
                }
            }
        }
        let DayMeals { slots, extra } = &mut meals;
        extra.retain(|key, _| !slots.contains_key(key));
        meals
    }

    pub fn get(&self, slot: &str) -> Option<bool> {
        self.slots.get(&normalize_meal_slot(slot)).copied()
    }

    pub fn set(&mut self, slot: &str, fed: bool) {
        let slot = normalize_meal_slot(slot);
        self.extra.remove(&slot);
        self.slots.insert(slot, fed);
    }

    /// Number of boolean slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.slots.iter().map(|(slot, fed)| (slot.as_str(), *fed))
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    fn insert_raw(&mut self, key: String, fed: bool) {
        let normalized = normalize_meal_slot(&key);
        if normalized == key {
            self.slots.insert(normalized, fed);
        } else {
            self.slots.entry(normalized).or_insert(fed);
        }
    }
}

impl Serialize for DayMeals {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.slots.len() + self.extra.len()))?;
        for slot in DEFAULT_MEAL_SLOTS {
            if let Some(fed) = self.slots.get(slot) {
                map.serialize_entry(slot, fed)?;
            }
        }
        for (slot, fed) in &self.slots {
            if !DEFAULT_MEAL_SLOTS.contains(&slot.as_str()) {
                map.serialize_entry(slot, fed)?;
            }
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DayMeals {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(DayMeals::from_map)
    }
}

/// One subject's week. Keys that are not exact day labels, or whose value
/// is not an object, stay in `extra` and are never addressable by updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekSchedule {
    pub days: BTreeMap<Day, DayMeals>,
    pub extra: BTreeMap<String, Value>,
}

impl WeekSchedule {
    pub fn unfed() -> Self {
        let days = Day::ALL.iter().map(|day| (*day, DayMeals::unfed())).collect();
        Self {
            days,
            extra: BTreeMap::new(),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut schedule = WeekSchedule::default();
        for (key, value) in map {
            match (Day::from_label(&key), value) {
                (Some(day), Value::Object(meals)) => {
                    schedule.days.insert(day, DayMeals::from_map(meals));
                }
                (_, other) => {
                    schedule.extra.insert(key, other);
                }
            }
        }
        schedule
    }
}

impl Serialize for WeekSchedule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.days.len() + self.extra.len()))?;
        for (day, meals) in &self.days {
            map.serialize_entry(day.as_str(), meals)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WeekSchedule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(WeekSchedule::from_map)
    }
}

/// The whole feeding matrix: subject name → day → slot → fed.
///
/// Any JSON document is accepted. Subjects whose value is not an object are
/// kept in `extra`; a non-object document yields an empty matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MealsSnapshot {
    pub subjects: BTreeMap<String, WeekSchedule>,
    pub extra: BTreeMap<String, Value>,
}

impl MealsSnapshot {
    /// Every listed subject with all seven days and every standard slot unfed.
    pub fn with_defaults<S: AsRef<str>>(subjects: &[S]) -> Self {
        let subjects = subjects
            .iter()
            .map(|name| (name.as_ref().to_string(), WeekSchedule::unfed()))
            .collect();
        Self {
            subjects,
            extra: BTreeMap::new(),
        }
    }

    pub fn from_value(value: Value) -> Self {
        let mut snapshot = MealsSnapshot::default();
        let Value::Object(map) = value else {
            return snapshot;
        };
        for (key, value) in map {
            match value {
                Value::Object(week) => {
                    snapshot.subjects.insert(key, WeekSchedule::from_map(week));
                }
                other => {
                    snapshot.extra.insert(key, other);
                }
            }
        }
        snapshot
    }

    pub fn subject_names(&self) -> Vec<String> {
        self.subjects.keys().cloned().collect()
    }

    pub fn fed(&self, subject: &str, day: Day, slot: &str) -> Option<bool> {
        self.subjects
            .get(subject)
            .and_then(|schedule| schedule.days.get(&day))
            .and_then(|meals| meals.get(slot))
    }

    /// Sets one slot flag. The subject and the day must already exist; the
    /// slot itself is inserted when it is not yet present.
    pub fn set_fed(
        &mut self,
        subject: &str,
        day: &str,
        slot: &str,
        fed: bool,
    ) -> Result<(), CoreError> {
        let invalid = || CoreError::InvalidTarget {
            subject: subject.to_string(),
            day: day.to_string(),
        };
        if slot.trim().is_empty() {
            return Err(invalid());
        }
        let parsed_day = Day::from_label(day).ok_or_else(invalid)?;
        let meals = self
            .subjects
            .get_mut(subject)
            .and_then(|schedule| schedule.days.get_mut(&parsed_day))
            .ok_or_else(invalid)?;
        meals.set(slot, fed);
        Ok(())
    }
}

impl Serialize for MealsSnapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.subjects.len() + self.extra.len()))?;
        for (subject, schedule) in &self.subjects {
            map.serialize_entry(subject, schedule)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MealsSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(MealsSnapshot::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_only_touches_first_character() {
        assert_eq!(normalize_meal_slot("breakfast"), "Breakfast");
        assert_eq!(normalize_meal_slot("Dinner"), "Dinner");
        assert_eq!(normalize_meal_slot("lUNCH"), "LUNCH");
        assert_eq!(normalize_meal_slot("ältere"), "Ältere");
        assert_eq!(normalize_meal_slot(""), "");
    }

    #[test]
    fn day_labels_match_exactly() {
        assert_eq!(Day::from_label("Monday"), Some(Day::Monday));
        assert_eq!(Day::from_label("Sunday"), Some(Day::Sunday));
        assert_eq!(Day::from_label("monday"), None);
        assert_eq!(Day::from_label(" Sunday "), None);
        assert_eq!(Day::from_label("Funday"), None);
    }

    #[test]
    fn set_fed_rejects_day_label_in_other_case() {
        let mut snapshot = MealsSnapshot::with_defaults(&["Tucker"]);
        let before = snapshot.clone();
        for day in ["monday", " Monday ", "MONDAY"] {
            let err = snapshot
                .set_fed("Tucker", day, "Breakfast", true)
                .expect_err("day must match exactly");
            assert!(matches!(err, CoreError::InvalidTarget { .. }));
        }
        assert_eq!(snapshot, before);
    }

    #[test]
    fn defaults_cover_every_day_and_slot() {
        let snapshot = MealsSnapshot::with_defaults(&["Precious", "Tucker"]);
        assert_eq!(snapshot.subjects.len(), 2);
        for schedule in snapshot.subjects.values() {
            assert_eq!(schedule.days.len(), 7);
            for meals in schedule.days.values() {
                assert_eq!(meals.len(), 3);
                assert!(meals.iter().all(|(_, fed)| !fed));
            }
        }
    }

    #[test]
    fn set_fed_normalizes_slot_case() {
        let mut lower = MealsSnapshot::with_defaults(&["Tucker"]);
        let mut upper = lower.clone();
        lower
            .set_fed("Tucker", "Monday", "breakfast", true)
            .expect("lowercase slot");
        upper
            .set_fed("Tucker", "Monday", "Breakfast", true)
            .expect("capitalized slot");
        assert_eq!(lower, upper);
        assert_eq!(lower.fed("Tucker", Day::Monday, BREAKFAST), Some(true));
    }

    #[test]
    fn set_fed_inserts_unknown_slot() {
        let mut snapshot = MealsSnapshot::with_defaults(&["Tucker"]);
        snapshot
            .set_fed("Tucker", "Friday", "snack", true)
            .expect("novel slot");
        assert_eq!(snapshot.fed("Tucker", Day::Friday, "Snack"), Some(true));
        assert_eq!(snapshot.subjects["Tucker"].days[&Day::Friday].len(), 4);
    }

    #[test]
    fn set_fed_rejects_unknown_subject_and_missing_day() {
        let mut snapshot: MealsSnapshot = serde_json::from_value(serde_json::json!({
            "Precious": { "Monday": { "Breakfast": false } }
        }))
        .expect("parse snapshot");
        let before = snapshot.clone();

        let err = snapshot
            .set_fed("Rex", "Monday", "Breakfast", true)
            .expect_err("unknown subject");
        assert!(matches!(err, CoreError::InvalidTarget { .. }));
        assert!(snapshot
            .set_fed("Precious", "Tuesday", "Breakfast", true)
            .is_err());
        assert!(snapshot
            .set_fed("Precious", "Caturday", "Breakfast", true)
            .is_err());
        assert!(snapshot.set_fed("Precious", "Monday", "  ", true).is_err());
        assert_eq!(snapshot, before);
    }

    #[test]
    fn legacy_lowercase_keys_fold_onto_capitalized() {
        let meals: DayMeals = serde_json::from_value(serde_json::json!({
            "breakfast": true,
            "Lunch": false,
            "dinner": true,
            "Dinner": false
        }))
        .expect("parse day");
        assert_eq!(meals.get(BREAKFAST), Some(true));
        assert_eq!(meals.get(DINNER), Some(false));
        assert_eq!(meals.len(), 3);

        let written = serde_json::to_string(&meals).expect("serialize");
        assert_eq!(
            written,
            r#"{"Breakfast":true,"Lunch":false,"Dinner":false}"#
        );
    }

    #[test]
    fn week_serializes_all_seven_days() {
        let snapshot = MealsSnapshot::with_defaults(&["Tucker"]);
        let value = serde_json::to_value(&snapshot).expect("serialize");
        let days: Vec<_> = value["Tucker"]
            .as_object()
            .expect("week object")
            .keys()
            .cloned()
            .collect();
        assert_eq!(days.len(), 7);
        assert!(days.contains(&"Monday".to_string()));
        assert!(days.contains(&"Sunday".to_string()));
    }

    #[test]
    fn unexpected_shapes_are_kept_not_rejected() {
        let raw = serde_json::json!({
            "Precious": {
                "Monday": { "breakfast": true, "lunch": null, "dinner": true },
                "monday": { "Breakfast": false },
                "Notes": "picky eater"
            },
            "version": 2
        });
        let snapshot: MealsSnapshot = serde_json::from_value(raw.clone()).expect("parse snapshot");

        assert_eq!(snapshot.fed("Precious", Day::Monday, BREAKFAST), Some(true));
        assert_eq!(snapshot.fed("Precious", Day::Monday, LUNCH), None);
        let week = &snapshot.subjects["Precious"];
        assert_eq!(week.days.len(), 1);
        assert!(week.extra.contains_key("monday"));
        assert_eq!(snapshot.extra["version"], serde_json::json!(2));

        let written = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(
            written["Precious"]["Monday"].get("lunch"),
            Some(&serde_json::Value::Null)
        );
        assert_eq!(written["Precious"]["monday"], raw["Precious"]["monday"]);
        assert_eq!(written["Precious"]["Notes"], "picky eater");
        assert_eq!(written["version"], 2);
    }

    #[test]
    fn setting_a_slot_replaces_its_non_bool_value() {
        let mut snapshot: MealsSnapshot = serde_json::from_value(serde_json::json!({
            "Tucker": { "Friday": { "Lunch": "maybe" } }
        }))
        .expect("parse snapshot");
        snapshot
            .set_fed("Tucker", "Friday", "lunch", true)
            .expect("existing day");

        let meals = &snapshot.subjects["Tucker"].days[&Day::Friday];
        assert_eq!(meals.get(LUNCH), Some(true));
        assert!(meals.extra().is_empty());
        assert_eq!(
            serde_json::to_string(meals).expect("serialize"),
            r#"{"Lunch":true}"#
        );
    }

    #[test]
    fn non_object_document_is_an_empty_matrix() {
        let snapshot: MealsSnapshot =
            serde_json::from_str("[1, 2, 3]").expect("any json is accepted");
        assert!(snapshot.subjects.is_empty());
    }
}
