//! Workout log data model
//!
//! Sessions and profiles arrive as loosely-shaped JSON from the transport
//! layer. Every type here deserializes through `serde_json::Value` so that
//! malformed fields fall back to neutral defaults instead of failing the
//! request.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body weight assumed when the profile does not carry one
pub const DEFAULT_BODY_WEIGHT: f64 = 70.0;

/// Upper bound on sets expanded from a flat row's `sets` count
const MAX_FLAT_SETS: f64 = 50.0;

/// One performed set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct SetRecord {
    pub weight: f64,
    pub reps: f64,
}

impl SetRecord {
    pub fn new(weight: f64, reps: f64) -> Self {
        Self {
            weight: non_negative(weight),
            reps: non_negative(reps),
        }
    }

    pub fn volume(&self) -> f64 {
        self.weight * self.reps
    }
}

impl From<Value> for SetRecord {
    fn from(value: Value) -> Self {
        SetRecord::new(
            number_field(&value, &["weight"]).unwrap_or(0.0),
            number_field(&value, &["reps"]).unwrap_or(0.0),
        )
    }
}

/// One exercise inside a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct ExerciseRecord {
    pub name: String,
    pub sets: Vec<SetRecord>,
    pub exercise_type: Option<String>,
    pub muscle_group: Option<String>,
    pub equipment: Option<String>,
}

impl ExerciseRecord {
    pub fn new(name: &str, sets: Vec<SetRecord>) -> Self {
        Self {
            name: name.to_string(),
            sets,
            exercise_type: None,
            muscle_group: None,
            equipment: None,
        }
    }

    /// Case-insensitive name match, ignoring surrounding whitespace
    pub fn matches(&self, exercise: &str) -> bool {
        normalize_name(&self.name) == normalize_name(exercise)
    }

    /// Heaviest set weight, 0 when there are no sets
    pub fn max_weight(&self) -> f64 {
        self.sets.iter().map(|s| s.weight).fold(0.0, f64::max)
    }

    /// Sum of weight x reps over all sets
    pub fn volume(&self) -> f64 {
        self.sets.iter().map(SetRecord::volume).sum()
    }

    pub fn mean_reps(&self) -> f64 {
        if self.sets.is_empty() {
            return 0.0;
        }
        self.sets.iter().map(|s| s.reps).sum::<f64>() / self.sets.len() as f64
    }
}

impl From<Value> for ExerciseRecord {
    fn from(value: Value) -> Self {
        let sets = match value.get("sets") {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| number_field(item, &["weight"]).is_some())
                .cloned()
                .map(SetRecord::from)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            name: string_field(&value, &["name", "exercise", "exercise_name"]).unwrap_or_default(),
            sets,
            exercise_type: string_field(&value, &["exercise_type", "type"]),
            muscle_group: string_field(&value, &["muscle_group", "muscle"]),
            equipment: string_field(&value, &["equipment"]),
        }
    }
}

/// A dated training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct WorkoutSession {
    pub date: Option<NaiveDateTime>,
    pub exercises: Vec<ExerciseRecord>,
    /// Session duration in minutes
    pub duration: Option<f64>,
}

impl WorkoutSession {
    pub fn new(date: Option<NaiveDateTime>, exercises: Vec<ExerciseRecord>) -> Self {
        Self {
            date,
            exercises,
            duration: None,
        }
    }

    /// Parse a flat legacy row (`{"weight": 80, "reps": 8, "sets": 3, ...}`)
    /// into a single-exercise session.
    fn from_flat_row(value: &Value) -> Option<Self> {
        let weight = number_field(value, &["weight"])?;
        let reps = number_field(value, &["reps"]).unwrap_or(0.0);
        let set_count = number_field(value, &["sets"]).unwrap_or(1.0).clamp(1.0, MAX_FLAT_SETS) as usize;

        let mut record = ExerciseRecord::new(
            &string_field(value, &["exercise", "exercise_name", "name"]).unwrap_or_default(),
            vec![SetRecord::new(weight, reps); set_count],
        );
        record.exercise_type = string_field(value, &["exercise_type"]);
        record.muscle_group = string_field(value, &["muscle_group"]);
        record.equipment = string_field(value, &["equipment"]);

        Some(Self {
            date: value.get("date").and_then(parse_date),
            exercises: vec![record],
            duration: number_field(value, &["duration"]),
        })
    }
}

impl From<Value> for WorkoutSession {
    fn from(value: Value) -> Self {
        let exercises = match value.get("exercises") {
            Some(Value::Array(items)) => items.iter().cloned().map(ExerciseRecord::from).collect(),
            _ => {
                if let Some(session) = Self::from_flat_row(&value) {
                    return session;
                }
                Vec::new()
            }
        };

        Self {
            date: value.get("date").and_then(parse_date),
            exercises,
            duration: number_field(&value, &["duration"]),
        }
    }
}

/// Training experience of the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    /// Ordinal used as a numeric feature (1..=3)
    pub fn numeric(&self) -> f64 {
        match self {
            ExperienceLevel::Beginner => 1.0,
            ExperienceLevel::Intermediate => 2.0,
            ExperienceLevel::Advanced => 3.0,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(ExperienceLevel::Beginner),
            "intermediate" => Some(ExperienceLevel::Intermediate),
            "advanced" => Some(ExperienceLevel::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Strength,
    Hypertrophy,
    Endurance,
}

impl Goal {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "strength" => Some(Goal::Strength),
            "hypertrophy" => Some(Goal::Hypertrophy),
            "endurance" => Some(Goal::Endurance),
            _ => None,
        }
    }
}

/// Per-request user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct UserProfile {
    /// Working weight currently used for the requested exercise
    pub current_weight: f64,
    pub level: ExperienceLevel,
    pub goals: BTreeSet<Goal>,
    pub body_weight: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            current_weight: 0.0,
            level: ExperienceLevel::default(),
            goals: BTreeSet::new(),
            body_weight: DEFAULT_BODY_WEIGHT,
        }
    }
}

impl UserProfile {
    pub fn with_current_weight(current_weight: f64) -> Self {
        Self {
            current_weight: non_negative(current_weight),
            ..Self::default()
        }
    }
}

impl From<Value> for UserProfile {
    fn from(value: Value) -> Self {
        let goals = match value.get("goals") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).filter_map(Goal::parse).collect(),
            Some(Value::String(s)) => s.split(',').filter_map(Goal::parse).collect(),
            _ => BTreeSet::new(),
        };

        let body_weight = number_field(&value, &["body_weight", "bodyWeight", "weight"])
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_BODY_WEIGHT);

        Self {
            current_weight: number_field(&value, &["current_weight", "currentWeight"])
                .map(non_negative)
                .unwrap_or(0.0),
            level: string_field(&value, &["level", "experience_level"])
                .and_then(|s| ExperienceLevel::parse(&s))
                .unwrap_or_default(),
            goals,
            body_weight,
        }
    }
}

/// Restrict a history to one exercise, dropping sessions where it was not trained
pub fn history_for_exercise(history: &[WorkoutSession], exercise: &str) -> Vec<WorkoutSession> {
    history
        .iter()
        .filter_map(|session| {
            let exercises: Vec<_> = session
                .exercises
                .iter()
                .filter(|e| e.matches(exercise))
                .cloned()
                .collect();
            if exercises.is_empty() {
                None
            } else {
                Some(WorkoutSession {
                    date: session.date,
                    exercises,
                    duration: session.duration,
                })
            }
        })
        .collect()
}

/// Distinct exercise names in first-seen order
pub fn exercise_names(history: &[WorkoutSession]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in history.iter().flat_map(|s| &s.exercises) {
        if record.name.trim().is_empty() {
            continue;
        }
        if !names.iter().any(|n| normalize_name(n) == normalize_name(&record.name)) {
            names.push(record.name.clone());
        }
    }
    names
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn non_negative(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 { x } else { 0.0 }
}

/// First present key that holds a number or a numeric string
fn number_field(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
    .filter(|x| x.is_finite())
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key)?.as_str().map(str::to_string))
        .filter(|s| !s.trim().is_empty())
}

fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
