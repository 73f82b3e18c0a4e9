//! Exercise tag vocabularies
//!
//! Workout records may carry free-text type, muscle group and equipment tags.
//! The advanced feature extractor one-hot encodes them against these fixed
//! vocabularies, so the column set never depends on what the user typed.

use serde::{Deserialize, Serialize};

/// Movement classification of an exercise
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Compound,
    Isolation,
    Cardio,
    Strength,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Compound => "compound",
            ExerciseType::Isolation => "isolation",
            ExerciseType::Cardio => "cardio",
            ExerciseType::Strength => "strength",
        }
    }

    pub fn all() -> &'static [ExerciseType] {
        &[
            ExerciseType::Compound,
            ExerciseType::Isolation,
            ExerciseType::Cardio,
            ExerciseType::Strength,
        ]
    }
}

/// Muscle groups for contextual features
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MuscleGroup {
    Chest,
    Back,
    Legs,
    Shoulders,
    Arms,
    Core,
}

impl MuscleGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "chest",
            MuscleGroup::Back => "back",
            MuscleGroup::Legs => "legs",
            MuscleGroup::Shoulders => "shoulders",
            MuscleGroup::Arms => "arms",
            MuscleGroup::Core => "core",
        }
    }

    /// All muscle groups for iteration
    pub fn all() -> &'static [MuscleGroup] {
        &[
            MuscleGroup::Chest,
            MuscleGroup::Back,
            MuscleGroup::Legs,
            MuscleGroup::Shoulders,
            MuscleGroup::Arms,
            MuscleGroup::Core,
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Equipment {
    Barbell,
    Dumbbell,
    Machine,
    Bodyweight,
    Cable,
}

impl Equipment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Equipment::Barbell => "barbell",
            Equipment::Dumbbell => "dumbbell",
            Equipment::Machine => "machine",
            Equipment::Bodyweight => "bodyweight",
            Equipment::Cable => "cable",
        }
    }

    pub fn all() -> &'static [Equipment] {
        &[
            Equipment::Barbell,
            Equipment::Dumbbell,
            Equipment::Machine,
            Equipment::Bodyweight,
            Equipment::Cable,
        ]
    }
}

/// True when a free-text tag contains the vocabulary term as a whole word
/// (case-insensitive).
///
/// "Barbell / Rack" and "upper chest" match; "forearms" does not mention "arms".
pub fn tag_mentions(tag: Option<&str>, term: &str) -> bool {
    let Some(tag) = tag else { return false };
    tag.split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case(term))
}
