//! Eligibility filtering.

use std::collections::BTreeSet;

use annoroute_models::{Annotator, Task};

/// Constraints an annotator must meet to be offered a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EligibilityQuery {
    /// Skill category that must reach `min_skill`.
    pub task_type: String,
    /// Every one of these must be spoken.
    pub languages: BTreeSet<String>,
    /// Background must share a word with this context.
    pub cultural_context: Option<String>,
    /// Minimum skill score for `task_type`.
    pub min_skill: f64,
}

impl EligibilityQuery {
    /// Creates a query for a task type with no other constraints.
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    /// Builds the query from a task's type and requirements.
    ///
    /// The cultural context is left out; callers that treat it as a hard
    /// constraint add it with [`EligibilityQuery::with_cultural_context`].
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_type: task.task_type.clone(),
            languages: task.requirements.languages.clone(),
            cultural_context: None,
            min_skill: task.requirements.min_skill,
        }
    }

    /// Adds a required language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.insert(language.into());
        self
    }

    /// Sets the required cultural context.
    pub fn with_cultural_context(mut self, context: impl Into<String>) -> Self {
        self.cultural_context = Some(context.into());
        self
    }

    /// Sets the minimum skill.
    pub fn with_min_skill(mut self, min_skill: f64) -> Self {
        self.min_skill = min_skill;
        self
    }

    /// Returns true if the annotator satisfies every constraint.
    ///
    /// Offline and Busy annotators, and annotators at capacity, never match.
    pub fn admits(&self, annotator: &Annotator) -> bool {
        if !annotator.accepts_work() {
            return false;
        }

        if annotator.skill_for(&self.task_type) < self.min_skill {
            return false;
        }

        if !annotator.speaks_all(&self.languages) {
            return false;
        }

        if let Some(ref context) = self.cultural_context {
            if !annotator.matches_culture(context) {
                return false;
            }
        }

        true
    }
}
