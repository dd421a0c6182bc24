//! Feature extraction for (task, annotator) pairs.

use annoroute_models::{Annotator, FeatureVector, Task};

/// Rolling quality assumed for annotators with no history.
pub const NEUTRAL_QUALITY: f64 = 0.5;

/// True when the task states no cultural context or the annotator matches it.
pub fn cultural_match(task: &Task, annotator: &Annotator) -> bool {
    task.requirements
        .cultural_context
        .as_deref()
        .map(|context| annotator.matches_culture(context))
        .unwrap_or(true)
}

/// Builds the fixed feature vector for a pair.
pub fn extract_features(task: &Task, annotator: &Annotator) -> FeatureVector {
    FeatureVector {
        task_complexity: task.complexity_score,
        annotator_skill: annotator.skill_for(&task.task_type),
        rolling_quality: annotator.rolling_average().unwrap_or(NEUTRAL_QUALITY),
        current_workload: annotator.current_workload as f64,
        cultural_match: if cultural_match(task, annotator) { 1.0 } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_features() {
        let task = Task::builder("x", "translation")
            .complexity(0.7)
            .cultural_context("Andean")
            .build();
        let annotator = Annotator::builder("A1")
            .capacity(3)
            .workload(2)
            .skill("translation", 0.9)
            .history([0.6, 0.8])
            .cultural_background("andean highlands")
            .build();

        let f = extract_features(&task, &annotator);

        assert_eq!(f.task_complexity, 0.7);
        assert_eq!(f.annotator_skill, 0.9);
        assert!((f.rolling_quality - 0.7).abs() < 1e-9);
        assert_eq!(f.current_workload, 2.0);
        assert_eq!(f.cultural_match, 1.0);
    }

    #[test]
    fn test_defaults_for_new_annotator() {
        let task = Task::builder("x", "qa").cultural_context("Nordic").build();
        let annotator = Annotator::new("A1", 1);

        let f = extract_features(&task, &annotator);

        assert_eq!(f.annotator_skill, 0.0);
        assert_eq!(f.rolling_quality, NEUTRAL_QUALITY);
        assert_eq!(f.cultural_match, 0.0);
    }

    #[test]
    fn test_no_context_always_matches() {
        let task = Task::new("x", "qa");
        assert!(cultural_match(&task, &Annotator::new("A1", 1)));
    }
}
