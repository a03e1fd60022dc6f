//! Application recording, override patterns, auto-revision and
//! cross-position inconsistency detection.

use chrono::Utc;
use gtc45_core::{
    config::LearningConfig,
    error::ValidationError,
    hazard::HazardCategory,
    inconsistency::{detect_inconsistencies, InconsistencySeverity},
    learning::{
        apply_override_pattern, detect_override_pattern, record_application, template_stats,
        ApplicationInput, ApplicationRecord, OverridePattern,
    },
    risk_level::RiskLevels,
    template::Template,
};

fn levels(nd: u32, ne: u32, nc: u32) -> RiskLevels {
    RiskLevels::new(nd, ne, nc).unwrap()
}

fn noise_template() -> Template {
    Template::new(
        "acme",
        HazardCategory::Physical,
        levels(6, 3, 25),
        "Continuous noise near machinery",
        vec!["ruido".into()],
        Utc::now(),
    )
    .unwrap()
}

/// Record each final level against the template's default, threading
/// history and statistics through like the engine does.
fn replay(template: &Template, finals: &[RiskLevels]) -> (Template, Vec<ApplicationRecord>) {
    let mut current = template.clone();
    let mut history = Vec::new();
    for (i, final_levels) in finals.iter().enumerate() {
        let input = ApplicationInput {
            hazard_id: "ges-ruido".into(),
            position_id: format!("pos-{i}"),
            suggested: current.default_levels,
            final_levels: *final_levels,
            override_justification: None,
        };
        let (record, updated) = record_application(&current, &history, &input, Utc::now()).unwrap();
        history.push(record);
        current = updated;
    }
    (current, history)
}

#[test]
fn recording_recomputes_statistics_from_history() {
    let t = noise_template();
    let (updated, history) = replay(
        &t,
        &[levels(6, 3, 25), levels(6, 3, 25), levels(10, 3, 25), levels(6, 3, 25)],
    );
    assert_eq!(updated.applications_count, 4);
    assert!((updated.acceptance_rate - 0.75).abs() < 1e-9);
    assert_eq!(updated.default_levels, t.default_levels);

    let stats = template_stats(&history);
    assert_eq!(stats.applications_count, updated.applications_count);
    assert_eq!(stats.acceptance_rate, updated.acceptance_rate);

    // 450 -> 750
    let override_record = &history[2];
    assert!(!override_record.accepted_unmodified);
    assert!((override_record.deviation_pct - 66.666_666).abs() < 1e-3);
}

#[test]
fn deviation_from_a_zero_suggestion_is_full() {
    let t = Template::new(
        "acme",
        HazardCategory::Locative,
        levels(0, 1, 10),
        "No deficiency found",
        vec![],
        Utc::now(),
    )
    .unwrap();
    let (_, history) = replay(&t, &[levels(0, 4, 100), levels(2, 1, 10)]);
    assert_eq!(history[0].deviation_pct, 0.0);
    assert!(!history[0].accepted_unmodified);
    assert_eq!(history[1].deviation_pct, 100.0);
}

#[test]
fn invalid_final_levels_are_rejected() {
    let t = noise_template();
    let input = ApplicationInput {
        hazard_id: "ges-ruido".into(),
        position_id: "pos-1".into(),
        suggested: t.default_levels,
        final_levels: RiskLevels { nd: 6, ne: 5, nc: 25 },
        override_justification: Some("more exposure".into()),
    };
    let err = record_application(&t, &[], &input, Utc::now()).unwrap_err();
    assert!(matches!(err, ValidationError::OutOfSet { field: "ne", value: 5, .. }));
}

#[test]
fn seventy_percent_override_pattern_is_detected() {
    let t = noise_template();
    let mut finals = vec![levels(10, 3, 25); 7];
    finals.extend([levels(6, 4, 25), levels(2, 3, 25), levels(6, 3, 60)]);
    let (_, history) = replay(&t, &finals);
    assert_eq!(history.len(), 10);

    let pattern = detect_override_pattern(&t, &history, &LearningConfig::default())
        .expect("pattern");
    assert_eq!(pattern.levels, levels(10, 3, 25));
    assert_eq!(pattern.occurrences, 7);
    assert_eq!(pattern.sample_size, 10);
    assert!((pattern.frequency_pct - 70.0).abs() < 1e-9);

    let revised = apply_override_pattern(&t, &pattern, Utc::now()).unwrap();
    assert_eq!(revised.default_levels, levels(10, 3, 25));
    assert!(revised.justification.starts_with(&t.justification));
    assert!(revised.justification.contains("auto-revised"));
    assert_eq!(revised.applications_count, t.applications_count);
    assert_eq!(revised.acceptance_rate, t.acceptance_rate);
}

#[test]
fn revised_defaults_are_not_revised_again() {
    let t = noise_template();
    let mut finals = vec![levels(10, 3, 25); 7];
    finals.extend(vec![levels(6, 4, 25); 3]);
    let (_, history) = replay(&t, &finals);

    let pattern = detect_override_pattern(&t, &history, &LearningConfig::default()).unwrap();
    let revised = apply_override_pattern(&t, &pattern, Utc::now()).unwrap();
    assert_eq!(revised.default_levels, levels(10, 3, 25));

    // The old overrides now match the defaults; the minority (3 of 10)
    // stays below the share threshold.
    assert!(detect_override_pattern(&revised, &history, &LearningConfig::default()).is_none());
}

#[test]
fn out_of_set_pattern_is_rejected_and_template_unchanged() {
    let t = noise_template();
    let pattern = OverridePattern {
        template_id: t.template_id.clone(),
        levels: RiskLevels { nd: 4, ne: 3, nc: 25 },
        occurrences: 7,
        sample_size: 10,
        frequency_pct: 70.0,
    };
    let before = t.clone();
    let err = apply_override_pattern(&t, &pattern, Utc::now()).unwrap_err();
    assert!(matches!(err, ValidationError::OutOfSet { field: "nd", value: 4, .. }));
    assert_eq!(t, before);
}

#[test]
fn weak_or_thin_evidence_is_not_a_pattern() {
    let t = noise_template();
    let config = LearningConfig::default();

    // Largest group is 2 of 5 overrides.
    let (_, history) = replay(
        &t,
        &[
            levels(10, 3, 25),
            levels(10, 3, 25),
            levels(6, 4, 25),
            levels(2, 3, 25),
            levels(6, 3, 60),
        ],
    );
    assert!(detect_override_pattern(&t, &history, &config).is_none());

    // Unanimous, but only two overrides.
    let (_, history) = replay(&t, &[levels(10, 3, 25), levels(10, 3, 25), levels(6, 3, 25)]);
    assert!(detect_override_pattern(&t, &history, &config).is_none());

    // Accepted applications never form a pattern.
    let (_, history) = replay(&t, &[levels(6, 3, 25); 12]);
    assert!(detect_override_pattern(&t, &history, &config).is_none());
}

#[test]
fn only_the_most_recent_window_counts() {
    let t = noise_template();
    let mut finals = vec![levels(10, 3, 25); 15];
    finals.extend(vec![levels(6, 4, 25); 20]);
    let (_, history) = replay(&t, &finals);

    let pattern =
        detect_override_pattern(&t, &history, &LearningConfig::default()).unwrap();
    assert_eq!(pattern.levels, levels(6, 4, 25));
    assert_eq!(pattern.sample_size, 20);
    assert_eq!(pattern.occurrences, 20);
}

#[test]
fn ties_go_to_the_most_recent_group() {
    let t = noise_template();
    let config = LearningConfig {
        pattern_min_share: 0.5,
        ..LearningConfig::default()
    };
    let (_, history) = replay(
        &t,
        &[
            levels(10, 3, 25),
            levels(10, 3, 25),
            levels(6, 4, 25),
            levels(6, 4, 25),
        ],
    );
    let pattern = detect_override_pattern(&t, &history, &config).unwrap();
    assert_eq!(pattern.levels, levels(6, 4, 25));
    assert_eq!(pattern.occurrences, 2);
}

fn observed(hazard: &str, position: &str, final_levels: RiskLevels) -> ApplicationRecord {
    ApplicationRecord {
        record_id: format!("{hazard}-{position}-{}", final_levels.risk()),
        company_id: "acme".into(),
        template_id: "t-1".into(),
        hazard_id: hazard.into(),
        position_id: position.into(),
        suggested: final_levels,
        final_levels,
        accepted_unmodified: true,
        deviation_pct: 0.0,
        override_justification: None,
        recorded_at: Utc::now(),
    }
}

#[test]
fn inconsistency_severity_follows_coefficient_of_variation() {
    let history = vec![
        // NR 20, 20, 4000: CV ~1.39
        observed("high", "p1", levels(2, 1, 10)),
        observed("high", "p1", levels(2, 1, 10)),
        observed("high", "p2", levels(10, 4, 100)),
        // NR 150, 150, 600: CV ~0.71
        observed("medium", "p1", levels(6, 1, 25)),
        observed("medium", "p2", levels(6, 1, 25)),
        observed("medium", "p3", levels(6, 4, 25)),
        // NR 60, 60, 180: CV ~0.57
        observed("low", "p1", levels(6, 1, 10)),
        observed("low", "p2", levels(6, 1, 10)),
        observed("low", "p3", levels(6, 3, 10)),
        // NR 100, 100, 250: CV ~0.47, not flagged
        observed("steady", "p1", levels(10, 1, 10)),
        observed("steady", "p2", levels(10, 1, 10)),
        observed("steady", "p3", levels(10, 1, 25)),
    ];
    let reports = detect_inconsistencies(&history, &LearningConfig::default());
    let summary: Vec<(&str, InconsistencySeverity)> = reports
        .iter()
        .map(|r| (r.hazard_id.as_str(), r.severity))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("high", InconsistencySeverity::High),
            ("medium", InconsistencySeverity::Medium),
            ("low", InconsistencySeverity::Low),
        ]
    );

    let high = &reports[0];
    assert_eq!(high.records, 3);
    // The duplicate (p1, 2/1/10) observation is listed once.
    assert_eq!(high.observations.len(), 2);
    assert!((high.coefficient_of_variation - 1.393).abs() < 1e-3);
}

#[test]
fn thin_or_zero_hazards_are_never_flagged() {
    let history = vec![
        observed("two-records", "p1", levels(2, 1, 10)),
        observed("two-records", "p2", levels(10, 4, 100)),
        observed("all-zero", "p1", levels(0, 1, 10)),
        observed("all-zero", "p2", levels(0, 4, 100)),
        observed("all-zero", "p3", levels(0, 2, 25)),
    ];
    assert!(detect_inconsistencies(&history, &LearningConfig::default()).is_empty());
}
