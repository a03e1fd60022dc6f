//! Store-backed engine: seeding, transactional recording, auto-revision,
//! company isolation and the audit log.

use gtc45_core::{
    engine::{ControlEngine, RevisionOutcome},
    error::{ControlError, ValidationError},
    hazard::{HazardCategory, HazardExposure},
    inconsistency::InconsistencySeverity,
    learning::ApplicationInput,
    risk_level::RiskLevels,
    store::TemplateStore,
    suggestion::SuggestionStatus,
    template::Template,
};

fn data_dir() -> String {
    format!("{}/../data", env!("CARGO_MANIFEST_DIR"))
}

fn build_engine() -> ControlEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = TemplateStore::in_memory().expect("in-memory store");
    ControlEngine::build(&data_dir(), store).expect("engine")
}

fn levels(nd: u32, ne: u32, nc: u32) -> RiskLevels {
    RiskLevels::new(nd, ne, nc).unwrap()
}

fn physical_template(engine: &ControlEngine, company: &str) -> Template {
    engine
        .templates(company)
        .unwrap()
        .into_iter()
        .find(|t| t.category == HazardCategory::Physical)
        .expect("seeded physical template")
}

fn application(position: &str, suggested: RiskLevels, final_levels: RiskLevels) -> ApplicationInput {
    ApplicationInput {
        hazard_id: "ges-ruido".into(),
        position_id: position.into(),
        suggested,
        final_levels,
        override_justification: None,
    }
}

fn event_types(engine: &ControlEngine, company: &str) -> Vec<String> {
    engine
        .audit_log(company)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

#[test]
fn seeding_is_idempotent_per_company() {
    let engine = build_engine();
    let first = engine.seed_company_templates("acme").unwrap();
    assert_eq!(first.len(), HazardCategory::ALL.len());

    let second = engine.seed_company_templates("acme").unwrap();
    assert!(second.is_empty());
    assert_eq!(engine.templates("acme").unwrap().len(), HazardCategory::ALL.len());

    // A second company gets its own set.
    engine.seed_company_templates("globex").unwrap();
    assert_eq!(engine.templates("globex").unwrap().len(), HazardCategory::ALL.len());
    assert_eq!(event_types(&engine, "acme"), vec!["templates_seeded"]);
}

#[test]
fn templates_round_trip_through_the_store() {
    let engine = build_engine();
    let created = engine
        .create_template(
            "acme",
            HazardCategory::Chemical,
            levels(6, 2, 25),
            "Solvent handling in the paint line",
            vec!["solvente".into(), "pintura".into()],
        )
        .unwrap();
    let loaded = engine.store().get_template(&created.template_id).unwrap().unwrap();
    assert_eq!(loaded.category, HazardCategory::Chemical);
    assert_eq!(loaded.default_levels, levels(6, 2, 25));
    assert_eq!(loaded.name_patterns, vec!["solvente", "pintura"]);
    assert_eq!(loaded.created_at.timestamp(), created.created_at.timestamp());

    let err = engine
        .create_template("acme", HazardCategory::Chemical, RiskLevels { nd: 1, ne: 2, nc: 25 }, "bad", vec![])
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(ValidationError::OutOfSet { field: "nd", .. })));
}

#[test]
fn recording_updates_statistics_and_audit_log() {
    let engine = build_engine();
    engine.seed_company_templates("acme").unwrap();
    let t = physical_template(&engine, "acme");

    let (record, updated) = engine
        .record_application("acme", &t.template_id, &application("p1", t.default_levels, t.default_levels))
        .unwrap();
    assert!(record.accepted_unmodified);
    assert_eq!(updated.applications_count, 1);
    assert_eq!(updated.acceptance_rate, 1.0);

    engine
        .record_application("acme", &t.template_id, &application("p2", t.default_levels, levels(10, 3, 25)))
        .unwrap();
    let stored = engine.store().get_template(&t.template_id).unwrap().unwrap();
    assert_eq!(stored.applications_count, 2);
    assert!((stored.acceptance_rate - 0.5).abs() < 1e-9);

    let history = engine.store().applications_for_template(&t.template_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].position_id, "p1");
    assert_eq!(history[1].final_levels, levels(10, 3, 25));

    assert_eq!(
        event_types(&engine, "acme"),
        vec!["templates_seeded", "application_recorded", "application_recorded"]
    );
}

#[test]
fn rejected_recording_leaves_no_trace() {
    let engine = build_engine();
    engine.seed_company_templates("acme").unwrap();
    let t = physical_template(&engine, "acme");

    let bad = application("p1", t.default_levels, RiskLevels { nd: 6, ne: 3, nc: 30 });
    let err = engine.record_application("acme", &t.template_id, &bad).unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));

    assert!(engine.store().applications_for_template(&t.template_id).unwrap().is_empty());
    assert_eq!(physical_template(&engine, "acme").applications_count, 0);
    assert_eq!(event_types(&engine, "acme"), vec!["templates_seeded"]);
}

#[test]
fn templates_are_scoped_to_their_company() {
    let engine = build_engine();
    engine.seed_company_templates("acme").unwrap();
    let t = physical_template(&engine, "acme");

    let err = engine
        .record_application("globex", &t.template_id, &application("p1", t.default_levels, t.default_levels))
        .unwrap_err();
    assert!(matches!(err, ControlError::CompanyMismatch { .. }));

    let err = engine.detect_override_pattern("acme", "no-such-template").unwrap_err();
    assert!(matches!(err, ControlError::TemplateNotFound { .. }));

    let hazards = [HazardExposure::new("h1", "Iluminación", "Físico")];
    let suggestions = engine.suggest("globex", &hazards).unwrap();
    assert_eq!(suggestions[0].status, SuggestionStatus::NoTemplate);
}

#[test]
fn auto_revision_follows_the_dominant_override() {
    let engine = build_engine();
    engine.seed_company_templates("acme").unwrap();
    let t = physical_template(&engine, "acme");
    assert_eq!(t.default_levels, levels(6, 3, 25));

    assert_eq!(
        engine.auto_revise_template("acme", &t.template_id).unwrap(),
        RevisionOutcome::NoPattern
    );

    let mut finals = vec![levels(10, 3, 25); 7];
    finals.extend([levels(6, 4, 25), levels(2, 3, 25), levels(6, 3, 60)]);
    for (i, final_levels) in finals.into_iter().enumerate() {
        engine
            .record_application(
                "acme",
                &t.template_id,
                &application(&format!("p{i}"), t.default_levels, final_levels),
            )
            .unwrap();
    }

    let pattern = engine
        .detect_override_pattern("acme", &t.template_id)
        .unwrap()
        .expect("pattern");
    assert!((pattern.frequency_pct - 70.0).abs() < 1e-9);

    let RevisionOutcome::Revised { template, pattern } =
        engine.auto_revise_template("acme", &t.template_id).unwrap()
    else {
        panic!("expected a revision");
    };
    assert_eq!(template.default_levels, levels(10, 3, 25));
    assert_eq!(pattern.occurrences, 7);
    // Statistics carry over until the next recording.
    assert_eq!(template.applications_count, 10);
    assert_eq!(template.acceptance_rate, 0.0);

    let stored = engine.store().get_template(&t.template_id).unwrap().unwrap();
    assert_eq!(stored, template);
    assert!(stored.justification.contains("auto-revised"));
    assert_eq!(event_types(&engine, "acme").last().map(String::as_str), Some("template_revised"));

    // New suggestions use the revised defaults.
    let hazards = [HazardExposure::new("h1", "Ruido continuo", "Riesgo Físico")];
    let s = &engine.suggest("acme", &hazards).unwrap()[0];
    assert_eq!(s.levels, Some(levels(10, 3, 25)));
    assert!(s.needs_review);
}

#[test]
fn repeated_auto_revision_changes_nothing() {
    let engine = build_engine();
    engine.seed_company_templates("acme").unwrap();
    let t = physical_template(&engine, "acme");
    for i in 0..5 {
        engine
            .record_application(
                "acme",
                &t.template_id,
                &application(&format!("p{i}"), t.default_levels, levels(10, 3, 25)),
            )
            .unwrap();
    }

    let first = engine.auto_revise_template("acme", &t.template_id).unwrap();
    assert!(matches!(first, RevisionOutcome::Revised { .. }));
    let after_first = engine.store().get_template(&t.template_id).unwrap().unwrap();

    for _ in 0..2 {
        assert_eq!(
            engine.auto_revise_template("acme", &t.template_id).unwrap(),
            RevisionOutcome::NoPattern
        );
    }
    assert!(engine.detect_override_pattern("acme", &t.template_id).unwrap().is_none());

    let stored = engine.store().get_template(&t.template_id).unwrap().unwrap();
    assert_eq!(stored.justification, after_first.justification);
    assert_eq!(stored.default_levels, levels(10, 3, 25));
    let revisions = event_types(&engine, "acme")
        .into_iter()
        .filter(|e| e == "template_revised")
        .count();
    assert_eq!(revisions, 1);
}

#[test]
fn company_inconsistencies_are_reported_and_audited() {
    let engine = build_engine();
    engine.seed_company_templates("acme").unwrap();
    let t = physical_template(&engine, "acme");

    for (position, final_levels) in [
        ("p1", levels(2, 1, 10)),
        ("p2", levels(2, 1, 10)),
        ("p3", levels(10, 4, 100)),
    ] {
        engine
            .record_application("acme", &t.template_id, &application(position, t.default_levels, final_levels))
            .unwrap();
    }

    let reports = engine.company_inconsistencies("acme").unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].hazard_id, "ges-ruido");
    assert_eq!(reports[0].observations.len(), 3);
    assert_eq!(
        event_types(&engine, "acme").last().map(String::as_str),
        Some("inconsistency_flagged")
    );
    assert_eq!(reports[0].severity, InconsistencySeverity::High);

    let flagged = |engine: &ControlEngine| {
        event_types(engine, "acme")
            .iter()
            .filter(|e| *e == "inconsistency_flagged")
            .count()
    };
    // Re-running the report does not repeat the audit row.
    engine.company_inconsistencies("acme").unwrap();
    engine.company_inconsistencies("acme").unwrap();
    assert_eq!(flagged(&engine), 1);

    // NR 20, 20, 4000, 4000: CV ~0.99, severity drops to MEDIUM.
    engine
        .record_application("acme", &t.template_id, &application("p4", t.default_levels, levels(10, 4, 100)))
        .unwrap();
    let reports = engine.company_inconsistencies("acme").unwrap();
    assert_eq!(reports[0].severity, InconsistencySeverity::Medium);
    assert_eq!(flagged(&engine), 2);

    assert!(engine.company_inconsistencies("globex").unwrap().is_empty());
}

#[test]
fn evaluation_uses_the_loaded_catalog() {
    let engine = build_engine();
    let profile = serde_json::from_str::<gtc45_core::position::RawPositionProfile>(
        r#"{ "position_id": "soldador", "toggles": { "works_in_confined_space": true },
             "hazards": [ { "id": "h1", "name": "Gases", "category": "Químico",
                            "nd": 6, "ne": 3, "nc": 60 } ] }"#,
    )
    .unwrap()
    .normalize()
    .unwrap();
    let eval = engine.evaluate_position(&profile).unwrap();
    let c = &eval.controls;
    assert!(c.exam_codes.contains("EMOC"));
    assert!(c.exam_codes.contains("CH"));
    assert!(c.ppe.contains("Respirador con cartucho para vapores orgánicos"));
    assert_eq!(c.periodicity_months, 6);

    let lines = c.exam_lines(engine.exams());
    let emoc = lines.iter().find(|l| l.code == "EMOC").unwrap();
    assert_eq!(emoc.default_periodicity_months, Some(6));
}
