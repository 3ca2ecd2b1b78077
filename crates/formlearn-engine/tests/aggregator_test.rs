use chrono::{Duration, TimeZone, Utc};
use formlearn_engine::config::FormLearnConfig;
use formlearn_engine::protocol::{FieldContext, FieldValue, SubmittedField, Trigger};
use formlearn_engine::session::SubmissionSnapshot;
use formlearn_engine::{
    AggregatedPattern, Aggregator, FieldFingerprint, FieldType, LearnError, LearningEngine,
    LearningSession, Outcome, SessionStatus, aggregate,
};

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

fn input(key: &str, input_type: &str, label: &str) -> FieldContext {
    FieldContext::new(key, "input")
        .with_type(input_type)
        .with_label(label)
}

/// Runs one session that types `values` (context, value) and finishes it.
fn session(
    engine: &mut LearningEngine,
    site: &str,
    values: &[(FieldContext, FieldValue)],
    successful: bool,
) -> LearningSession {
    let url = format!("https://{}/apply", site);
    let id = engine.start(&url, site).unwrap();
    for (i, (ctx, value)) in values.iter().enumerate() {
        let ctx = ctx.clone().on_page(&url, site);
        engine
            .record_event(&id, &ctx, value.clone(), Trigger::Input, at(i as i64))
            .unwrap();
    }
    engine.finish(&id, None, successful).unwrap()
}

fn by_category<'a>(patterns: &'a [AggregatedPattern], category: &str) -> &'a AggregatedPattern {
    patterns
        .iter()
        .find(|p| p.category == category)
        .unwrap_or_else(|| panic!("no pattern for {}", category))
}

#[test]
fn test_single_session_yields_provisional_patterns() {
    let mut engine = LearningEngine::default();
    let s = session(
        &mut engine,
        "acme.com",
        &[
            (input("1", "text", "Name"), "Ann".into()),
            (input("2", "email", "Email"), "a@x.com".into()),
        ],
        true,
    );

    let patterns = aggregate(&[s]);
    assert_eq!(patterns.len(), 2);

    let name = by_category(&patterns, "name");
    assert_eq!(name.canonical_value, Some("Ann".into()));
    assert_eq!(name.confidence, 1.0);
    assert_eq!(name.session_count, 1);

    let email = by_category(&patterns, "email");
    assert_eq!(email.field_type, FieldType::Email);
    assert_eq!(email.canonical_value, Some("a@x.com".into()));
    assert_eq!(email.confidence, 1.0);
}

#[test]
fn test_split_vote_has_no_canonical_value() {
    let mut engine = LearningEngine::default();
    let a = session(
        &mut engine,
        "a.com",
        &[(input("1", "text", "Name"), "Ann".into())],
        true,
    );
    let b = session(
        &mut engine,
        "b.com",
        &[(input("9", "text", "Name:"), "Anne".into())],
        true,
    );

    let patterns = aggregate(&[a, b]);
    assert_eq!(patterns.len(), 1);
    let name = &patterns[0];
    assert_eq!(
        name.candidate_values,
        vec![(FieldValue::from("Ann"), 1), (FieldValue::from("Anne"), 1)]
    );
    assert_eq!(name.canonical_value, None);
    assert_eq!(name.confidence, 0.5);
    assert_eq!(name.session_count, 2);
}

#[test]
fn test_majority_wins() {
    let mut engine = LearningEngine::default();
    let sessions: Vec<LearningSession> = ["Yes", "Yes", "No"]
        .iter()
        .enumerate()
        .map(|(i, answer)| {
            session(
                &mut engine,
                &format!("site{}.com", i),
                &[(
                    input("q", "text", "Are you authorized to work in the US?"),
                    (*answer).into(),
                )],
                true,
            )
        })
        .collect();

    let patterns = aggregate(&sessions);
    assert_eq!(patterns.len(), 1);
    let p = &patterns[0];
    assert_eq!(p.canonical_value, Some("Yes".into()));
    assert!((p.confidence - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(
        p.candidate_values,
        vec![(FieldValue::from("Yes"), 2), (FieldValue::from("No"), 1)]
    );
}

#[test]
fn test_unsuccessful_sessions_contribute_nothing() {
    let mut engine = LearningEngine::default();
    let ok = session(
        &mut engine,
        "a.com",
        &[(input("1", "text", "Name"), "Ann".into())],
        true,
    );
    let abandoned = session(
        &mut engine,
        "b.com",
        &[(input("1", "text", "Name"), "Bob".into())],
        false,
    );

    let id = engine.start("https://c.com/apply", "C").unwrap();
    engine
        .record_event(&id, &input("1", "text", "Name"), "Carl", Trigger::Input, at(0))
        .unwrap();
    engine
        .record_event(&id, &input("2", "text", "City"), "Oslo", Trigger::Input, at(1))
        .unwrap();
    let cancelled = engine.cancel(&id).unwrap();

    let patterns = aggregate(&[ok, abandoned, cancelled.clone()]);
    assert_eq!(patterns.len(), 1);
    assert_eq!(
        patterns[0].candidate_values,
        vec![(FieldValue::from("Ann"), 1)]
    );

    // A cancelled session alone trains nothing
    assert!(aggregate(&[cancelled]).is_empty());
}

#[test]
fn test_no_successful_sessions() {
    let aggregator = Aggregator::default();
    assert!(aggregator.aggregate(&[]).is_empty());
    assert_eq!(
        aggregator.aggregate_checked(&[]).unwrap_err(),
        LearnError::NoData
    );
}

#[test]
fn test_cross_site_clustering() {
    let mut engine = LearningEngine::default();
    let a = session(
        &mut engine,
        "a.com",
        &[
            (input("1", "email", "Email address"), "ann@x.com".into()),
            (input("2", "tel", "Phone"), "555-0100".into()),
        ],
        true,
    );

    // Different markup: wrapping label spelled "E-mail", phone known only by its name attribute
    let url = "https://b.com/apply";
    let id = engine.start(url, "B").unwrap();
    let mut email = FieldContext::new("x1", "input").with_type("text");
    email.wrapping_label = Some("E-mail address *".into());
    let phone = FieldContext::new("x2", "input")
        .with_type("tel")
        .with_name("phone");
    engine
        .record_event(&id, &email, "ann@x.com", Trigger::Blur, at(0))
        .unwrap();
    engine
        .record_event(&id, &phone, "555-0100", Trigger::Blur, at(1))
        .unwrap();
    let b = engine.finish(&id, None, true).unwrap();

    let patterns = aggregate(&[a, b]);
    assert_eq!(patterns.len(), 2);
    for p in &patterns {
        assert_eq!(p.session_count, 2);
        assert_eq!(p.confidence, 1.0);
        assert!(p.canonical_value.is_some());
    }
    assert_eq!(by_category(&patterns, "email address").field_type, FieldType::Email);
}

#[test]
fn test_incompatible_types_do_not_cluster() {
    let mut engine = LearningEngine::default();
    let a = session(
        &mut engine,
        "a.com",
        &[(input("1", "text", "Name"), "Ann".into())],
        true,
    );
    let b = session(
        &mut engine,
        "b.com",
        &[(input("1", "checkbox", "Name"), true.into())],
        true,
    );

    let patterns = aggregate(&[a, b]);
    assert_eq!(patterns.len(), 2);
    assert!(patterns.iter().all(|p| p.session_count == 1));
}

#[test]
fn test_submission_snapshot_beats_later_edits() {
    let mut engine = LearningEngine::default();
    let id = engine.start("https://a.com/apply", "A").unwrap();
    let ctx = input("1", "text", "Preferred name");

    engine
        .record_event(&id, &ctx, "Annie", Trigger::Input, at(0))
        .unwrap();
    engine
        .submit_fields(
            &id,
            &[SubmittedField {
                context: ctx.clone(),
                value: "Ann".into(),
            }],
            at(5),
        )
        .unwrap();
    // Edits after the submit do not change what was sent
    engine
        .record_event(&id, &ctx, "Anna", Trigger::Input, at(9))
        .unwrap();
    let s = engine.finish(&id, None, true).unwrap();

    let patterns = aggregate(&[s]);
    assert_eq!(patterns[0].canonical_value, Some("Ann".into()));
}

#[test]
fn test_latest_event_before_submission_without_snapshot_value() {
    let mut engine = LearningEngine::default();
    let id = engine.start("https://a.com/apply", "A").unwrap();
    let city = input("1", "text", "City");
    let other = input("2", "text", "Country");

    let other_fp = engine
        .record_event(&id, &other, "Norway", Trigger::Input, at(0))
        .unwrap()
        .unwrap();
    engine
        .record_event(&id, &city, "Osl", Trigger::Input, at(1))
        .unwrap();
    engine
        .record_event(&id, &city, "Oslo", Trigger::Change, at(2))
        .unwrap();
    // Snapshot only captured the country
    engine
        .record_submission(
            &id,
            SubmissionSnapshot::new(at(3)).with_value(other_fp, "Norway"),
        )
        .unwrap();
    engine
        .record_event(&id, &city, "Bergen", Trigger::Input, at(4))
        .unwrap();
    let s = engine.finish(&id, None, true).unwrap();

    let patterns = aggregate(&[s]);
    assert_eq!(by_category(&patterns, "city").canonical_value, Some("Oslo".into()));
    assert_eq!(
        by_category(&patterns, "country").canonical_value,
        Some("Norway".into())
    );
}

#[test]
fn test_blank_and_unresolved_fields_are_skipped() {
    let mut engine = LearningEngine::default();
    let s = session(
        &mut engine,
        "a.com",
        &[
            (input("1", "text", "Middle name"), "  ".into()),
            (FieldContext::new("2", "input"), "mystery".into()),
            (input("3", "text", "Last name"), " Smith ".into()),
        ],
        true,
    );

    let patterns = aggregate(&[s]);
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].category, "last name");
    assert_eq!(patterns[0].canonical_value, Some("Smith".into()));
}

#[test]
fn test_candidates_truncated_to_configured_limit() {
    let mut config = FormLearnConfig::default();
    config.learning.max_candidates = 2;
    let mut engine = LearningEngine::new(config.clone());

    let sessions: Vec<LearningSession> = ["Red", "Green", "Blue", "Green"]
        .iter()
        .enumerate()
        .map(|(i, colour)| {
            session(
                &mut engine,
                &format!("s{}.com", i),
                &[(input("c", "text", "Favourite colour"), (*colour).into())],
                true,
            )
        })
        .collect();

    let patterns = Aggregator::new(&config).aggregate(&sessions);
    let p = &patterns[0];
    assert_eq!(p.session_count, 4);
    assert_eq!(
        p.candidate_values,
        vec![(FieldValue::from("Green"), 2), (FieldValue::from("Red"), 1)]
    );
    // 2 of 4 is not a majority
    assert_eq!(p.canonical_value, None);
    assert_eq!(p.confidence, 0.5);
}

#[test]
fn test_cancelled_outcome_with_events_is_ignored() {
    let mut engine = LearningEngine::default();
    let mut s = session(
        &mut engine,
        "a.com",
        &[(input("1", "text", "Name"), "Ann".into())],
        true,
    );
    assert_eq!(s.event_count(), 1);

    // Histories are still present; only the outcome excludes the session
    s.status = SessionStatus::Cancelled;
    s.outcome = Some(Outcome::Cancelled);
    assert!(aggregate(&[s.clone()]).is_empty());

    s.outcome = Some(Outcome::Abandoned);
    assert!(aggregate(&[s]).is_empty());
}

#[test]
fn test_similar_short_labels_stay_separate() {
    let mut engine = LearningEngine::default();
    let s = session(
        &mut engine,
        "a.co.uk",
        &[
            (input("1", "text", "Country"), "UK".into()),
            (input("2", "text", "County"), "Kent".into()),
        ],
        true,
    );

    let patterns = aggregate(&[s]);
    assert_eq!(patterns.len(), 2);
    assert_eq!(by_category(&patterns, "country").canonical_value, Some("UK".into()));
    assert_eq!(by_category(&patterns, "county").canonical_value, Some("Kent".into()));
}

#[test]
fn test_qualified_labels_cluster_across_sites() {
    let mut engine = LearningEngine::default();
    let a = session(
        &mut engine,
        "a.com",
        &[
            (input("1", "email", "Email"), "ann@x.com".into()),
            (input("2", "tel", "Phone"), "555-0100".into()),
        ],
        true,
    );
    let b = session(
        &mut engine,
        "b.com",
        &[
            (input("1", "email", "Email address"), "ann@x.com".into()),
            (input("2", "tel", "Phone number"), "555-0100".into()),
        ],
        true,
    );

    let patterns = aggregate(&[a, b]);
    assert_eq!(patterns.len(), 2);
    assert_eq!(by_category(&patterns, "email").session_count, 2);
    assert_eq!(by_category(&patterns, "phone").session_count, 2);
}

#[test]
fn test_submission_only_fields_are_aggregated() {
    let mut engine = LearningEngine::default();
    let id = engine.start("https://a.com/apply", "A").unwrap();
    let name = FieldFingerprint::new("Name", FieldType::Text, "name");

    engine
        .record_submission(&id, SubmissionSnapshot::new(at(0)).with_value(name.clone(), "Ann"))
        .unwrap();
    let s = engine.finish(&id, None, true).unwrap();

    let field = s.field(&name).expect("field registered from the submission");
    assert!(field.events.is_empty());
    assert_eq!(field.metadata.page_url, "https://a.com/apply");

    let patterns = aggregate(&[s]);
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].category, "name");
    assert_eq!(patterns[0].canonical_value, Some("Ann".into()));
}
