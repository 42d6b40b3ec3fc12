use chrono::{TimeZone, Utc};

use crate::manifest::{KeywordEntry, ProgressSummary, ProjectManifest, SentenceEntry, SpeakerEntry};
use crate::merge::merge;

fn sentence(id: &str, index: i64, text: &str) -> SentenceEntry {
    SentenceEntry {
        id: id.to_string(),
        index,
        text: text.to_string(),
        start_time: Some(index as f64),
        end_time: Some(index as f64 + 1.0),
        translation_en: Some(format!("translation of {}", text)),
        explanation_nl: None,
        explanation_en: None,
        speaker_id: None,
        learned: false,
        learn_count: 0,
        is_difficult: false,
        review_count: 0,
        last_reviewed: None,
        keywords: vec![],
    }
}

fn manifest(id: &str, sentences: Vec<SentenceEntry>) -> ProjectManifest {
    let mut m = ProjectManifest {
        version: 1,
        id: id.to_string(),
        name: format!("Project {}", id),
        created_at: None,
        updated_at: None,
        speakers: vec![],
        sentences,
        progress: ProgressSummary::default(),
    };
    m.recompute_progress();
    m
}

#[test]
fn test_merge_is_idempotent() {
    let mut s = sentence("s1", 0, "Hallo");
    s.learned = true;
    s.learn_count = 4;
    s.last_reviewed = Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    let m = manifest("p1", vec![s, sentence("s2", 1, "Dag")]);

    assert_eq!(merge(&m, &m), m);
}

#[test]
fn test_merge_commutative_on_progress() {
    let mut a_s = sentence("s1", 0, "Hallo");
    a_s.learn_count = 2;
    a_s.review_count = 5;
    let mut b_s = sentence("s1", 0, "Hallo");
    b_s.learned = true;
    b_s.learn_count = 7;
    b_s.last_reviewed = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

    let a = manifest("p1", vec![a_s]);
    let b = manifest("p1", vec![b_s]);

    let ab = merge(&a, &b);
    let ba = merge(&b, &a);

    let (x, y) = (&ab.sentences[0], &ba.sentences[0]);
    assert_eq!(x.learned, y.learned);
    assert_eq!(x.learn_count, y.learn_count);
    assert_eq!(x.is_difficult, y.is_difficult);
    assert_eq!(x.review_count, y.review_count);
    assert_eq!(x.last_reviewed, y.last_reviewed);
    assert_eq!(ab.progress, ba.progress);
}

#[test]
fn test_merge_monotonic() {
    let mut local_s = sentence("s1", 0, "Hallo");
    local_s.learn_count = 3;
    local_s.review_count = 1;
    let mut remote_s = sentence("s1", 0, "Hallo");
    remote_s.learned = true;
    remote_s.learn_count = 1;
    remote_s.review_count = 6;

    let merged = merge(
        &manifest("p1", vec![local_s.clone()]),
        &manifest("p1", vec![remote_s.clone()]),
    );
    let m = &merged.sentences[0];

    assert!(m.learn_count >= local_s.learn_count.max(remote_s.learn_count));
    assert!(m.review_count >= local_s.review_count.max(remote_s.review_count));
    assert_eq!(m.learned, local_s.learned || remote_s.learned);
}

// Scenario: local {learned:false, learnCount:2}, remote {learned:true,
// learnCount:1} must merge to {learned:true, learnCount:2}.
#[test]
fn test_conflicting_progress_takes_max_of_each_field() {
    let mut local_s = sentence("s1", 0, "Hallo");
    local_s.learn_count = 2;
    let mut remote_s = sentence("s1", 0, "Hallo");
    remote_s.learned = true;
    remote_s.learn_count = 1;

    let merged = merge(
        &manifest("p1", vec![local_s]),
        &manifest("p1", vec![remote_s]),
    );

    assert!(merged.sentences[0].learned);
    assert_eq!(merged.sentences[0].learn_count, 2);
    assert_eq!(merged.progress.learned_sentences, 1);
}

// Scenario: local ids {1,2}, remote ids {2,3} -> merged ids {1,2,3}, each
// one-sided sentence carried through unchanged.
#[test]
fn test_sentence_sets_are_unioned() {
    let only_local = sentence("s1", 0, "Een");
    let shared_local = sentence("s2", 1, "Twee");
    let shared_remote = sentence("s2", 1, "Twee");
    let mut only_remote = sentence("s3", 2, "Drie");
    only_remote.learned = true;
    only_remote.keywords.push(KeywordEntry {
        word: "drie".to_string(),
        meaning_nl: Some("3".to_string()),
        meaning_en: Some("three".to_string()),
    });

    let merged = merge(
        &manifest("p1", vec![only_local.clone(), shared_local]),
        &manifest("p1", vec![shared_remote, only_remote.clone()]),
    );

    let ids: Vec<&str> = merged.sentences.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    assert_eq!(merged.sentences[0], only_local);
    assert_eq!(merged.sentences[2], only_remote);
    assert_eq!(merged.progress.total_sentences, 3);
}

#[test]
fn test_content_fields_prefer_local_contributor() {
    let mut local_s = sentence("s1", 0, "Hallo wereld");
    local_s.explanation_en = Some("local explanation".to_string());
    let mut remote_s = sentence("s1", 0, "Hallo wereld");
    remote_s.explanation_en = Some("regenerated remote explanation".to_string());
    remote_s.learn_count = 9;

    let merged = merge(
        &manifest("p1", vec![local_s]),
        &manifest("p1", vec![remote_s]),
    );

    // Content from the local side, progress from whichever is ahead.
    assert_eq!(
        merged.sentences[0].explanation_en.as_deref(),
        Some("local explanation")
    );
    assert_eq!(merged.sentences[0].learn_count, 9);
}

#[test]
fn test_sentences_sorted_by_stored_index() {
    let merged = merge(
        &manifest("p1", vec![sentence("s9", 4, "Vijf"), sentence("s2", 0, "Een")]),
        &manifest("p1", vec![sentence("s5", 2, "Drie")]),
    );

    let indexes: Vec<i64> = merged.sentences.iter().map(|s| s.index).collect();
    assert_eq!(indexes, vec![0, 2, 4]);
}

#[test]
fn test_last_reviewed_takes_latest_null_is_earliest() {
    let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();

    let mut local_s = sentence("s1", 0, "Hallo");
    local_s.last_reviewed = Some(t1);
    let mut remote_s = sentence("s1", 0, "Hallo");
    remote_s.last_reviewed = Some(t2);

    let merged = merge(
        &manifest("p1", vec![local_s]),
        &manifest("p1", vec![remote_s]),
    );
    assert_eq!(merged.sentences[0].last_reviewed, Some(t2));

    // None on one side never erases a real timestamp.
    let mut with_ts = sentence("s1", 0, "Hallo");
    with_ts.last_reviewed = Some(t1);
    let without_ts = sentence("s1", 0, "Hallo");
    let merged = merge(
        &manifest("p1", vec![without_ts]),
        &manifest("p1", vec![with_ts]),
    );
    assert_eq!(merged.sentences[0].last_reviewed, Some(t1));
}

#[test]
fn test_manual_speaker_name_wins() {
    let auto = SpeakerEntry {
        id: "sp1".to_string(),
        label: "A".to_string(),
        display_name: Some("Speaker A".to_string()),
        confidence: 0.4,
        evidence: None,
        is_manual: false,
    };
    let manual = SpeakerEntry {
        display_name: Some("Maarten".to_string()),
        is_manual: true,
        ..auto.clone()
    };

    let mut local = manifest("p1", vec![]);
    local.speakers = vec![auto.clone()];
    let mut remote = manifest("p1", vec![]);
    remote.speakers = vec![manual.clone()];

    let merged = merge(&local, &remote);
    assert_eq!(merged.speakers, vec![manual.clone()]);

    // But an automatic remote entry never overwrites a manual local one.
    let mut local = manifest("p1", vec![]);
    local.speakers = vec![manual.clone()];
    let mut remote = manifest("p1", vec![]);
    remote.speakers = vec![auto];

    let merged = merge(&local, &remote);
    assert_eq!(merged.speakers, vec![manual]);
}

#[test]
fn test_created_at_takes_earliest_updated_at_latest() {
    let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();

    let mut local = manifest("p1", vec![]);
    local.created_at = Some(late);
    local.updated_at = Some(early);
    let mut remote = manifest("p1", vec![]);
    remote.created_at = Some(early);
    remote.updated_at = Some(late);

    let merged = merge(&local, &remote);
    assert_eq!(merged.created_at, Some(early));
    assert_eq!(merged.updated_at, Some(late));
}
