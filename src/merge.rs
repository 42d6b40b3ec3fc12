//! Progress merger - reconciles two snapshots of the same project.
//!
//! The merge is deliberately narrow: it unions the sentence sets and moves
//! the five progress fields forward, nothing else. Content fields (text,
//! timing, translation, explanations, keywords) are passed through from
//! whichever side contributed the sentence; when both sides have it, the
//! local copy wins. Study progress can therefore never regress, no matter
//! how stale one side is.
//!
//! Pure function, no I/O. Required algebraic properties (exercised in
//! `merge_test.rs`):
//! - idempotent: `merge(x, x) == x`
//! - commutative on progress fields: `merge(a, b)` and `merge(b, a)` agree
//!   on every progress field
//! - monotonic: no progress counter is ever lower than it is in either input

use std::collections::BTreeMap;

use crate::manifest::{ProjectManifest, SentenceEntry, SpeakerEntry};

/// Merge a local and a remote snapshot of one project.
///
/// The sentence set of the result is the union of both inputs' sentence ids,
/// ordered by stored index. Project aggregates are recomputed from the
/// merged list; `created_at` takes the earlier of the two timestamps,
/// `updated_at` and `last_sync` the later.
pub fn merge(local: &ProjectManifest, remote: &ProjectManifest) -> ProjectManifest {
    let mut merged = ProjectManifest {
        version: local.version.max(remote.version),
        id: pick_non_empty(&local.id, &remote.id),
        name: pick_non_empty(&local.name, &remote.name),
        created_at: min_option(local.created_at, remote.created_at),
        updated_at: max_option(local.updated_at, remote.updated_at),
        speakers: merge_speakers(&local.speakers, &remote.speakers),
        sentences: merge_sentences(&local.sentences, &remote.sentences),
        progress: local.progress.clone(),
    };
    merged.progress.last_sync = max_option(local.progress.last_sync, remote.progress.last_sync);
    merged.recompute_progress();
    merged
}

fn pick_non_empty(local: &str, remote: &str) -> String {
    if local.is_empty() { remote } else { local }.to_string()
}

fn min_option<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_option<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Union by sentence id. BTreeMap keeps the walk deterministic; the final
/// ordering is by stored index anyway.
fn merge_sentences(local: &[SentenceEntry], remote: &[SentenceEntry]) -> Vec<SentenceEntry> {
    let local_by_id: BTreeMap<&str, &SentenceEntry> =
        local.iter().map(|s| (s.id.as_str(), s)).collect();
    let remote_by_id: BTreeMap<&str, &SentenceEntry> =
        remote.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut all_ids: Vec<&str> = local_by_id.keys().copied().collect();
    for id in remote_by_id.keys() {
        if !local_by_id.contains_key(id) {
            all_ids.push(id);
        }
    }

    let mut merged: Vec<SentenceEntry> = all_ids
        .into_iter()
        .filter_map(|id| {
            match (local_by_id.get(id), remote_by_id.get(id)) {
                // Present on both sides: local content, monotonic progress.
                (Some(l), Some(r)) => Some(merge_sentence(l, r)),
                // One-sided sentences are carried through unchanged.
                (Some(l), None) => Some((*l).clone()),
                (None, Some(r)) => Some((*r).clone()),
                (None, None) => None,
            }
        })
        .collect();

    merged.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
    merged
}

/// Content from the local side, progress fields moved forward from both.
fn merge_sentence(local: &SentenceEntry, remote: &SentenceEntry) -> SentenceEntry {
    let mut out = local.clone();
    out.learned = local.learned || remote.learned;
    out.learn_count = local.learn_count.max(remote.learn_count);
    out.is_difficult = local.is_difficult || remote.is_difficult;
    out.review_count = local.review_count.max(remote.review_count);
    out.last_reviewed = max_option(local.last_reviewed, remote.last_reviewed);
    out
}

/// Union by speaker id. A manually-named speaker beats an automatic one;
/// otherwise the local entry is kept.
fn merge_speakers(local: &[SpeakerEntry], remote: &[SpeakerEntry]) -> Vec<SpeakerEntry> {
    let mut merged: Vec<SpeakerEntry> = local.to_vec();
    for r in remote {
        match merged.iter_mut().find(|l| l.id == r.id) {
            Some(l) => {
                if r.is_manual && !l.is_manual {
                    *l = r.clone();
                }
            }
            None => merged.push(r.clone()),
        }
    }
    merged
}
