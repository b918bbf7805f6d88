//! Paper deduplication across heterogeneous source catalogs.
//!
//! [`deduplicate`] is the single entry point. Identity resolution runs in
//! priority order: case-insensitive DOI match, exact PMID match, exact
//! OpenAlex ID match, then normalized-title similarity against every title
//! accepted so far. When two records resolve to the same work, the one with
//! the higher completeness score keeps the original's slot in the output;
//! ties keep the first-seen record.

use std::collections::HashMap;

use crate::paper::{Paper, SourceApi};

/// Deduplication knobs. Passed in explicitly — no ambient defaults are read
/// from the environment.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Minimum normalized-title similarity to treat two records as the same
    /// work. The boundary is inclusive.
    pub title_threshold: f64,
    /// Catalogs in preference order. Earlier entries earn a larger
    /// completeness bonus; catalogs absent from the list earn none.
    pub source_preference: Vec<SourceApi>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.85,
            source_preference: vec![
                SourceApi::OpenAlex,
                SourceApi::PubMed,
                SourceApi::GoogleScholar,
            ],
        }
    }
}

/// Normalize a title for comparison: lowercase, strip punctuation, collapse
/// whitespace.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity ratio in `[0.0, 1.0]` between two titles, computed as
/// normalized Levenshtein distance over their normalized forms.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_title(a), &normalize_title(b))
}

/// Heuristic measure of how much useful metadata a record carries. Used to
/// pick the representative when two records describe the same work.
fn completeness_score(paper: &Paper, preference: &[SourceApi]) -> usize {
    let mut score = 0;
    if paper.doi.is_some() {
        score += 10;
    }
    if paper.abstract_text.is_some() {
        score += 5;
    }
    score += paper.authors.len();
    if paper.year.is_some() {
        score += 2;
    }
    if paper.citation_count.is_some() {
        score += 1;
    }
    if let Some(idx) = preference.iter().position(|s| *s == paper.source_api) {
        score += preference.len() - idx;
    }
    score
}

/// Collapse a batch of records into one representative per distinct work.
///
/// Output order is the insertion order of each work's first-seen record; a
/// later, more complete duplicate replaces the earlier record in its
/// original slot rather than being appended. Records with empty titles are
/// never an error — their degenerate normalization may spuriously collide
/// with another empty-title record.
pub fn deduplicate(papers: Vec<Paper>, config: &DedupConfig) -> Vec<Paper> {
    let mut unique: Vec<Paper> = Vec::with_capacity(papers.len());

    // All lookup tables map identity keys to slots in `unique`, never to
    // record references, so replacement cannot dangle.
    let mut by_doi: HashMap<String, usize> = HashMap::new();
    let mut by_pmid: HashMap<String, usize> = HashMap::new();
    let mut by_openalex: HashMap<String, usize> = HashMap::new();
    let mut titles: Vec<(String, usize)> = Vec::new();

    for paper in papers {
        let normalized = normalize_title(&paper.title);
        let slot = find_duplicate(&paper, &normalized, &by_doi, &by_pmid, &by_openalex, &titles, config);

        match slot {
            Some(idx) => {
                let existing_score = completeness_score(&unique[idx], &config.source_preference);
                let new_score = completeness_score(&paper, &config.source_preference);
                // The loser's keys still identify this work, so they must
                // point at the winning slot or a later record carrying them
                // would not collapse.
                register_keys(&paper, &normalized, idx, &mut by_doi, &mut by_pmid, &mut by_openalex, &mut titles);
                if new_score > existing_score {
                    tracing::debug!(
                        kept = %paper.id,
                        dropped = %unique[idx].id,
                        "duplicate replaced less complete record"
                    );
                    unique[idx] = paper;
                } else {
                    tracing::debug!(kept = %unique[idx].id, dropped = %paper.id, "duplicate discarded");
                }
            }
            None => {
                let idx = unique.len();
                register_keys(&paper, &normalized, idx, &mut by_doi, &mut by_pmid, &mut by_openalex, &mut titles);
                unique.push(paper);
            }
        }
    }

    unique
}

/// Identity resolution in priority order. Returns the slot of the existing
/// representative, if any.
fn find_duplicate(
    paper: &Paper,
    normalized_title: &str,
    by_doi: &HashMap<String, usize>,
    by_pmid: &HashMap<String, usize>,
    by_openalex: &HashMap<String, usize>,
    titles: &[(String, usize)],
    config: &DedupConfig,
) -> Option<usize> {
    if let Some(doi) = &paper.doi {
        if let Some(&idx) = by_doi.get(&doi.to_lowercase()) {
            return Some(idx);
        }
    }
    if let Some(pmid) = &paper.pmid {
        if let Some(&idx) = by_pmid.get(pmid) {
            return Some(idx);
        }
    }
    if let Some(oa_id) = &paper.openalex_id {
        if let Some(&idx) = by_openalex.get(oa_id) {
            return Some(idx);
        }
    }
    // O(n) scan over accepted titles; candidate sets are bounded to a few
    // hundred records per session.
    for (seen, idx) in titles {
        if strsim::normalized_levenshtein(normalized_title, seen) >= config.title_threshold {
            return Some(*idx);
        }
    }
    None
}

/// Point all of a record's identity keys at its slot.
fn register_keys(
    paper: &Paper,
    normalized_title: &str,
    idx: usize,
    by_doi: &mut HashMap<String, usize>,
    by_pmid: &mut HashMap<String, usize>,
    by_openalex: &mut HashMap<String, usize>,
    titles: &mut Vec<(String, usize)>,
) {
    if let Some(doi) = &paper.doi {
        by_doi.insert(doi.to_lowercase(), idx);
    }
    if let Some(pmid) = &paper.pmid {
        by_pmid.insert(pmid.clone(), idx);
    }
    if let Some(oa_id) = &paper.openalex_id {
        by_openalex.insert(oa_id.clone(), idx);
    }
    if !titles.iter().any(|(t, i)| t == normalized_title && *i == idx) {
        titles.push((normalized_title.to_string(), idx));
    }
}

/// Field-level merge of two records for the same work. Takes `primary` and
/// fills in whatever metadata it is missing from `secondary`. Optional
/// utility — the baseline algorithm keeps whole records.
pub fn merge_paper_metadata(primary: &Paper, secondary: &Paper) -> Paper {
    let mut merged = primary.clone();

    if merged.doi.is_none() {
        merged.doi = secondary.doi.clone();
    }
    if merged.pmid.is_none() {
        merged.pmid = secondary.pmid.clone();
    }
    if merged.openalex_id.is_none() {
        merged.openalex_id = secondary.openalex_id.clone();
    }
    if merged.abstract_text.is_none() {
        merged.abstract_text = secondary.abstract_text.clone();
    }
    if merged.authors.is_empty() {
        merged.authors = secondary.authors.clone();
    }
    if merged.year.is_none() {
        merged.year = secondary.year;
    }
    if merged.journal.is_none() {
        merged.journal = secondary.journal.clone();
    }
    if merged.citation_count.is_none() {
        merged.citation_count = secondary.citation_count;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::Author;

    fn paper(title: &str, source: SourceApi) -> Paper {
        Paper::new(title, source)
    }

    #[test]
    fn normalize_strips_case_punctuation_whitespace() {
        assert_eq!(
            normalize_title("  Deep learning, for EEG   classification! "),
            "deep learning for eeg classification"
        );
        assert_eq!(normalize_title(""), "");
    }

    #[test]
    fn doi_match_is_case_insensitive() {
        // Scenario A: same DOI in different case, different titles.
        let mut a = paper("First Observation", SourceApi::OpenAlex);
        a.doi = Some("10.1/X".into());
        let mut b = paper("A Totally Different Title", SourceApi::PubMed);
        b.doi = Some("10.1/x".into());

        let out = deduplicate(vec![a, b], &DedupConfig::default());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn pmid_match_collapses_records() {
        let mut a = paper("Sleep Spindles in Adolescents", SourceApi::PubMed);
        a.pmid = Some("31415926".into());
        let mut b = paper("Sleep spindle dynamics in adolescent cohorts", SourceApi::GoogleScholar);
        b.pmid = Some("31415926".into());
        let c = paper("An Unrelated Study of Soil Microbes", SourceApi::OpenAlex);

        let out = deduplicate(vec![a, b, c], &DedupConfig::default());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn near_identical_titles_merge() {
        // Scenario B.
        let a = paper("Deep Learning for EEG Classification", SourceApi::OpenAlex);
        let b = paper("Deep learning for EEG classification!", SourceApi::PubMed);
        let c = paper("Unrelated Paper", SourceApi::OpenAlex);

        let out = deduplicate(vec![a, b, c], &DedupConfig::default());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn similarity_boundary_is_inclusive() {
        // 20 chars, 3 substitutions: ratio = 1 - 3/20 = 0.85 — duplicate.
        let base = "aaaaaaaaaaaaaaaaaaaa";
        let at_boundary = "aaaaaaaaaaaaaaaaabbb";
        assert!(title_similarity(base, at_boundary) >= 0.85);

        let out = deduplicate(
            vec![paper(base, SourceApi::OpenAlex), paper(at_boundary, SourceApi::PubMed)],
            &DedupConfig::default(),
        );
        assert_eq!(out.len(), 1);

        // 25 chars, 4 substitutions: ratio = 0.84 — not a duplicate.
        let base = "aaaaaaaaaaaaaaaaaaaaaaaaa";
        let below = "aaaaaaaaaaaaaaaaaaaaabbbb";
        assert!(title_similarity(base, below) < 0.85);

        let out = deduplicate(
            vec![paper(base, SourceApi::OpenAlex), paper(below, SourceApi::PubMed)],
            &DedupConfig::default(),
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn completeness_prefers_richer_record_either_order() {
        let make_x = || {
            let mut x = paper("Graph Neural Networks for Molecule Design", SourceApi::PubMed);
            x.doi = Some("10.5555/gnn".into());
            x.abstract_text = Some("We propose...".into());
            x.authors = vec![Author::new("A"), Author::new("B"), Author::new("C")];
            x
        };
        let make_y = || {
            let mut y = paper("Graph neural networks for molecule design", SourceApi::GoogleScholar);
            y.authors = vec![Author::new("A")];
            y
        };

        for input in [vec![make_x(), make_y()], vec![make_y(), make_x()]] {
            let out = deduplicate(input, &DedupConfig::default());
            assert_eq!(out.len(), 1);
            assert!(out[0].doi.is_some(), "richer record must win regardless of order");
        }
    }

    #[test]
    fn replacement_keeps_original_slot() {
        let first = paper("Alpha Oscillations in Working Memory", SourceApi::GoogleScholar);
        let second = paper("Completely Different Second Paper", SourceApi::OpenAlex);
        let mut better = paper("Alpha oscillations in working memory", SourceApi::OpenAlex);
        better.doi = Some("10.1/alpha".into());
        better.abstract_text = Some("abstract".into());

        let out = deduplicate(vec![first, second, better], &DedupConfig::default());
        assert_eq!(out.len(), 2);
        // The replacement occupies slot 0, not the end.
        assert!(out[0].doi.is_some());
    }

    #[test]
    fn ties_keep_first_seen() {
        let a = paper("Identical Completeness Study", SourceApi::OpenAlex);
        let a_id = a.id.clone();
        let b = paper("Identical completeness study", SourceApi::OpenAlex);

        let out = deduplicate(vec![a, b], &DedupConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, a_id);
    }

    #[test]
    fn discarded_duplicate_keys_still_identify_the_work() {
        // A rich record without a DOI absorbs a sparse title-duplicate that
        // carries one. A third record sharing that DOI must still collapse
        // into the same representative.
        let mut rich = paper("Contrast Sensitivity Across the Visual Field", SourceApi::OpenAlex);
        rich.abstract_text = Some("A full abstract.".into());
        rich.authors = vec![Author::new("A"), Author::new("B")];
        rich.year = Some(2022);
        let rich_id = rich.id.clone();

        let mut sparse = paper("Contrast sensitivity across the visual field", SourceApi::GoogleScholar);
        sparse.doi = Some("10.9/closure".into());

        let mut third = paper("An Entirely Different Title String", SourceApi::PubMed);
        third.doi = Some("10.9/CLOSURE".into());

        let out = deduplicate(vec![rich, sparse, third], &DedupConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, rich_id);
    }

    #[test]
    fn idempotent_over_deduplicated_input() {
        let mut a = paper("Study One on Retinal Imaging", SourceApi::OpenAlex);
        a.doi = Some("10.1/one".into());
        let b = paper("A Second Study of Cortical Maps", SourceApi::PubMed);

        let config = DedupConfig::default();
        let once = deduplicate(vec![a, b], &config);
        let ids: Vec<String> = once.iter().map(|p| p.id.clone()).collect();
        let twice = deduplicate(once, &config);
        let ids_again: Vec<String> = twice.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn empty_titles_collide_as_documented() {
        let a = paper("", SourceApi::OpenAlex);
        let b = paper("", SourceApi::PubMed);
        let out = deduplicate(vec![a, b], &DedupConfig::default());
        // Degenerate normalization: two empty titles look identical.
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn source_preference_breaks_metadata_ties() {
        let mut config = DedupConfig::default();
        config.source_preference = vec![SourceApi::PubMed, SourceApi::OpenAlex];

        let a = paper("Preference Bonus Check", SourceApi::OpenAlex); // bonus 1
        let b = paper("Preference bonus check", SourceApi::PubMed); // bonus 2 — replaces

        let out = deduplicate(vec![a, b], &config);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_api, SourceApi::PubMed);
    }

    #[test]
    fn merge_fills_missing_fields_only() {
        let mut primary = paper("Merged Work", SourceApi::OpenAlex);
        primary.doi = Some("10.1/keep".into());
        let mut secondary = paper("Merged Work", SourceApi::PubMed);
        secondary.doi = Some("10.1/ignored".into());
        secondary.pmid = Some("123".into());
        secondary.year = Some(2021);

        let merged = merge_paper_metadata(&primary, &secondary);
        assert_eq!(merged.doi.as_deref(), Some("10.1/keep"));
        assert_eq!(merged.pmid.as_deref(), Some("123"));
        assert_eq!(merged.year, Some(2021));
    }
}
