//! End-to-end deduplication scenarios across mixed-source corpora.

mod helpers;

use folio::dedup::{deduplicate, DedupConfig};
use folio::paper::{Paper, SourceApi};
use helpers::{paper, rich_paper, sparse_paper};

#[test]
fn cross_source_corpus_collapses_to_unique_works() {
    // The same work observed through all three catalogs, plus two genuinely
    // distinct papers.
    let mut openalex = rich_paper("Saccadic suppression of displacement", "10.1/supp");
    openalex.pmid = None;

    let mut pubmed = paper("Saccadic suppression of displacement", SourceApi::PubMed);
    pubmed.doi = Some("10.1/SUPP".into()); // same DOI, different case
    pubmed.pmid = Some("31000001".into());

    let scholar = sparse_paper("Saccadic suppression of displacement.", "10.1/supp");

    let other_a = rich_paper("Microsaccades and covert attention", "10.1/msca");
    let other_b = rich_paper("Smooth pursuit gain in infancy", "10.1/pursuit");

    let corpus = vec![
        openalex.clone(),
        other_a.clone(),
        pubmed,
        scholar,
        other_b.clone(),
    ];
    let unique = deduplicate(corpus, &DedupConfig::default());

    assert_eq!(unique.len(), 3);
    // The triplicated work keeps the richest record and its original slot.
    assert_eq!(unique[0].id, openalex.id);
    assert_eq!(unique[1].id, other_a.id);
    assert_eq!(unique[2].id, other_b.id);
}

#[test]
fn dedup_is_idempotent_over_real_corpus() {
    let corpus = vec![
        rich_paper("Paper one", "10.1/a"),
        rich_paper("Paper two", "10.1/b"),
        sparse_paper("Paper one", "10.1/a"),
    ];
    let config = DedupConfig::default();

    let once = deduplicate(corpus, &config);
    let twice = deduplicate(once.clone(), &config);

    assert_eq!(once.len(), 2);
    let once_ids: Vec<&str> = once.iter().map(|p| p.id.as_str()).collect();
    let twice_ids: Vec<&str> = twice.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(once_ids, twice_ids);
}

#[test]
fn fuzzy_title_match_catches_formatting_variants() {
    // No shared identifiers: identity must come from normalized-title
    // similarity alone.
    let a = {
        let mut p = paper(
            "Attention and working memory: two sides of the same coin?",
            SourceApi::OpenAlex,
        );
        p.abstract_text = Some("An abstract.".into());
        p
    };
    let b = paper(
        "Attention and Working Memory — Two Sides of the Same Coin",
        SourceApi::GoogleScholar,
    );

    let unique = deduplicate(vec![a.clone(), b], &DedupConfig::default());
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].id, a.id);
}

#[test]
fn later_richer_record_replaces_in_place_and_keeps_order() {
    let sparse = sparse_paper("Predictive remapping of visual space", "10.1/remap");
    let middle = rich_paper("An unrelated study", "10.1/other");
    let rich = rich_paper("Predictive remapping of visual space", "10.1/remap");

    let unique = deduplicate(
        vec![sparse.clone(), middle.clone(), rich.clone()],
        &DedupConfig::default(),
    );

    assert_eq!(unique.len(), 2);
    // Replacement happens in the sparse record's slot, so order is stable.
    assert_eq!(unique[0].id, rich.id);
    assert_eq!(unique[1].id, middle.id);
}

#[test]
fn distinct_dois_with_similar_titles_stay_separate_when_below_threshold() {
    // Titles differ enough to fall under the similarity threshold; distinct
    // DOIs confirm they are different works.
    let mut a = rich_paper("Neural correlates of decision making in primates", "10.1/x1");
    a.pmid = Some("1".into());
    let mut b = rich_paper("Genomic analysis of drought tolerance in wheat", "10.1/x2");
    b.pmid = Some("2".into());

    let unique = deduplicate(vec![a, b], &DedupConfig::default());
    assert_eq!(unique.len(), 2);
}

#[test]
fn empty_corpus_yields_empty_result() {
    let unique = deduplicate(Vec::<Paper>::new(), &DedupConfig::default());
    assert!(unique.is_empty());
}
