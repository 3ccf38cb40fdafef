//! Similarity scoring properties

mod common;

use concord::{Concept, SimilarityRule, SimilarityScorer};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn abbreviation_example_scores_above_merge_threshold() {
    let vm = Concept::new("VM", "a software emulation of a computer").with_embedding(vec![1.0, 0.0]);
    let full = Concept::new(
        "Virtual Machine",
        "a software emulation of a physical computer system",
    )
    // cosine with vm ≈ 0.97
    .with_embedding(vec![0.97, 0.243_1]);

    let result = SimilarityScorer::new().similarity(&vm, &full);
    assert!(result.score >= 0.95, "score was {}", result.score);
    assert_eq!(result.rule, SimilarityRule::Abbreviation);
    assert!(result.reasoning.starts_with("abbreviation"));
}

#[test]
fn similarity_is_symmetric_over_random_pairs() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let concepts = common::random_concepts(&mut rng, 40);
    let scorer = SimilarityScorer::new();

    for a in &concepts {
        for b in &concepts {
            let ab = scorer.similarity(a, b);
            let ba = scorer.similarity(b, a);
            assert_eq!(ab, ba, "asymmetric for '{}' / '{}'", a.term, b.term);
            assert!((0.0..=1.0).contains(&ab.score), "score {} out of range", ab.score);
        }
    }
}

#[test]
fn rule_priority_prefers_abbreviation_then_exact() {
    let scorer = SimilarityScorer::new();

    let tlb = Concept::new("TLB", "");
    let expanded = Concept::new("Translation Lookaside Buffer", "").with_embedding(vec![0.0, 1.0]);
    assert_eq!(scorer.similarity(&tlb, &expanded).rule, SimilarityRule::Abbreviation);

    // Embeddings are ignored once the exact-match rule applies
    let a = Concept::new("Inode", "").with_embedding(vec![1.0, 0.0]);
    let b = Concept::new("INODE", "").with_embedding(vec![0.0, 1.0]);
    let exact = scorer.similarity(&a, &b);
    assert_eq!(exact.rule, SimilarityRule::ExactMatch);
    assert_eq!(exact.score, 1.0);
}
