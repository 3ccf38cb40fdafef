//! Fixture concepts and documents

use concord::{Concept, ConceptId, DocumentGraph, Relationship, RelationshipType};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Two concepts whose definitions read as an ordered pipeline
pub fn pipeline_pair() -> (Concept, Concept) {
    let a = Concept::new("Ingestion", "First, raw data is collected by ingestion.")
        .with_location(3, 0)
        .with_excerpt("Ingestion pulls events from the queue.");
    let b = Concept::new(
        "Cleaning",
        "Then, after ingestion, records are cleaned; finally, they are stored.",
    )
    .with_location(4, 120);
    (a, b)
}

/// Two concepts linked by classification vocabulary only
/// Two steps described only by their wording: no location, neighbors or
/// mentions.
pub fn bare_sequential_pair() -> (Concept, Concept) {
    let a = Concept::new("Collection", "First, data is gathered from sensors.");
    let b = Concept::new("Validation", "Then, it is validated; finally, it is archived.");
    (a, b)
}

pub fn taxonomy_pair() -> (Concept, Concept) {
    let a = Concept::new("Mammal", "A mammal is a class of animal.");
    let b = Concept::new("Dog", "A dog is a kind of mammal and a member of the canine family.");
    (a, b)
}

#[allow(dead_code)]
pub struct VirtualizationIds {
    pub vm: ConceptId,
    pub virtual_machine: ConceptId,
    pub hypervisor: ConceptId,
    pub guest_os: ConceptId,
}

/// A small document with an abbreviation duplicate ("VM" / "Virtual Machine")
pub fn virtualization_document() -> (DocumentGraph, VirtualizationIds) {
    let mut graph = DocumentGraph::new("virtualization");

    let vm = graph
        .add_concept(
            Concept::new("VM", "a software emulation of a computer")
                .with_excerpt("Each VM boots its own kernel.")
                .with_neighbor("Hypervisor")
                .with_importance(0.3)
                .with_embedding(vec![1.0, 0.0]),
        )
        .unwrap();
    let virtual_machine = graph
        .add_concept(
            Concept::new(
                "Virtual Machine",
                "a software emulation of a physical computer system",
            )
            .with_excerpt("A virtual machine is scheduled by the hypervisor.")
            .with_neighbor("Guest OS")
            .with_importance(0.8)
            .with_embedding(vec![0.97, 0.243_1]),
        )
        .unwrap();
    let hypervisor = graph
        .add_concept(Concept::new("Hypervisor", "software that runs virtual machines"))
        .unwrap();
    let guest_os = graph
        .add_concept(Concept::new("Guest OS", "an operating system running inside a VM"))
        .unwrap();

    let edges = [
        (hypervisor, vm, RelationshipType::Contains),
        (hypervisor, virtual_machine, RelationshipType::Contains),
        (vm, guest_os, RelationshipType::HasComponent),
        (guest_os, virtual_machine, RelationshipType::RelatedTo),
        (vm, virtual_machine, RelationshipType::RelatedTo),
    ];
    for (source, target, ty) in edges {
        graph
            .add_relationship(Relationship::new(source, target, ty, ty.natural_category(), 0.6))
            .unwrap();
    }

    (
        graph,
        VirtualizationIds {
            vm,
            virtual_machine,
            hypervisor,
            guest_os,
        },
    )
}

const TERMS: &[&str] = &[
    "Page Table",
    "page table",
    "PT",
    "Translation Lookaside Buffer",
    "TLB",
    "Virtual Memory (VM)",
    "Virtual Memory",
    "Scheduler",
    "Schedulers",
    "Process",
    "Thread",
    "Context Switch",
    "Interrupt",
    "Kernel",
    "Inode",
];

const DEFINITIONS: &[&str] = &[
    "A page table is a kind of mapping structure.",
    "First, the kernel saves registers; then it loads the next thread.",
    "An interrupt causes the scheduler to run, which leads to a context switch.",
    "Part of the memory subsystem, it contains translations.",
    "A thread is a member of a process.",
    "Unlike a process, a thread shares memory.",
    "Before paging, the system used segments.",
    "Plain text with no cue words.",
];

/// Randomized concepts drawn from a small operating-systems vocabulary
pub fn random_concepts(rng: &mut StdRng, count: usize) -> Vec<Concept> {
    let dims = 4;
    (0..count)
        .map(|_| {
            let term = *TERMS.choose(rng).unwrap();
            let definition = *DEFINITIONS.choose(rng).unwrap();
            let mut concept = Concept::new(term, definition)
                .with_importance(rng.gen_range(0.0..=1.0))
                .with_location(rng.gen_range(0..6), rng.gen_range(0..500));
            if rng.gen_bool(0.5) {
                concept = concept.with_excerpt(format!("{} appears near {}", term, TERMS.choose(rng).unwrap()));
            }
            for _ in 0..rng.gen_range(0..3) {
                concept = concept.with_neighbor(*TERMS.choose(rng).unwrap());
            }
            if rng.gen_bool(0.6) {
                concept = concept.with_embedding((0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect());
            }
            concept
        })
        .collect()
}
