//! Shared fixtures for integration tests
#![allow(dead_code)]

use sift::corpus::{Corpus, Metadata};
use sift::embedding::{HashingEmbedder, IndexKind, IndexOptions};
use sift::retrieval::{PipelineOptions, RetrievalPipeline, TermOverlapReranker};
use std::sync::Arc;

/// (id, title, abstract)
pub const PAPERS: [(&str, &str, &str); 10] = [
    (
        "1706.03762",
        "Attention Is All You Need",
        "We propose the Transformer, a sequence transduction architecture based solely on attention mechanisms.",
    ),
    (
        "1512.03385",
        "Deep Residual Learning for Image Recognition",
        "We present a residual learning framework to ease the training of very deep convolutional networks.",
    ),
    (
        "1312.5602",
        "Playing Atari with Deep Reinforcement Learning",
        "We present the first deep learning model to learn control policies from raw pixels using reinforcement learning.",
    ),
    (
        "1810.04805",
        "BERT: Pre-training of Deep Bidirectional Transformers",
        "We introduce a language representation model pre-trained on unlabeled text with masked language modeling.",
    ),
    (
        "1609.02907",
        "Semi-Supervised Classification with Graph Convolutional Networks",
        "We present a scalable approach for semi-supervised learning on graph-structured data.",
    ),
    (
        "1406.2661",
        "Generative Adversarial Networks",
        "We propose a framework for estimating generative models via an adversarial process between two networks.",
    ),
    (
        "1412.6980",
        "Adam: A Method for Stochastic Optimization",
        "We introduce Adam, an algorithm for first-order gradient-based optimization of stochastic objective functions.",
    ),
    (
        "2005.11401",
        "Retrieval-Augmented Generation for Knowledge-Intensive NLP Tasks",
        "We combine a dense passage retriever with a sequence-to-sequence generator for open-domain question answering.",
    ),
    (
        "quant-ph/9508027",
        "Polynomial-Time Algorithms for Prime Factorization on a Quantum Computer",
        "A quantum computer can factor integers and compute discrete logarithms in polynomial time.",
    ),
    (
        "astro-ph/9805201",
        "Observational Evidence from Supernovae for an Accelerating Universe",
        "Distant type Ia supernovae indicate that the expansion of the universe is accelerating.",
    ),
];

pub fn paper_metadata(id: &str, title: &str, abstract_text: &str) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("id".to_string(), id.to_string());
    meta.insert("title".to_string(), title.to_string());
    meta.insert("abstract".to_string(), abstract_text.to_string());
    meta.insert("categories".to_string(), "cs.LG".to_string());
    meta
}

/// The first `n` papers, text = title + " " + abstract
pub fn sample_corpus(n: usize) -> Corpus {
    let papers = &PAPERS[..n.min(PAPERS.len())];
    Corpus::from_parts(
        papers.iter().map(|(_, t, a)| format!("{} {}", t, a)).collect(),
        papers.iter().map(|(id, _, _)| id.to_string()).collect(),
        papers
            .iter()
            .map(|(id, t, a)| paper_metadata(id, t, a))
            .collect(),
    )
    .unwrap()
}

/// Offline pipeline over `corpus`
pub fn offline_pipeline(corpus: Corpus, kind: IndexKind, options: PipelineOptions) -> RetrievalPipeline {
    RetrievalPipeline::from_corpus(
        Arc::new(HashingEmbedder::new(256).unwrap()),
        Arc::new(TermOverlapReranker::new().unwrap()),
        corpus,
        &IndexOptions {
            kind,
            ..Default::default()
        },
        4,
        options,
    )
    .unwrap()
}
