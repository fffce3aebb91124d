//! Configuration + corpus loading integration test
//!
//! Writes a config file and an arXiv metadata dump to disk, then builds a pipeline
//! from them the same way the `sift search` command does.

use sift::config::Config;
use sift::corpus::{load_arxiv_metadata, MetadataExt};
use sift::embedding::{embedder_for_model, IndexKind};
use sift::retrieval::{reranker_for_model, QueryRequest, RetrievalPipeline};
use sift::SiftError;
use std::time::Duration;
use tempfile::TempDir;

const ARXIV_LINES: &str = r#"{"id": "0704.0001", "title": "Calculation of prompt diphoton production cross sections at Tevatron and LHC energies", "abstract": "A fully differential calculation in perturbative quantum chromodynamics is presented for the production of massive photon pairs at hadron colliders.", "authors": "C. Balázs, E. L. Berger, P. M. Nadolsky, C.-P. Yuan", "categories": "hep-ph", "update_date": "2008-11-13", "journal-ref": null}
{"id": "0704.0002", "title": "Sparsity-certifying Graph Decompositions", "abstract": "We describe a new algorithm, the (k,l)-pebble game with colors, and use it to obtain a characterization of the family of (k,l)-sparse graphs.", "authors": "Ileana Streinu, Louis Theran", "categories": "math.CO cs.CG", "update_date": "2008-12-13"}
{"id": "0704.0003", "title": "The evolution of the Earth-Moon system based on the dark matter field fluid model", "abstract": "The evolution of Earth-Moon system is described by the dark matter field fluid model proposed in the Meeting of Division of Particle and Field 2004.", "authors": "Hongjun Pan", "categories": "physics.gen-ph", "update_date": "2008-01-13"}
{"title": "Record without an id is skipped", "abstract": "Nothing to see here."}
{"id": "0704.0004", "title": "A determinant of Stirling cycle numbers counts unlabeled acyclic single-source automata", "abstract": "We show that a determinant of Stirling cycle numbers counts unlabeled acyclic single-source automata.", "authors": "David Callan", "categories": "math.CO", "update_date": "2007-05-23", "versions": [{"version": "v1"}]}
"#;

fn write_fixture(temp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let corpus_path = temp.path().join("arxiv.jsonl");
    std::fs::write(&corpus_path, ARXIV_LINES).unwrap();

    let mut config = Config::default();
    config.corpus.path = corpus_path.clone();
    config.server.socket_path = temp.path().join("sift.sock");
    config.retrieval.query_timeout = "5s".to_string();

    let config_path = temp.path().join("config.toml");
    config.save(&config_path).unwrap();

    (config_path, corpus_path)
}

#[test]
fn test_load_arxiv_metadata_from_disk() {
    let temp = TempDir::new().unwrap();
    let (_, corpus_path) = write_fixture(&temp);

    let corpus = load_arxiv_metadata(&corpus_path).unwrap();
    assert_eq!(corpus.len(), 4);

    let first = &corpus.documents()[0];
    assert_eq!(first.id, "0704.0001");
    assert!(first
        .text
        .starts_with("Calculation of prompt diphoton production cross sections"));
    assert_eq!(first.metadata.field("update_date"), "2008-11-13");
    assert_eq!(first.metadata.field("journal-ref"), "");

    let last = &corpus.documents()[3];
    assert_eq!(last.metadata.field("versions"), r#"[{"version":"v1"}]"#);
}

#[test]
fn test_config_file_with_profile() {
    let temp = TempDir::new().unwrap();
    let (config_path, corpus_path) = write_fixture(&temp);

    let config = Config::load_with_profile(&config_path, "offline").unwrap();
    assert_eq!(config.embedding.model, "hashing-384");
    assert_eq!(config.reranker.model, "term-overlap");
    assert_eq!(config.corpus_path().unwrap(), corpus_path);

    let options = config.pipeline_options().unwrap();
    assert_eq!(options.query_timeout, Some(Duration::from_secs(5)));

    let fast = Config::load_with_profile(&config_path, "fast").unwrap();
    assert_eq!(fast.index.kind, IndexKind::Hnsw);

    assert!(matches!(
        Config::load_with_profile(&config_path, "nonexistent"),
        Err(SiftError::Config(_))
    ));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");

    let mut config = Config::default();
    config.reranker.batch_size = 0;
    config.save(&config_path).unwrap();

    assert!(matches!(
        Config::load(&config_path),
        Err(SiftError::ConfigValidation { .. })
    ));

    assert!(matches!(
        Config::load(&temp.path().join("missing.toml")),
        Err(SiftError::ConfigNotFound { .. })
    ));
}

#[tokio::test]
async fn test_pipeline_from_config() {
    let temp = TempDir::new().unwrap();
    let (config_path, _) = write_fixture(&temp);
    let config = Config::load_with_profile(&config_path, "offline").unwrap();

    let corpus = load_arxiv_metadata(&config.corpus_path().unwrap()).unwrap();
    let embedder = embedder_for_model(
        &config.embedding.model,
        config.embedding.batch_size,
        config.cache_dir().unwrap(),
    )
    .unwrap();
    let reranker =
        reranker_for_model(&config.reranker.model, config.reranker.batch_size, None).unwrap();

    let pipeline = RetrievalPipeline::from_corpus(
        embedder,
        reranker,
        corpus,
        &config.index_options(),
        config.embedding.batch_size,
        config.pipeline_options().unwrap(),
    )
    .unwrap();

    let output = pipeline
        .retrieve(&QueryRequest::new(
            "dark matter fluid model of the Earth-Moon system",
            config.retrieval.default_top_k,
            config.retrieval.default_initial_k,
        ))
        .await
        .unwrap();

    assert_eq!(output.results.len(), 4);
    assert_eq!(output.results[0].id, "0704.0003");
    assert_eq!(output.results[0].metadata.field("authors"), "Hongjun Pan");
}
