use serde_json::json;
use std::io::Write;

use crate::opportunity::Item;
use crate::semantic::{
    CorpusSource, JsonCorpus, RankParams, SearchError, SearchService, Selection,
};

use super::{corpus_with_scores, vector_with_score, FailingVectorizer, FixedVectorizer, QUERY};

fn defaults() -> RankParams {
    RankParams {
        top_k: 10,
        min_results: 3,
        threshold: 0.75,
    }
}

#[test]
fn test_unavailable_vectorizer_is_not_an_empty_result() {
    let corpus = corpus_with_scores(&[0.9, 0.8, 0.76]);
    let failing = SearchService::new(Box::new(FailingVectorizer), corpus.clone(), defaults());
    let working = SearchService::new(Box::new(FixedVectorizer(QUERY.to_vec())), corpus, defaults());

    let err = failing.search("art classes", None).unwrap_err();
    assert!(matches!(err, SearchError::Unavailable(_)));
    assert!(err.to_string().contains("invalid api key"));

    let report = working.search("art classes", None).unwrap();
    assert_eq!(report.results.len(), 3);
}

#[test]
fn test_unavailable_even_with_empty_corpus() {
    let service = SearchService::new(Box::new(FailingVectorizer), Vec::<Item>::new(), defaults());

    assert!(matches!(
        service.search("art", None),
        Err(SearchError::Unavailable(_))
    ));
}

#[test]
fn test_nothing_scorable_is_a_performed_search() {
    let corpus = vec![super::item("no-vector", None)];
    let service = SearchService::new(Box::new(FixedVectorizer(QUERY.to_vec())), corpus, defaults());

    let report = service.search("art", None).unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.eligible, 0);
    assert_eq!(report.skipped.len(), 1);
}

#[test]
fn test_search_overrides_defaults() {
    let corpus = corpus_with_scores(&[0.90, 0.80, 0.76, 0.50, 0.20]);
    let service = SearchService::new(Box::new(FixedVectorizer(QUERY.to_vec())), corpus, defaults());

    let strict = RankParams {
        threshold: 0.95,
        ..defaults()
    };
    let report = service.search("art", Some(strict)).unwrap();
    assert_eq!(report.selection, Selection::Relaxed);
    assert_eq!(report.qualified, 0);
    assert_eq!(report.results.len(), 3);

    let report = service.search("art", None).unwrap();
    assert_eq!(report.selection, Selection::Qualified);
    assert_eq!(report.qualified, 3);
}

#[test]
fn test_search_over_json_corpus_file() {
    let records = json!([
        {
            "activity_name": "Swim Lessons",
            "cost": "$40",
            "embedding": vector_with_score(0.92)
        },
        {
            "activity_name": "Chess Club",
            "embedding": "not a vector"
        },
        {
            "activity_name": "Pottery",
            "embedding": vector_with_score(0.81)
        },
        {
            "activity_name": "Soccer",
            "embedding": vector_with_score(0.3)
        },
        {
            "activity_name": "Coding Camp"
        }
    ]);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(records.to_string().as_bytes()).unwrap();

    let corpus = JsonCorpus::new(file.path()).load().unwrap();
    assert_eq!(corpus.len(), 5);

    let service = SearchService::new(Box::new(FixedVectorizer(QUERY.to_vec())), corpus, defaults());
    let report = service.search("swimming", None).unwrap();

    let names: Vec<&str> = report
        .results
        .iter()
        .map(|h| h.opportunity["activity_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Swim Lessons", "Pottery", "Soccer"]);
    assert_eq!(report.selection, Selection::Relaxed);
    assert_eq!(report.eligible, 3);

    // embeddings never leak into the output payload
    assert!(report
        .results
        .iter()
        .all(|h| h.opportunity.get("embedding").is_none()));
    assert_eq!(report.results[0].opportunity["cost"], "$40");

    let skipped: Vec<&str> = report.skipped.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(skipped, vec!["Chess Club", "Coding Camp"]);
}

#[test]
fn test_json_output_for_empty_search_is_empty_array() {
    let corpus = vec![super::item("no-vector", None)];
    let service = SearchService::new(Box::new(FixedVectorizer(QUERY.to_vec())), corpus, defaults());

    let output = crate::search_output(&service, "art", defaults(), true).unwrap();

    assert_eq!(output, "[]\n");
}

#[test]
fn test_json_output_lists_hits() {
    let corpus = corpus_with_scores(&[0.9, 0.2]);
    let service = SearchService::new(Box::new(FixedVectorizer(QUERY.to_vec())), corpus, defaults());

    let output = crate::search_output(&service, "art", defaults(), true).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

    let results = parsed.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["opportunity"]["activity_name"], "item-0");
    assert!(results[0]["similarity"].as_f64().unwrap() > 0.89);
}

#[test]
fn test_output_when_vectorizer_fails_is_an_error() {
    let corpus = corpus_with_scores(&[0.9, 0.8, 0.76]);
    let service = SearchService::new(Box::new(FailingVectorizer), corpus, defaults());

    for json in [true, false] {
        let err = crate::search_output(&service, "art", defaults(), json).unwrap_err();

        assert_eq!(err.to_string(), "no search was performed");
        assert!(matches!(
            err.downcast_ref::<SearchError>(),
            Some(SearchError::Unavailable(_))
        ));
        assert!(format!("{err:#}").contains("invalid api key"));
    }
}

#[test]
fn test_text_output_for_empty_search() {
    let service = SearchService::new(
        Box::new(FixedVectorizer(QUERY.to_vec())),
        Vec::<Item>::new(),
        defaults(),
    );

    let output = crate::search_output(&service, "art", defaults(), false).unwrap();

    assert_eq!(output, "No results found.\n");
}
