use crate::models::ValidationErrors;
use crate::run_search;
use crate::similarity::{SimilarityError, SimilarityService};
use crate::tests::{strings, StubEmbedder, StubLoader};

fn service_with(embedder: StubEmbedder) -> SimilarityService {
    SimilarityService::new("test-model", Box::new(StubLoader::new(embedder)))
}

#[test]
fn test_search_loads_ranks_and_releases() {
    let embedder = StubEmbedder::default()
        .with("What can I use to cut wood?", vec![1.0, 0.0])
        .with("Circular saw", vec![0.95, 0.312_249_9])
        .with("Hammer", vec![0.75, 0.661_437_8]);
    let service = service_with(embedder);

    let results = run_search(
        &service,
        strings(&["What can I use to cut wood?"]),
        strings(&["Hammer", "Circular saw"]),
        2,
    )
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].matches[0].product, "Circular saw");
    assert_eq!(results[0].matches[0].score, 0.95);
    assert_eq!(results[0].matches[1].product, "Hammer");
    assert!(!service.is_loaded());
}

#[test]
fn test_search_validates_before_loading() {
    let embedder = StubEmbedder::default();
    let calls = embedder.calls();
    let service = service_with(embedder);

    let err = run_search(&service, strings(&["q"]), vec![], 0).unwrap_err();

    let errors = err.downcast_ref::<ValidationErrors>().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(!service.is_loaded());
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_search_releases_model_on_failure() {
    let service = service_with(StubEmbedder::default().failing("Test error"));

    let err = run_search(&service, strings(&["q"]), strings(&["p"]), 1).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SimilarityError>(),
        Some(SimilarityError::Embedding(_))
    ));
    assert!(!service.is_loaded());
}
