use sparqlc::{
    EndpointConfig, EndpointSettings, ResultType, Service, SparqlError, SparqlMethod,
};
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_roundtrip_through_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("endpoint.json");

    let mut config = EndpointConfig::new("http://example.com/sparql");
    config.set_method(SparqlMethod::Get);
    config.set_result_type(ResultType::Json);
    config.add_default_graph("urn:g1");
    config.add_named_graph("urn:n1");
    config.add_prefix("ex", "http://example.com/");
    config.set_header("X-Api-Key", "abc");
    config.set_timeout(Some(Duration::from_millis(2500)));
    config.set_max_redirects(1);
    config.set_transport_param("connect_timeout", "3");
    config.save_to_file(&path).unwrap();

    let loaded = EndpointConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_credentials_never_saved() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("endpoint.json");
    let mut service = Service::new("http://example.com/sparql");
    service.authenticate("user", "hunter2");
    service.config().save_to_file(&path).unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(!saved.contains("hunter2"));
    assert_eq!(EndpointConfig::from_file(&path).unwrap().credentials, None);
}

#[test]
fn test_invalid_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("endpoint.json");

    std::fs::write(&path, r#"{"endpoint": "http://x", "encoding": "latin-1"}"#).unwrap();
    assert!(matches!(
        EndpointConfig::from_file(&path),
        Err(SparqlError::Config(_))
    ));

    std::fs::write(&path, r#"{"endpoint": "http://x", "method": "put"}"#).unwrap();
    assert!(matches!(
        EndpointConfig::from_file(&path),
        Err(SparqlError::Config(_))
    ));

    for timeout in ["-1", "1e20"] {
        std::fs::write(
            &path,
            format!(r#"{{"endpoint": "http://x", "timeout": {timeout}}}"#),
        )
        .unwrap();
        assert!(matches!(
            EndpointConfig::from_file(&path),
            Err(SparqlError::Config(_))
        ));
    }

    std::fs::write(&path, r#"{"endpoint": "http://x", "timeout": 0}"#).unwrap();
    assert_eq!(EndpointConfig::from_file(&path).unwrap().timeout(), None);

    assert!(matches!(
        EndpointConfig::from_file(&dir.path().join("missing.json")),
        Err(SparqlError::Io(_))
    ));
}
