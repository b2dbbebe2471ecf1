use harvest_config::{HarvestConfigLoader, LlmProvider, SourceConfig};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const GRAPHQL_YAML: &str = r#"
version: "1"
source:
  kind: graphql
  api_key: "${TEST_SOURCE_KEY}"
  hosts:
    - twitter241.p.rapidapi.com
    - twitter-x.p.rapidapi.com
fetch:
  pacing_ms: 500
  retry:
    max_attempts: 4
crawl:
  max_pages: 3
classifier:
  provider: claude
  api_key: "${TEST_CLASSIFIER_KEY}"
bot_api:
  base_url: "https://bot.example"
  api_key: plain-key
"#;

#[test]
#[serial]
fn loads_file_with_env_expansion_and_defaults() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "harvest.yaml", GRAPHQL_YAML);

    temp_env::with_vars(
        [
            ("TEST_SOURCE_KEY", Some("src-secret")),
            ("TEST_CLASSIFIER_KEY", Some("llm-secret")),
        ],
        || {
            let config = HarvestConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load harvest config");

            match &config.source {
                SourceConfig::Graphql {
                    api_key,
                    hosts,
                    lookup_path,
                    page_size,
                    ..
                } => {
                    assert_eq!(api_key, "src-secret");
                    assert_eq!(hosts.len(), 2);
                    assert_eq!(lookup_path, "user");
                    assert_eq!(*page_size, 20);
                }
                other => panic!("unexpected source: {other:?}"),
            }

            assert_eq!(config.fetch.pacing_ms, 500);
            assert_eq!(config.fetch.request_timeout_secs, 30);
            assert_eq!(config.fetch.retry.max_attempts, 4);
            assert_eq!(config.fetch.retry.base_delay_ms, 2_000);
            assert_eq!(config.crawl.max_pages, 3);
            assert!((config.crawl.relevance_threshold - 0.7).abs() < f64::EPSILON);
            assert_eq!(config.classifier.provider, LlmProvider::Claude);
            assert_eq!(config.classifier.api_key, "llm-secret");
            assert_eq!(config.classifier.model(), "claude-sonnet-4-20250514");
            assert_eq!(config.bot_api.api_key, "plain-key");
            assert!(config.logging.stderr);
            assert_eq!(config.logging.keep_files, 14);
        },
    );
}

#[test]
#[serial]
fn env_overrides_nested_keys() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "harvest.yaml", GRAPHQL_YAML);

    temp_env::with_vars(
        [
            ("HARVEST__CRAWL__MAX_PAGES", Some("9")),
            ("HARVEST__BOT_API__API_KEY", Some("from-env")),
            ("TEST_SOURCE_KEY", Some("s")),
            ("TEST_CLASSIFIER_KEY", Some("c")),
        ],
        || {
            let config = HarvestConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load harvest config");
            assert_eq!(config.crawl.max_pages, 9);
            assert_eq!(config.bot_api.api_key, "from-env");
        },
    );
}

#[test]
#[serial]
fn nitter_defaults_to_public_instances() {
    let config = HarvestConfigLoader::new()
        .with_yaml_str(
            r#"
source: { kind: nitter }
classifier: { provider: qwen, api_key: "q" }
bot_api: { api_key: "b" }
"#,
        )
        .load()
        .expect("load nitter config");

    match config.source {
        SourceConfig::Nitter { instances } => {
            assert_eq!(instances, vec!["nitter.privacydev.net", "nitter.poast.org"]);
        }
        other => panic!("unexpected source: {other:?}"),
    }
    assert_eq!(
        config.classifier.base_url(),
        "https://dashscope.aliyuncs.com/compatible-mode/v1/"
    );
}

#[test]
#[serial]
fn rejects_empty_host_list_and_bad_threshold() {
    let err = HarvestConfigLoader::new()
        .with_yaml_str(
            r#"
source: { kind: graphql, api_key: "k", hosts: [] }
classifier: { provider: openai, api_key: "k" }
bot_api: { api_key: "b" }
"#,
        )
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("hosts"));

    let err = HarvestConfigLoader::new()
        .with_yaml_str(
            r#"
source: { kind: nitter }
crawl: { relevance_threshold: 1.5 }
classifier: { provider: openai, api_key: "k" }
bot_api: { api_key: "b" }
"#,
        )
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("relevance_threshold"));
}

#[test]
#[serial]
fn missing_required_section_is_an_error() {
    let result = HarvestConfigLoader::new()
        .with_yaml_str("source: { kind: nitter }\n")
        .load();
    assert!(result.is_err());
}
