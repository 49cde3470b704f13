//! Configuration loading from environment and YAML.

use std::env;
use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use boltgate::config::{BoltScheme, GatewayConfig};

fn clear_boltgate_env() {
    for key in [
        "BOLTGATE_HTTP_HOST",
        "BOLTGATE_HTTP_PORT",
        "BOLTGATE_DRIVER_URI",
        "BOLTGATE_DRIVER_USERNAME",
        "BOLTGATE_DRIVER_PASSWORD",
        "BOLTGATE_FETCH_SIZE",
        "BOLTGATE_VERIFY_CONNECTIVITY",
        "BOLTGATE_DEFAULT_TO_SSR",
        "BOLTGATE_PROFILE_SSR",
        "BOLTGATE_MAX_CONNECTIONS",
    ] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_from_empty_environment() {
    clear_boltgate_env();
    let config = GatewayConfig::from_env().unwrap();
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.fetch_size, 2000);
    assert_eq!(config.driver_uri, "bolt://localhost:7687");
    assert!(!config.verify_connectivity);
    assert!(!config.uses_routing_scheme());
}

#[test]
#[serial]
fn environment_overrides() {
    clear_boltgate_env();
    env::set_var("BOLTGATE_DRIVER_URI", "neo4j://cluster.internal:9999");
    env::set_var("BOLTGATE_FETCH_SIZE", "500");
    env::set_var("BOLTGATE_PROFILE_SSR", "true");

    let config = GatewayConfig::from_env().unwrap();
    assert_eq!(config.fetch_size, 500);
    assert!(config.profile_ssr);
    assert!(config.uses_routing_scheme());
    let uri = config.parse_driver_uri().unwrap();
    assert_eq!(uri.scheme, BoltScheme::Neo4j);
    assert_eq!(uri.host, "cluster.internal");
    assert_eq!(uri.port, 9999);

    clear_boltgate_env();
}

#[test]
#[serial]
fn invalid_env_value_is_an_error() {
    clear_boltgate_env();
    env::set_var("BOLTGATE_FETCH_SIZE", "lots");
    assert!(GatewayConfig::from_env().is_err());
    clear_boltgate_env();
}

#[test]
#[serial]
fn invalid_uri_scheme_is_an_error() {
    clear_boltgate_env();
    env::set_var("BOLTGATE_DRIVER_URI", "http://localhost:7474");
    assert!(GatewayConfig::from_env().is_err());
    clear_boltgate_env();
}

#[test]
fn yaml_file_round_trip() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        "http_host: 127.0.0.1\n\
         http_port: 9090\n\
         driver_uri: neo4j://db:7687\n\
         driver_username: service\n\
         driver_password: s3cret\n\
         fetch_size: 100\n\
         verify_connectivity: true\n\
         default_to_ssr: true\n\
         profile_ssr: false\n\
         max_connections: 4\n\
         daemon: false\n"
    )?;

    let config = GatewayConfig::from_yaml_file(file.path())?;
    assert_eq!(config.http_host, "127.0.0.1");
    assert_eq!(config.http_port, 9090);
    assert_eq!(config.driver_username, "service");
    assert_eq!(config.fetch_size, 100);
    assert!(config.verify_connectivity);
    assert!(config.default_to_ssr);
    assert_eq!(config.bolt_address(), "db:7687");
    Ok(())
}

#[test]
fn yaml_with_invalid_values_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "http_host: ''\n\
         http_port: 9090\n\
         driver_uri: bolt://db:7687\n\
         driver_username: service\n\
         driver_password: ''\n\
         fetch_size: 100\n\
         verify_connectivity: false\n\
         default_to_ssr: false\n\
         profile_ssr: false\n\
         max_connections: 4\n\
         daemon: false\n"
    )
    .unwrap();
    assert!(GatewayConfig::from_yaml_file(file.path()).is_err());
}
