//! Configuration loading tests: file -> environment -> CLI flags.

use std::io::Write;

use clap::Parser;
use serial_test::serial;

use dnstail_cli::cli::DnstailCli;

fn cli(args: &[&str]) -> DnstailCli {
    DnstailCli::try_parse_from(std::iter::once("dnstail").chain(args.iter().copied()))
        .expect("arguments should parse")
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
    write!(file, "{content}").expect("should write config");
    file
}

#[tokio::test]
#[serial]
async fn defaults_without_config_file() {
    let config = cli(&[]).load_config().await.expect("defaults should load");
    assert_eq!(config.sources.hosts, ["pihole1", "pihole2"]);
    assert_eq!(config.sources.username, "pi");
}

#[tokio::test]
#[serial]
async fn flags_override_file() {
    let file = write_config(
        "[sources]\nhosts = [\"dns-a\", \"dns-b\"]\n\n[stream]\nblocked_only = false\nfilter = \"nas\"",
    );
    let path = file.path().to_str().unwrap();

    let config = cli(&["-c", path, "--pihole1", "dns-x", "-b", "-f", "printer"])
        .load_config()
        .await
        .expect("config should load");

    assert_eq!(config.sources.hosts, ["dns-x", "dns-b"]);
    assert!(config.stream.blocked_only);
    assert_eq!(config.stream.filter, "printer");
}

#[tokio::test]
#[serial]
async fn env_sits_between_file_and_flags() {
    let file = write_config("[sources]\nusername = \"from-file\"");
    let path = file.path().to_str().unwrap().to_owned();

    // SAFETY: serialized test; no other thread reads the environment concurrently.
    unsafe { std::env::set_var("DNSTAIL_SOURCES_USERNAME", "from-env") };
    let from_env = cli(&["-c", &path]).load_config().await;
    let from_flag = cli(&["-c", &path, "-u", "from-flag"]).load_config().await;
    unsafe { std::env::remove_var("DNSTAIL_SOURCES_USERNAME") };

    assert_eq!(from_env.unwrap().sources.username, "from-env");
    assert_eq!(from_flag.unwrap().sources.username, "from-flag");
}

#[tokio::test]
#[serial]
async fn missing_file_is_config_error() {
    let err = cli(&["-c", "/nonexistent/dnstail.toml"])
        .load_config()
        .await
        .expect_err("missing file should fail");
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
#[serial]
async fn invalid_override_fails_validation() {
    let err = cli(&["--log-format", "xml"])
        .load_config()
        .await
        .expect_err("unknown log format should fail");
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("general.log_format"));
}

#[tokio::test]
#[serial]
async fn duplicate_hosts_are_rejected() {
    let err = cli(&["--host", "dns-a", "--host", "dns-a"])
        .load_config()
        .await
        .expect_err("duplicate hosts should fail");
    assert_eq!(err.exit_code(), 2);
}
