use super::Cli;
use super::subcommands::{config_init, render_status};
use chrono::Local;
use clap::{CommandFactory, Parser};
use concierge::config::load_config;
use concierge::guard::UsageStatus;
use concierge::plan::{PendingPlan, PlanStatus};

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn test_parses_nested_subcommands() {
    assert!(Cli::try_parse_from(["concierge", "pending", "clear"]).is_ok());
    assert!(
        Cli::try_parse_from(["concierge", "config", "show", "--config", "/tmp/c.json"]).is_ok()
    );
    assert!(Cli::try_parse_from(["concierge", "pending"]).is_err());
}

#[test]
fn test_render_status_without_plan() {
    let status = UsageStatus {
        used_requests: 3,
        daily_limit: None,
        exhausted: false,
        last_error: None,
    };
    let out = render_status(&status, None);
    assert!(out.contains("Requests today: 3 / unlimited"));
    assert!(out.contains("Pending plan: none"));
    assert!(!out.contains("Last error"));
}

#[test]
fn test_render_status_with_plan_and_error() {
    let status = UsageStatus {
        used_requests: 20,
        daily_limit: Some(20),
        exhausted: true,
        last_error: Some("429 Too Many Requests".to_string()),
    };
    let plan = PendingPlan {
        id: "pending".to_string(),
        status: PlanStatus::AwaitingClarification,
        question: "Which calendar?".to_string(),
        context: None,
        action_payload: None,
        updated_at: Local::now(),
    };
    let out = render_status(&status, Some(&plan));
    assert!(out.contains("Requests today: 20 / 20"));
    assert!(out.contains("Daily limit: exhausted"));
    assert!(out.contains("Last error: 429 Too Many Requests"));
    assert!(out.contains("Which calendar?"));
}

#[test]
fn test_config_init_writes_defaults_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    assert!(config_init(Some(&path), false).unwrap());
    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.cache.capacity, 50);

    std::fs::write(&path, r#"{"cache":{"capacity":7}}"#).unwrap();
    assert!(!config_init(Some(&path), false).unwrap());
    assert_eq!(load_config(Some(&path)).unwrap().cache.capacity, 7);

    assert!(config_init(Some(&path), true).unwrap());
    assert_eq!(load_config(Some(&path)).unwrap().cache.capacity, 50);
}
