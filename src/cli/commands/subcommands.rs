use anyhow::{Context, Result};
use concierge::clock::SystemClock;
use concierge::config::{Config, get_config_path, get_db_path, load_config, save_config};
use concierge::guard::{UsageGuard, UsageStatus};
use concierge::plan::{PendingPlan, PendingPlanStore};
use concierge::storage::{KeyValueStore, StateDb};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn open_state(config: &Config) -> Result<Arc<StateDb>> {
    let db_path = get_db_path(config)?;
    let db = StateDb::open(&db_path)
        .with_context(|| format!("failed to open state db at {}", db_path.display()))?;
    Ok(Arc::new(db))
}

fn plan_store(db: Arc<StateDb>) -> PendingPlanStore {
    PendingPlanStore::new(db, SystemClock::shared())
}

pub(super) fn render_status(status: &UsageStatus, plan: Option<&PendingPlan>) -> String {
    let mut out = String::new();
    let limit = status
        .daily_limit
        .map_or_else(|| "unlimited".to_string(), |l| l.to_string());
    let _ = writeln!(out, "Requests today: {} / {}", status.used_requests, limit);
    if status.exhausted {
        let _ = writeln!(out, "Daily limit: exhausted");
    }
    if let Some(ref err) = status.last_error {
        let _ = writeln!(out, "Last error: {}", err);
    }
    match plan {
        Some(plan) => {
            let _ = writeln!(out, "Pending plan: {} ({})", plan.status, plan.question);
            let _ = writeln!(out, "  updated {}", plan.updated_at.format("%Y-%m-%d %H:%M"));
        }
        None => {
            let _ = writeln!(out, "Pending plan: none");
        }
    }
    out
}

pub(super) fn status_command(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let db = open_state(&config)?;
    let store: Arc<dyn KeyValueStore> = db.clone();
    let guard = UsageGuard::with_store(config.guard.clone(), SystemClock::shared(), store);
    let plan = plan_store(db).get_pending()?;

    print!("{}", render_status(&guard.status(), plan.as_ref()));
    Ok(())
}

pub(super) fn pending_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    match plan_store(open_state(&config)?).get_pending()? {
        Some(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
        None => println!("No pending plan."),
    }
    Ok(())
}

pub(super) fn pending_clear(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = plan_store(open_state(&config)?);
    if store.is_waiting()? {
        store.clear_pending()?;
        println!("Pending plan cleared.");
    } else {
        println!("No pending plan.");
    }
    Ok(())
}

fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(p) => Ok(p.to_path_buf()),
        None => get_config_path(),
    }
}

/// Returns whether a file was written.
pub(super) fn config_init(config_path: Option<&Path>, force: bool) -> Result<bool> {
    let path = resolve_config_path(config_path)?;
    if path.exists() && !force {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
        return Ok(false);
    }
    save_config(&Config::default(), Some(&path))?;
    println!("Wrote default config to {}", path.display());
    Ok(true)
}

pub(super) fn config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub(super) fn config_path(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_config_path(config_path)?;
    let marker = if path.exists() { "" } else { " (not created yet)" };
    println!("{}{}", path.display(), marker);
    Ok(())
}
