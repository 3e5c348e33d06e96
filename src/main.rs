mod config;
mod google;
mod hue;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;

use huecal_core::{build_timeline, plan_actions, LightingAction, MeetingWindow};

#[derive(Parser)]
#[command(name = "huecal")]
#[command(about = "Drive Philips Hue lighting scenes from your Google Calendar meetings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Google Calendar
    Auth,
    /// Fetch today's meetings and print the timeline and the lighting
    /// actions that would be scheduled, without touching the bridge
    Plan,
    /// Replace the bridge's lighting schedule with one built from today's
    /// meetings
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Auth => cmd_auth().await,
        Commands::Plan => cmd_plan().await,
        Commands::Sync => cmd_sync().await,
    }
}

async fn cmd_auth() -> Result<()> {
    let cfg = config::load_config()?;

    println!("Authenticating with Google...");

    let account_tokens = google::authenticate(&cfg.google).await?;
    let account = google::fetch_user_email(&cfg.google, &account_tokens).await?;

    let mut tokens = config::load_tokens()?;
    tokens.google.insert(account.clone(), account_tokens);
    config::save_tokens(&tokens)?;

    println!("\nAuthenticated as: {}", account);
    println!("\nIf this is not the account in your config, set it explicitly:");
    println!();
    println!("[google]");
    println!("account = \"{}\"", account);
    println!();
    println!("Then run `huecal sync` to publish today's lighting schedule.");

    Ok(())
}

async fn cmd_plan() -> Result<()> {
    let cfg = config::load_config()?;
    let (windows, actions) = build_day(&cfg).await?;

    print_windows(&windows);
    println!();
    println!("Would schedule:");
    for action in &actions {
        println!(
            "  {} -> {} ({})",
            action.at.format("%H:%M:%S"),
            action.scene.label(),
            action.name
        );
    }
    if actions.is_empty() {
        println!("  (nothing, no qualifying meetings today)");
    }

    Ok(())
}

async fn cmd_sync() -> Result<()> {
    let cfg = config::load_config()?;
    let (windows, actions) = build_day(&cfg).await?;

    print_windows(&windows);

    println!();
    println!("Set Hue schedule:");

    let bridge = hue::HueBridge::new(&cfg.hue.host, &cfg.hue.app_key);
    let group_id = bridge.group_id(&cfg.hue.group).await?;
    let scene_ids = bridge.resolve_scenes(&cfg.hue.scenes).await?;

    // Wipe whatever a previous run left behind before publishing
    let deleted = bridge.clear_own_schedules().await?;
    println!("{} stale schedule(s) deleted.", deleted);
    println!();

    let mut created = 0;
    for action in &actions {
        bridge
            .create_group_schedule(
                &action.name,
                action.at,
                &group_id,
                scene_ids.action_for(action.scene),
            )
            .await?;
        created += 1;
        println!(
            "Start: {} Scene: {}",
            action.at.format("%Y-%m-%dT%H:%M:%S"),
            action.scene.label()
        );
    }

    println!();
    println!("{} schedule(s) created.", created);

    Ok(())
}

/// Fetch today's events and run them through the timeline builder.
async fn build_day(
    cfg: &config::Config,
) -> Result<(BTreeMap<String, MeetingWindow>, Vec<LightingAction>)> {
    let rules = cfg.filter_rules();
    let policy = cfg.schedule_policy()?;

    let stored = config::load_tokens()?;
    let account = match &cfg.google.account {
        Some(account) => account.clone(),
        // Fall back to the single stored account
        None => match stored.google.keys().next() {
            Some(account) if stored.google.len() == 1 => account.clone(),
            _ => anyhow::bail!(
                "No account configured.\n\
                Run `huecal auth` first, then set [google] account in config.toml"
            ),
        },
    };

    let mut account_tokens = stored
        .google
        .get(&account)
        .cloned()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No tokens stored for account '{}'. Run `huecal auth` first.",
                account
            )
        })?;

    if google::tokens_need_refresh(&account_tokens) {
        println!("Access token expired, refreshing...");
        account_tokens = google::refresh_token(&cfg.google, &account_tokens).await?;
        let mut tokens = stored;
        tokens.google.insert(account.clone(), account_tokens.clone());
        config::save_tokens(&tokens)?;
    }

    println!("Getting upcoming calendar events...");
    let events = google::fetch_meetings(&cfg.google, &cfg.calendar, &account_tokens).await?;
    if events.is_empty() {
        println!("No upcoming events found.");
    }

    let now = Local::now().naive_local();
    let windows = build_timeline(&events, now, &rules, &policy)?;
    let actions = plan_actions(&windows, now, &policy);

    Ok((windows, actions))
}

fn print_windows(windows: &BTreeMap<String, MeetingWindow>) {
    println!();
    println!("Today's meeting windows:");
    for window in windows.values() {
        let after = match window.gap_after_minutes {
            Some(minutes) => minutes.to_string(),
            None => "last".to_string(),
        };
        println!(
            "  Start: {}, End: {}, Duration: {}, Before: {}, After: {}, Title: {}",
            window.start.format("%H:%M:%S"),
            window.end.format("%H:%M:%S"),
            window.duration_minutes,
            window.gap_before_minutes,
            after,
            window.title
        );
    }
    if windows.is_empty() {
        println!("  (none)");
    }
}
