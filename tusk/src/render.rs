//! Terminal output for statuses, notifications and accounts

use anyhow::Result;
use clap::ValueEnum;
use libtusk::state::StoredDefaults;
use libtusk::types::{Account, Notification, NotificationKind, Status};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON array
    Json,
    /// One JSON object per line
    Jsonl,
}

pub fn print_items<T: Serialize>(
    items: &[T],
    format: OutputFormat,
    text: impl Fn(&T) -> String,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for item in items {
                println!("{}", text(item));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Jsonl => {
            for item in items {
                println!("{}", serde_json::to_string(item)?);
            }
        }
    }
    Ok(())
}

/// Render one status, honouring content warnings.
pub fn status_text(status: &Status, defaults: &StoredDefaults) -> String {
    let shown = status.display_status();
    let mut header = format!(
        "[{}] @{}  {}",
        status.id,
        shown.account.acct,
        shown.created_at.format("%Y-%m-%d %H:%M")
    );
    if status.reblog.is_some() {
        header.push_str(&format!("  (boosted by @{})", status.account.acct));
    }
    let mut flags = Vec::new();
    if shown.is_favourited() {
        flags.push("★");
    }
    if shown.is_reblogged() {
        flags.push("⟲");
    }
    if !flags.is_empty() {
        header.push_str("  ");
        header.push_str(&flags.join(" "));
    }

    let body = match shown.warning() {
        Some(warning) if defaults.is_suppressed(status) => format!("CW: {}", warning),
        Some(warning) => format!("CW: {}\n{}", warning, strip_html(&shown.content)),
        None => strip_html(&shown.content),
    };
    format!("{}\n{}\n", header, indent(&body))
}

pub fn notification_text(notification: &Notification, defaults: &StoredDefaults) -> String {
    let what = match notification.kind {
        NotificationKind::Mention => "mentioned you",
        NotificationKind::Reblog => "boosted your post",
        NotificationKind::Favourite => "favourited your post",
        NotificationKind::Follow => "followed you",
        NotificationKind::FollowRequest => "requested to follow you",
        NotificationKind::Poll => "poll ended",
        NotificationKind::Status => "posted",
        NotificationKind::Update => "edited a post",
        NotificationKind::Other => "did something",
    };
    let line = format!(
        "[{}] @{} {}  {}",
        notification.id,
        notification.account.acct,
        what,
        notification.created_at.format("%Y-%m-%d %H:%M")
    );
    match &notification.status {
        Some(status) => format!("{}\n{}", line, indent(&status_text(status, defaults))),
        None => line,
    }
}

pub fn account_text(account: &Account) -> String {
    let name = if account.display_name.is_empty() {
        &account.username
    } else {
        &account.display_name
    };
    format!("[{}] {} (@{})", account.id, name, account.acct)
}

pub fn profile_header(account: &Account) -> String {
    format!(
        "{}\n  {} posts, {} following, {} followers\n{}",
        account_text(account),
        account.statuses_count,
        account.following_count,
        account.followers_count,
        indent(&strip_html(&account.note))
    )
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce status HTML to plain text.
pub fn strip_html(html: &str) -> String {
    let html = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p><p>", "\n\n");

    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}
