//! Feed command - viewer-scoped reads

use anyhow::{Context, Result};
use circlefeed_domain::{FeedQuery, PostView, UserId, usecases::FeedQueryEngine};

use super::{Backend, print_json, timestamp};
use crate::args::FeedArgs;
use crate::config::AppConfig;

pub async fn execute(args: FeedArgs, config: &AppConfig) -> Result<()> {
    let backend = Backend::open(config).await?;
    let feed = FeedQueryEngine::new(backend.store);

    let views = feed
        .viewable_posts(FeedQuery::new(UserId(args.viewer), args.author))
        .await
        .context("Failed to load feed")?;

    if args.json {
        return print_json(&views);
    }

    if views.is_empty() {
        println!("Nothing to see yet.");
        return Ok(());
    }

    for view in &views {
        print_view(view);
        println!();
    }

    Ok(())
}

fn print_view(view: &PostView) {
    println!(
        "#{}  {}  {}",
        view.id,
        view.author.username,
        timestamp(view.created_at)
    );
    if let Some(caption) = &view.caption {
        println!("  {}", caption);
    }
    println!("  media: {}", view.media_url);
    match (&view.display.frame, &view.display.font) {
        (None, None) => {}
        (frame, font) => println!(
            "  frame: {}  font: {}",
            frame.as_deref().unwrap_or("-"),
            font.as_deref().unwrap_or("-")
        ),
    }
    if view.comment_count > 0 {
        println!("  your comments: {}", view.comment_count);
    }
    if !view.reactions.is_empty() {
        let kinds: Vec<&str> = view.reactions.iter().map(|r| r.kind.as_str()).collect();
        println!("  your reactions: {}", kinds.join(", "));
    }
}
