//! Comment and react commands

use anyhow::{Context, Result};
use circlefeed_domain::{PostId, UserId, usecases::Engagement};

use super::Backend;
use crate::args::{CommentArgs, ReactArgs};
use crate::config::AppConfig;

pub async fn comment(args: CommentArgs, config: &AppConfig) -> Result<()> {
    let backend = Backend::open(config).await?;
    let engagement = Engagement::new(backend.store, backend.clock);

    let comment = engagement
        .comment(UserId(args.user), PostId(args.post), &args.text)
        .await
        .context("Failed to add comment")?;

    println!("Comment {} added to post {}", comment.id, comment.post_id);
    Ok(())
}

pub async fn react(args: ReactArgs, config: &AppConfig) -> Result<()> {
    let backend = Backend::open(config).await?;
    let engagement = Engagement::new(backend.store, backend.clock);

    let reaction = engagement
        .react(UserId(args.user), PostId(args.post), &args.kind)
        .await
        .context("Failed to add reaction")?;

    println!(
        "Reacted '{}' to post {}",
        reaction.kind.as_str(),
        reaction.post_id
    );
    Ok(())
}
