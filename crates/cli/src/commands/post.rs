//! Post command - create posts and look them up by id

use anyhow::{Context, Result};
use circlefeed_domain::{
    Audience, DisplayAttrs, MediaPayload, NewPostRequest, Post, PostId, UserId,
    usecases::{FeedQueryEngine, PostAuthoring},
};
use std::path::Path;

use super::{Backend, print_json, timestamp};
use crate::args::{PostArgs, PostCommands};
use crate::config::AppConfig;

pub async fn execute(args: PostArgs, config: &AppConfig) -> Result<()> {
    let backend = Backend::open(config).await?;

    match args.command {
        PostCommands::Create {
            author,
            caption,
            recipients,
            to_friends,
            image,
            frame,
            font,
            json,
        } => {
            let media = read_image(&image).await?;
            let audience = Audience {
                recipients: recipients.into_iter().map(UserId).collect(),
                include_friends: to_friends,
            };

            let authoring = PostAuthoring::new(
                backend.media,
                backend.store.clone(),
                backend.store.clone(),
                backend.store,
                backend.clock,
            );
            let post = authoring
                .create_post(NewPostRequest {
                    author: UserId(author),
                    caption,
                    audience,
                    media,
                    display: DisplayAttrs { frame, font },
                })
                .await
                .context("Failed to create post")?;

            if json {
                print_json(&post)?;
            } else {
                println!("Created post {}", post.id);
                print_post(&post);
            }
        }
        PostCommands::Show { id, json } => {
            let feed = FeedQueryEngine::new(backend.store);
            let post = feed
                .get_post_by_id(PostId(id))
                .await
                .context("Failed to load post")?;

            if json {
                print_json(&post)?;
            } else {
                print_post(&post);
            }
        }
    }

    Ok(())
}

async fn read_image(path: &Path) -> Result<MediaPayload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(MediaPayload { file_name, bytes })
}

fn print_post(post: &Post) {
    println!("  author:  {}", post.author_id);
    if let Some(caption) = &post.caption {
        println!("  caption: {}", caption);
    }
    println!("  media:   {}", post.media_url);
    if let Some(frame) = &post.display.frame {
        println!("  frame:   {}", frame);
    }
    if let Some(font) = &post.display.font {
        println!("  font:    {}", font);
    }
    println!("  created: {}", timestamp(post.created_at));
    let viewers: Vec<String> = post.viewers.iter().map(|id| id.to_string()).collect();
    println!("  viewers: {}", viewers.join(", "));
}
