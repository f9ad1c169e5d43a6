//! Friends command - request, answer and list friendships

use anyhow::{Context, Result};
use circlefeed_domain::{FriendRequestId, FriendRequestStatus, UserId, usecases::Friendships};
use serde_json::json;

use super::{Backend, print_json, timestamp};
use crate::args::{FriendsArgs, FriendsCommands};
use crate::config::AppConfig;

pub async fn execute(args: FriendsArgs, config: &AppConfig) -> Result<()> {
    let backend = Backend::open(config).await?;
    let friendships = Friendships::new(backend.store, backend.clock);

    match args.command {
        FriendsCommands::Request { from, to } => {
            let request = friendships
                .request(UserId(from), UserId(to))
                .await
                .context("Failed to send friend request")?;
            println!(
                "Friend request {} sent from {} to {}",
                request.id, request.sender, request.receiver
            );
        }
        FriendsCommands::Accept { request, responder } => {
            let answered = friendships
                .respond(FriendRequestId(request), UserId(responder), true)
                .await
                .context("Failed to accept friend request")?;
            println!("Friend request {} {}", answered.id, answered.status);
        }
        FriendsCommands::Reject { request, responder } => {
            let answered = friendships
                .respond(FriendRequestId(request), UserId(responder), false)
                .await
                .context("Failed to reject friend request")?;
            println!("Friend request {} {}", answered.id, answered.status);
        }
        FriendsCommands::List { user, json } => {
            let user = UserId(user);
            let friends = friendships
                .friends_of(user)
                .await
                .context("Failed to load friends")?;
            let requests = friendships
                .requests_for(user)
                .await
                .context("Failed to load friend requests")?;

            if json {
                print_json(&json!({ "friends": friends, "requests": requests }))?;
                return Ok(());
            }

            if friends.is_empty() {
                println!("No friends yet.");
            } else {
                let ids: Vec<String> = friends.iter().map(ToString::to_string).collect();
                println!("Friends: {}", ids.join(", "));
            }

            let pending: Vec<_> = requests
                .iter()
                .filter(|r| r.status == FriendRequestStatus::Pending)
                .collect();
            for request in pending {
                let direction = if request.receiver == user {
                    format!("from {}", request.sender)
                } else {
                    format!("to {}", request.receiver)
                };
                println!(
                    "Pending request {} {} (sent {})",
                    request.id,
                    direction,
                    timestamp(request.created_at)
                );
            }
        }
    }

    Ok(())
}
