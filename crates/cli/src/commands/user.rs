//! User command - register and list users

use anyhow::{Context, Result};

use super::{Backend, print_json};
use crate::args::{UserArgs, UserCommands};
use crate::config::AppConfig;

pub async fn execute(args: UserArgs, config: &AppConfig) -> Result<()> {
    let backend = Backend::open(config).await?;

    match args.command {
        UserCommands::Add {
            username,
            avatar,
            json,
        } => {
            let user = backend
                .store
                .register_user(&username, avatar.as_deref())
                .await
                .with_context(|| format!("Failed to register user '{}'", username))?;

            if json {
                print_json(&user)?;
            } else {
                println!("Registered user {} ({})", user.id, user.username);
            }
        }
        UserCommands::List { json } => {
            let users = backend
                .store
                .list_users()
                .await
                .context("Failed to list users")?;

            if json {
                print_json(&users)?;
            } else if users.is_empty() {
                println!("No users registered.");
            } else {
                for user in &users {
                    match &user.avatar {
                        Some(avatar) => println!("{:>4}  {}  [{}]", user.id, user.username, avatar),
                        None => println!("{:>4}  {}", user.id, user.username),
                    }
                }
            }
        }
    }

    Ok(())
}
