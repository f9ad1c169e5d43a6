//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// circlefeed: share photo posts with a chosen circle and read what was shared with you
#[derive(Parser, Debug)]
#[command(name = "circlefeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration management
    Config(ConfigArgs),

    /// Manage registered users
    User(UserArgs),

    /// Send, answer and list friend requests
    Friends(FriendsArgs),

    /// Create and inspect posts
    Post(PostArgs),

    /// Show the posts visible to a viewer, newest first
    Feed(FeedArgs),

    /// Comment on a post you can see
    Comment(CommentArgs),

    /// React to a post you can see
    React(ReactArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./circlefeed.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a new user
    Add {
        #[arg(long)]
        username: String,

        /// Avatar image reference shown next to the user's posts
        #[arg(long)]
        avatar: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct FriendsArgs {
    #[command(subcommand)]
    pub command: FriendsCommands,
}

#[derive(Subcommand, Debug)]
pub enum FriendsCommands {
    /// Send a friend request
    Request {
        #[arg(long)]
        from: i64,

        #[arg(long)]
        to: i64,
    },

    /// Accept a pending request addressed to you
    Accept {
        #[arg(long)]
        request: i64,

        /// The receiving user answering the request
        #[arg(long = "as")]
        responder: i64,
    },

    /// Reject a pending request addressed to you
    Reject {
        #[arg(long)]
        request: i64,

        /// The receiving user answering the request
        #[arg(long = "as")]
        responder: i64,
    },

    /// List a user's accepted friends and open requests
    List {
        #[arg(long)]
        user: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PostArgs {
    #[command(subcommand)]
    pub command: PostCommands,
}

#[derive(Subcommand, Debug)]
pub enum PostCommands {
    /// Upload an image and share it with an audience
    Create {
        #[arg(long)]
        author: i64,

        #[arg(long)]
        caption: Option<String>,

        /// Recipient user ids (comma-separated or repeated)
        #[arg(long = "to", value_delimiter = ',')]
        recipients: Vec<i64>,

        /// Also share with every accepted friend of the author
        #[arg(long)]
        to_friends: bool,

        /// Image file to upload
        #[arg(long)]
        image: PathBuf,

        #[arg(long)]
        frame: Option<String>,

        #[arg(long)]
        font: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a post by id, including its viewer set
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct FeedArgs {
    /// The user reading the feed
    #[arg(long)]
    pub viewer: i64,

    /// Only posts by this author (0 = everyone)
    #[arg(long, default_value_t = 0)]
    pub author: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CommentArgs {
    #[arg(long)]
    pub user: i64,

    #[arg(long)]
    pub post: i64,

    #[arg(long)]
    pub text: String,
}

#[derive(Args, Debug)]
pub struct ReactArgs {
    #[arg(long)]
    pub user: i64,

    #[arg(long)]
    pub post: i64,

    /// Reaction kind, e.g. like, heart, laugh
    #[arg(long)]
    pub kind: String,
}
