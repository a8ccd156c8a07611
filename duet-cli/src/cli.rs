use uuid::Uuid;

/// Chat backend with a text assistant and an image generator sharing one device.
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Bearer token from `duet auth login`
    #[arg(long, env = "DUET_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Account commands
    #[command(subcommand)]
    User(UserCommands),

    /// Session commands
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Chat commands (require a token)
    #[command(subcommand)]
    Chat(ChatCommands),

    /// Message commands (require a token)
    #[command(subcommand)]
    Message(MessageCommands),
}

#[derive(Debug, clap::Subcommand)]
pub enum UserCommands {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "DUET_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Debug, clap::Subcommand)]
pub enum AuthCommands {
    /// Exchange a username and password for a bearer token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "DUET_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the user behind the current token
    Whoami,
}

#[derive(Debug, clap::Subcommand)]
pub enum ChatCommands {
    Create {
        #[arg(long)]
        title: Option<String>,
    },
    /// List your chats, newest first
    List,
    Rename {
        chat_id: Uuid,
        /// New title; omit to clear it
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a chat and all of its messages
    Delete { chat_id: Uuid },
}

#[derive(Debug, clap::Subcommand)]
pub enum MessageCommands {
    /// Send a message and wait for the reply
    Send {
        chat_id: Uuid,
        content: String,
        /// Generate an image from the content instead of a text answer
        #[arg(long)]
        image: bool,
    },
    List {
        chat_id: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Oldest first
        #[arg(long)]
        asc: bool,
    },
}
