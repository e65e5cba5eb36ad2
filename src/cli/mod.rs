use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat session (/clear to reset history, /quit to leave)
    Chat,

    /// Send a single message and print the reply
    Send {
        message: String,

        /// Print the classified outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the entity ID embedded in a gateway API key
    EntityId {
        /// Key to inspect; defaults to RPROXY_AUTH_HEADER
        key: Option<String>,
    },

    /// Show the resolved connection settings
    Config,
}
