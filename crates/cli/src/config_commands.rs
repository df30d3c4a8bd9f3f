use {anyhow::Result, clap::Subcommand, relaybot_config::Settings, relaybot_pipeline::Bot};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved settings as JSON.
    Show {
        /// Print the processor configuration instead.
        #[arg(long)]
        processors: bool,
    },
}

pub fn handle_config(action: ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show { processors: false } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        },
        ConfigAction::Show { processors: true } => {
            let bot = Bot::builder().settings(settings).build()?;
            println!("{}", serde_json::to_string_pretty(&*bot.config()?)?);
        },
    }
    Ok(())
}
