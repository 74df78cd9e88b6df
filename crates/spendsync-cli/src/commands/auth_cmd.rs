use spendsync_core::gateway::HttpGateway;
use spendsync_core::queue::Preferences;

use crate::cli::AuthCommands;
use crate::commands::common::{load_config, open_store, AppPaths};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, paths: &AppPaths) -> Result<(), CliError> {
    let config = load_config(paths)?;
    let store = open_store(&paths.db_path, &config).await?;
    let preferences = Preferences::new(store);

    match command {
        AuthCommands::Login { username, password } => {
            let gateway = HttpGateway::new(config.api_base_url.clone(), config.request_timeout())?;
            if gateway.base_url().is_none() {
                return Err(CliError::ServerNotConfigured);
            }
            let token = gateway.login(&username, &password).await?;
            preferences.set_auth_token(&token.access_token).await?;
            println!("Signed in as {}", username.trim());
        }
        AuthCommands::Logout => {
            preferences.clear_auth_token().await?;
            println!("Signed out");
        }
    }
    Ok(())
}
