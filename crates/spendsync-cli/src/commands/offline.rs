use crate::cli::OfflineMode;
use crate::commands::common::{open_engine, AppPaths};
use crate::error::CliError;

pub async fn run_offline(mode: OfflineMode, paths: &AppPaths) -> Result<(), CliError> {
    let engine = open_engine(paths).await?;
    engine.set_force_offline(mode.is_on()).await?;

    if mode.is_on() {
        println!("Offline mode forced on; expenses will be queued locally.");
    } else {
        println!("Offline mode off.");
    }
    Ok(())
}
