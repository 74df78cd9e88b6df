use crate::cli::CategoryCommands;
use crate::commands::common::{format_category_lines, open_engine, AppPaths};
use crate::error::CliError;

pub async fn run_categories(command: CategoryCommands, paths: &AppPaths) -> Result<(), CliError> {
    let engine = open_engine(paths).await?;

    match command {
        CategoryCommands::List { json } => {
            let categories = engine.get_categories().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else if categories.is_empty() {
                println!("No cached categories. Run `spendsync categories refresh` while online.");
            } else {
                for line in format_category_lines(&categories) {
                    println!("{line}");
                }
            }
        }
        CategoryCommands::Refresh => {
            let categories = engine.refresh_categories().await?;
            println!("{} categories cached", categories.len());
        }
    }
    Ok(())
}
