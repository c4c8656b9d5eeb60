use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        std::fs::create_dir_all(shellexpand_path(&dir))?;
        // Canonicalizes now that the directory exists.
        settings.data_dir = shellexpand_path(&dir);
    }
    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;

    let db_path = settings.db_path();
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    save_settings(&settings)?;

    tracing::info!(path = %db_path.display(), "initialized database");
    println!("Initialized {}", db_path.display());
    Ok(())
}
