//! Web server command

use std::path::Path;

use anyhow::Result;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    static_dir: Option<&Path>,
    allowed_origins: Vec<String>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    let static_dir = static_dir.and_then(|p| p.to_str());
    let config = qimen_server::ServerConfig { allowed_origins };

    qimen_server::serve_with_config(db, host, port, static_dir, config).await
}
