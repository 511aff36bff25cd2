//! Account management commands

use anyhow::Result;
use qimen_core::Database;

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No accounts yet. Register one with: qimen users add --email ... --password ...");
        return Ok(());
    }

    println!("{} account(s):\n", users.len());
    for user in &users {
        let last_sign_in = user
            .last_sign_in
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("  {}  {}", user.id, user.email);
        println!(
            "      points: {}  last sign-in: {}  created: {}",
            user.points,
            last_sign_in,
            user.created_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub fn cmd_users_add(db: &Database, email: &str, password: &str) -> Result<()> {
    if password.len() < 6 {
        anyhow::bail!("Password must be at least 6 characters");
    }

    let user = db.create_user(email, password)?;

    println!("✅ Account created");
    println!("   id: {}", user.id);
    println!("   email: {}", user.email);
    println!("   starting balance: {} points", user.points);

    Ok(())
}

pub fn cmd_users_show(db: &Database, id: &str) -> Result<()> {
    let user = db.get_user(id)?;

    println!("{} ({})", user.email, user.id);
    println!("  points: {}", user.points);
    match user.last_sign_in {
        Some(d) => println!("  last sign-in: {}", d),
        None => println!("  last sign-in: never"),
    }
    println!("  created: {}", user.created_at.format("%Y-%m-%d %H:%M UTC"));

    let entries = db.list_ledger_entries(id)?;
    if entries.is_empty() {
        println!("\nNo ledger entries.");
    } else {
        println!("\nLedger ({} entries):", entries.len());
        for entry in &entries {
            println!(
                "  {}  {:+}  {}",
                entry.occurred_at.format("%Y-%m-%d %H:%M"),
                entry.delta,
                entry.kind
            );
        }
    }

    Ok(())
}
