//! LLM backend utilities

use anyhow::Result;
use qimen_core::{LlmBackend, LlmClient};

/// Test the configured LLM backend with a one-off prompt
pub async fn cmd_llm_test(prompt: &str) -> Result<()> {
    println!("🔍 Testing LLM backend...\n");

    let backend = std::env::var("LLM_BACKEND").unwrap_or_else(|_| "mock".to_string());
    println!("  LLM_BACKEND: {}", backend);

    let client = LlmClient::from_env();
    println!("  host: {}", client.host());
    println!("  model: {}\n", client.model());

    print!("Checking availability... ");
    if client.health_check().await {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("\n⚠️  Could not reach the backend at {}", client.host());
        println!("\nTo use an OpenAI-compatible server:");
        println!("  1. Set OPENAI_COMPATIBLE_HOST to the server base URL");
        println!("  2. Set OPENAI_COMPATIBLE_MODEL to the model name");
        println!("  3. Set OPENAI_COMPATIBLE_API_KEY if the server requires one");
        println!("  4. Set LLM_BACKEND=openai_compatible");
        return Ok(());
    }

    println!("\n📋 Sending prompt: \"{}\"\n", prompt);
    match client.ask(prompt).await {
        Ok(answer) => println!("{}", answer),
        Err(e) => println!("❌ Error: {}", e),
    }

    Ok(())
}
