//! Info command handler

use anyhow::Result;
use cognify::Config;
use colored::Colorize;

use crate::utils::{dir_size, format_bytes, mask_secret};

pub fn run_info() -> Result<()> {
    println!("{}\n", "Cognify - Study Pack Service".bold());

    let file_exists = Config::exists();
    let config = Config::load_effective()?;
    let path = Config::path()?;

    if file_exists {
        println!("Config:    {}", path.display());
    } else {
        println!(
            "Config:    {} (not found, using defaults). Run 'cognify init' to create it.",
            path.display()
        );
    }

    println!("\n{}", "Server".bold());
    println!("  Listen          {}:{}", config.server.host, config.server.port);
    println!("  App URL         {}", config.server.app_url);
    println!("  Public URL      {}", config.server.public_base_url);

    println!("\n{}", "Providers".bold());
    println!("  OpenAI key      {}", mask_secret(&config.openai.api_key));
    println!("  Chat model      {}", config.openai.chat_model);
    println!("  TTS             {} ({})", config.openai.tts_model, config.openai.voice);
    println!("  Supabase URL    {}", or_unset(&config.supabase.url));
    println!("  Supabase key    {}", mask_secret(&config.supabase.anon_key));

    let keys = config.stripe.keys();
    println!("\n{} ({} mode)", "Stripe".bold(), config.stripe.mode.name());
    println!("  Secret key      {}", mask_secret(&keys.secret_key));
    println!("  Webhook secret  {}", mask_secret(&keys.webhook_secret));
    println!("  Monthly price   {}", or_unset(&keys.price_monthly));
    println!("  Yearly price    {}", or_unset(&keys.price_yearly));
    println!("  Lifetime price  {}", or_unset(&keys.price_lifetime));

    let db_path = config.database_path();
    let db_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let storage_bytes = dir_size(&config.storage_dir()).unwrap_or(0);

    println!("\n{}", "Storage".bold());
    println!("  Data directory  {}", config.data_dir().display());
    println!("  Database        {:>12}", format_bytes(db_bytes));
    println!("  Objects         {:>12}", format_bytes(storage_bytes));
    println!("  Total           {:>12}", format_bytes(db_bytes + storage_bytes));

    Ok(())
}

fn or_unset(value: &str) -> String {
    if value.is_empty() {
        "(not set)".dimmed().to_string()
    } else {
        value.to_string()
    }
}
