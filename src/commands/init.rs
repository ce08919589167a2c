//! Init command handler

use anyhow::Result;
use cognify::Config;
use colored::Colorize;

pub fn run_init(force: bool) -> Result<()> {
    let path = Config::path()?;

    if Config::exists() && !force {
        println!(
            "{} Config already exists at {}",
            "!".yellow(),
            path.display()
        );
        println!("Run 'cognify init --force' to overwrite it.");
        return Ok(());
    }

    let config = Config::default();
    config.save()?;
    std::fs::create_dir_all(config.storage_dir())?;

    println!("{} Configuration saved to {}", "✓".green(), path.display());
    println!("\nSet your keys in the file or through the environment:");
    println!("  OPENAI_API_KEY");
    println!("  SUPABASE_URL, SUPABASE_ANON_KEY");
    println!("  STRIPE_SECRET_KEY_TEST, STRIPE_WEBHOOK_SECRET_TEST");
    println!("  STRIPE_PRICE_{{MONTHLY,YEARLY,LIFETIME}}_TEST");
    println!("\nThen run 'cognify serve'.");

    Ok(())
}
