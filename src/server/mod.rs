//! HTTP server module

mod extract;
mod routes;
mod state;

pub use extract::{ApiJson, CurrentUser};
pub use routes::create_router;
pub use state::AppState;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::auth::SupabaseAuth;
use crate::billing::{BillingProvider, StripeClient};
use crate::config::Config;
use crate::generate::OpenAiClient;
use crate::storage::StudyStore;

/// Build the production state from configuration
pub fn build_state(config: Config) -> Result<AppState> {
    let store = StudyStore::open(config.database_path())
        .with_context(|| format!("Failed to open database at {}", config.database_path().display()))?;
    let generator = OpenAiClient::new(config.openai.clone()).context("OpenAI is not configured")?;
    let auth = SupabaseAuth::new(config.supabase.clone()).context("Supabase is not configured")?;

    let billing: Option<Arc<dyn BillingProvider>> = match StripeClient::new(&config.stripe) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "billing disabled");
            None
        }
    };

    std::fs::create_dir_all(config.storage_dir())
        .with_context(|| format!("Failed to create {}", config.storage_dir().display()))?;

    AppState::new(config, store, Arc::new(generator), Arc::new(auth), billing)
        .context("Failed to build HTTP client")
}

/// Run the HTTP server
pub async fn run_server(config: Config) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let stripe_mode = config.stripe.mode.name();
    let state = Arc::new(build_state(config)?);

    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            eprintln!("\n\x1b[31mError:\x1b[0m Port {} is already in use.\n", port);
            eprintln!("Try a different port with:");
            eprintln!("  \x1b[36mcognify serve --port <PORT>\x1b[0m\n");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Server running on http://localhost:{}", port);
    println!("Stripe mode:     {}", stripe_mode);
    println!("\nAPI Endpoints:");
    println!("  GET    /health                       - Health check");
    println!("  POST   /api/documents/upload         - Upload a PDF or URL");
    println!("  POST   /api/try                      - Guest trial (rate limited)");
    println!("  GET    /api/documents                - List documents");
    println!("  GET    /api/documents/:id            - Study pack");
    println!("  PATCH  /api/documents/:id/folder     - Move to folder");
    println!("  POST   /api/quizzes/:id/attempts     - Submit quiz answers");
    println!("  POST   /api/flashcards/:id/review    - Review a flashcard");
    println!("  GET    /api/folders                  - List folders");
    println!("  POST   /api/folders                  - Create folder");
    println!("  GET    /api/profile                  - Profile and billing state");
    println!("  POST   /api/profile/streak           - Record a study session");
    println!("  POST   /api/stripe/checkout          - Start checkout");
    println!("  POST   /api/stripe/portal            - Open billing portal");
    println!("  POST   /api/stripe/webhook           - Stripe events");
    println!("  GET    /storage/:bucket/*key         - Stored files");

    axum::serve(listener, app).await?;
    Ok(())
}
