//! Basic provider registry server example
//!
//! Run with: cargo run -p provider-registry --example basic_server

use provider_registry::RegistryBuilder;
use storage::MemoryStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // A bucket holding a single release for two platforms
    let storage = MemoryStorage::with_keys(
        "tfindex",
        [
            "algolia/restapi/1.2.0/linux_amd64/terraform-provider-restapi_1.2.0_linux_amd64.zip",
            "algolia/restapi/1.2.0/darwin_arm64/terraform-provider-restapi_1.2.0_darwin_arm64.zip",
        ],
    );

    // Build the registry service
    let app = RegistryBuilder::new(storage.into()).bucket("tfindex").build();

    // Bind to address
    let addr = "127.0.0.1:8080";
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Provider registry listening on http://{}", addr);
    tracing::info!(
        "Try: curl http://{}/v1/providers/algolia/restapi/versions",
        addr
    );

    // Serve the registry
    axum::serve(listener, app).await?;

    Ok(())
}
