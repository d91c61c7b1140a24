//! Example watching a namespace for changes.
//!
//! This example shows how to:
//! - Load the application identity from `APOLLO_*` environment variables
//! - Start the client and read values from the local cache
//! - Register a listener for keys matching a pattern
//!
//! Run with:
//!
//! ```text
//! APOLLO_APP_ID=order-service APOLLO_IP=http://localhost:8080 \
//! APOLLO_NAMESPACE_NAME="application db.yaml" \
//! RUST_LOG=apollo_client=debug cargo run --example watch_namespace
//! ```

use apollo_client::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct PrintNamespaceEvents;

impl ChangeListener for PrintNamespaceEvents {
    fn on_change(&self, event: Arc<ChangeEvent>) {
        println!(
            "[{}] {} key(s) changed at notification {}",
            event.namespace,
            event.changes.len(),
            event.notification_id
        );
    }

    fn on_full_refresh(&self, event: Arc<FullChangeEvent>) {
        println!("[{}] now holds {} key(s)", event.namespace, event.configurations.len());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = AppConfigLoader::new()
        .with_env_overrides("APOLLO", "__")
        .load()?;
    println!("Subscribing {} to {:?}\n", app.app_id, app.namespaces());

    let client = ApolloClient::builder(app).build()?;

    client.add_listener(
        Arc::new(|event: &KeyEvent| {
            println!("  {}.{} {:?} -> {:?}", event.namespace, event.key, event.kind, event.value);
        }),
        &[r"^db\.", "timeout"],
    )?;
    client.add_change_listener(Arc::new(PrintNamespaceEvents));

    client.start().await?;

    for namespace in client.app_config().namespaces() {
        if let Some(config) = client.namespace(&namespace) {
            println!("{}:\n{}", namespace, config.content());
        }
    }

    println!("Watching for changes, press Ctrl+C to exit\n");
    tokio::signal::ctrl_c().await?;

    client.shutdown().await;
    Ok(())
}
