//! `bulwark watch`: tail a push feed.

use async_trait::async_trait;
use tokio::signal;
use tracing::info;

use crate::adapter::inbound::cli::output;
use crate::application::stream::ReconnectingStreamConsumer;
use crate::error::Result;
use crate::port::{JsonObject, MessageHandler};

/// Prints each delivered message as one JSON line on stdout.
#[derive(Debug, Default)]
pub struct PrintHandler;

#[async_trait]
impl MessageHandler for PrintHandler {
    async fn handle(&self, message: JsonObject) {
        println!("{}", serde_json::Value::Object(message));
    }
}

/// Run `consumer` until Ctrl-C, then stop it cleanly and print its
/// counters.
pub async fn execute(consumer: ReconnectingStreamConsumer) -> Result<()> {
    let feed = consumer.feed_name().to_string();
    consumer.start();
    output::note(&format!("Watching feed '{feed}', Ctrl-C to stop"));

    signal::ctrl_c().await?;
    info!(feed = %feed, "Shutdown signal received");
    consumer.stop().await;

    let stats = consumer.stats();
    if output::is_json() {
        output::document("stream_stats", &stats)?;
    } else {
        output::section("Feed Summary");
        output::field("Connections", stats.connections);
        output::field("Connect failures", stats.connect_failures);
        output::field("Delivered", stats.delivered);
        output::field("Dropped", stats.dropped);
    }
    Ok(())
}
