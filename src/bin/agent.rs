//! Demo agent
//!
//! Enters headlock, reports each instruction back as its result and keeps
//! going until the operator taps out.

use headlock::client::HeadlockClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "headlock=info,headlock_agent=info".into()),
        )
        .init();

    let base_url =
        std::env::var("HEADLOCK_URL").unwrap_or_else(|_| "http://localhost:8765".to_string());
    let session_id = std::env::var("HEADLOCK_SESSION_ID").ok();
    let client = HeadlockClient::new(base_url);

    tracing::info!(url = %client.base_url(), "Entering headlock");
    let mut response = client
        .enter(session_id.as_deref(), Some("Demo agent ready for instructions"))
        .await?;
    tracing::info!(session_id = %response.session_id, "Session started");

    let mut handled = 0u32;
    let mut result: Option<String> = None;
    while !response.should_terminate {
        match response.instruction.as_deref() {
            Some(instruction) => {
                handled += 1;
                tracing::info!(session_id = %response.session_id, instruction, "Received instruction");
                result = Some(format!("Completed: {instruction}"));
            }
            // Server wait bound elapsed; report the previous result again
            None => tracing::debug!(session_id = %response.session_id, "No instruction yet"),
        }

        response = client
            .continue_session(&response.session_id, result.as_deref())
            .await?;
    }

    tracing::info!(session_id = %response.session_id, handled, "Operator tapped out");
    Ok(())
}
