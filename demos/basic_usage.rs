use securetoken::Error;
use securetoken::IdTokenVerifier;
use securetoken::VerifierConfig;
use securetoken::VerifyIdToken;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let token = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "eyJhbGciOiJSUzI1NiIsImtpZCI6Ii4uLiJ9...".to_string());

    // Example 1: Simple usage with default settings
    println!("=== Example 1: Simple Usage ===");
    let verifier = IdTokenVerifier::for_project("my-firebase-project")?;

    match verifier.verify_id_token(&token).await {
        Ok(identity) => {
            println!("✓ Token verified successfully!");
            println!("  User: {}", identity.user_id);
            println!("  Email: {} (verified: {})", identity.email, identity.email_verified);
        }
        Err(e) if e.is_invalid_token() => eprintln!("✗ Not a token: {}", e),
        Err(e) => eprintln!("✗ Token rejected: {}", e),
    }

    println!();

    // Example 2: Configuration from the environment
    println!("=== Example 2: Configuration From Environment ===");
    match IdTokenVerifier::from_env() {
        Ok(verifier) => {
            let header = format!("Bearer {token}");
            match verifier.verify_bearer(Some(&header)).await {
                Ok(identity) => println!("✓ Authenticated as {}", identity.user_id),
                Err(e) => eprintln!("✗ Token verification failed: {}", e),
            }
        }
        Err(Error::Config(e)) => eprintln!("Skipping: {}", e),
        Err(e) => return Err(e.into()),
    }

    println!();

    // Example 3: Custom HTTP client and a request deadline
    println!("=== Example 3: Custom HTTP Client and Deadline ===");
    let custom_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()?;

    let config = VerifierConfig::new("my-firebase-project")
        .with_default_max_age(Duration::from_secs(600))
        .with_http_client(custom_client);

    let verifier = IdTokenVerifier::new(config)?;
    let cancel = CancellationToken::new();

    match timeout(
        Duration::from_secs(2),
        verifier.verify_with_cancellation(&token, &cancel),
    )
    .await
    {
        Ok(Ok(identity)) => println!("✓ Authenticated as {}", identity.user_id),
        Ok(Err(e)) => eprintln!("✗ Token verification failed: {}", e),
        Err(_) => {
            cancel.cancel();
            eprintln!("✗ Verification timed out");
        }
    }

    Ok(())
}
