// --- CONSTANTS ---
#[allow(dead_code)]
pub const API_KEY: &str = "wha_test_0123456789";
#[allow(dead_code)]
pub const RECIPIENT: &str = "+5215512345678";
#[allow(dead_code)]
pub const CONVERSATION_ID: &str = "conv_111";
#[allow(dead_code)]
pub const CONTACT_ID: &str = "ct_222";
#[allow(dead_code)]
pub const STAGE_ID: &str = "stage_333";

// --- SETUP ---

/// A client pointed at the mock server.
#[allow(dead_code)]
pub fn client(server: &wiremock::MockServer) -> whaapy_rs::Client {
    whaapy_rs::Client::builder()
        .base_url(server.uri())
        .build(API_KEY)
        .unwrap()
}

/// Routes library logs to the test output. Safe to call more than once.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whaapy_rs=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
