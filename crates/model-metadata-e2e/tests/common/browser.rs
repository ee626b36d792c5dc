//! Browser automation helpers

use model_metadata_e2e::{Config, Session};

/// Check if browser tests should be skipped (when Chrome isn't available)
pub fn should_skip() -> bool {
    std::env::var("SKIP_BROWSER_TESTS").is_ok()
}

/// Macro to skip test if Chrome isn't available
#[macro_export]
macro_rules! skip_if_no_chrome {
    () => {
        if browser::should_skip() {
            eprintln!("Skipping test: SKIP_BROWSER_TESTS is set");
            return;
        }
    };
}

/// Launch a headless session, or `None` when Chrome is not installed
pub async fn require_session(config: Config) -> Option<Session> {
    match Session::launch(config).await {
        Ok(session) => Some(session),
        Err(e) => {
            let message = format!("{:#}", e);
            if message.contains("Could not auto detect") {
                eprintln!("Skipping: Chrome not installed ({})", message);
                None
            } else {
                panic!("Unexpected browser error: {}", message);
            }
        }
    }
}
