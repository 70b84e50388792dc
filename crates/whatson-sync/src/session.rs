use tracing::info;

use crate::cache::SessionCache;
use crate::error::{AppError, Result};

/// Business-admin sign-in by access code.
#[derive(Clone)]
pub struct AdminSession {
    cache: SessionCache,
    allowed_codes: Vec<String>,
}

impl AdminSession {
    pub fn new(cache: SessionCache, allowed_codes: Vec<String>) -> Self {
        Self {
            cache,
            allowed_codes,
        }
    }

    /// Checks the code against the allow-list and remembers it on success.
    pub async fn login(&self, code: &str) -> Result<String> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::ValidationFailed(vec![
                "Please enter a business code.".to_string(),
            ]));
        }
        if !self.allowed_codes.iter().any(|allowed| allowed == code) {
            return Err(AppError::ValidationFailed(vec![
                "That business code is not recognized.".to_string(),
            ]));
        }

        self.cache.set_business_code(code).await?;
        info!(business_code = code, "admin signed in");
        Ok(code.to_string())
    }

    /// The signed-in business code, if any.
    pub async fn current(&self) -> Result<Option<String>> {
        if !self.cache.is_business().await? {
            return Ok(None);
        }
        self.cache.business_code().await
    }

    pub async fn logout(&self) -> Result<()> {
        self.cache.clear_business_code().await?;
        info!("admin signed out");
        Ok(())
    }
}
