//! Synthetic users and the auth flows that register and log them in

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::browser::Locator;
use crate::error::GradeResult;
use crate::page::Page;

/// Domain used for generated email addresses
pub const EMAIL_DOMAIN: &str = "ucsc.edu";

/// A throwaway account created for one grading run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl TestUser {
    /// Fresh user with random, collision-free credentials
    pub fn generate() -> Self {
        Self {
            email: format!("{}@{}", Uuid::new_v4().simple(), EMAIL_DOMAIN),
            password: Uuid::new_v4().to_string(),
            first_name: Uuid::new_v4().to_string(),
            last_name: Uuid::new_v4().to_string(),
        }
    }
}

fn submit_button() -> Locator {
    Locator::css("input[type='submit']")
}

async fn fill(page: &mut Page, field: &str, text: &str) -> GradeResult<()> {
    let input = page.find(&Locator::name(field)).await?;
    page.send_keys(&input, text).await
}

/// Fill and submit the registration form
pub async fn register(page: &mut Page, user: &TestUser) -> GradeResult<()> {
    debug!("Registering {}", user.email);
    page.navigate("auth/register").await?;
    fill(page, "email", &user.email).await?;
    fill(page, "password", &user.password).await?;
    fill(page, "password_again", &user.password).await?;
    fill(page, "first_name", &user.first_name).await?;
    fill(page, "last_name", &user.last_name).await?;
    let submit = page.find(&submit_button()).await?;
    page.click(&submit).await
}

/// Fill and submit the login form
pub async fn login(page: &mut Page, user: &TestUser) -> GradeResult<()> {
    debug!("Logging in as {}", user.email);
    page.navigate("auth/login").await?;
    fill(page, "email", &user.email).await?;
    fill(page, "password", &user.password).await?;
    let submit = page.find(&submit_button()).await?;
    page.click(&submit).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_users_are_unique() {
        let a = TestUser::generate();
        let b = TestUser::generate();
        assert_ne!(a.email, b.email);
        assert_ne!(a.password, b.password);
        assert!(a.email.ends_with("@ucsc.edu"));
        // 32 hex digits before the domain
        assert_eq!(a.email.split('@').next().unwrap().len(), 32);
    }
}
