//! Credential command handlers

use anyhow::{bail, Context as _, Result};

use crate::context::Context;
use crate::output::Output;

/// Store the access token sent with every request
pub fn set_token(ctx: &Context, token: String, output: &Output) -> Result<()> {
    if token.trim().is_empty() {
        bail!("Token cannot be empty");
    }
    ctx.credentials
        .set(&token)
        .context("Failed to store credentials")?;
    output.success(&format!(
        "Token stored in {}",
        ctx.credentials.path().display()
    ));
    Ok(())
}

/// Forget the stored access token
pub fn clear(ctx: &Context, output: &Output) -> Result<()> {
    ctx.credentials
        .clear()
        .context("Failed to clear credentials")?;
    output.success("Signed out");
    Ok(())
}
