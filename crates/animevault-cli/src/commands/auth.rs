use super::{connect, prompts};
use crate::output::{detail_table, Output};
use crate::AuthCommands;
use anime_list_sources::{IdentityProvider, ServiceFactory};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::Cell;
use serde_json::json;

pub async fn run_auth(cmd: AuthCommands, factory: &ServiceFactory, output: &Output) -> Result<()> {
    match cmd {
        AuthCommands::SignUp { email } => sign_up(factory, email, output).await,
        AuthCommands::SignIn { email } => sign_in(factory, email, output).await,
        AuthCommands::SignOut => sign_out(factory, output).await,
        AuthCommands::Status => status(factory, output).await,
    }
}

async fn sign_up(factory: &ServiceFactory, email: Option<String>, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let email = prompts::prompt_email(email)?;
    let password = prompts::prompt_new_password()?;

    let user_id = services
        .auth
        .sign_up(&email, &password)
        .await
        .map_err(|e| eyre!("Sign-up failed: {}", e))?;

    output.outcome(
        format!("Account created; signed in as {}", email),
        &json!({"signed_in": true, "user_id": user_id.as_str(), "email": email}),
    );
    Ok(())
}

async fn sign_in(factory: &ServiceFactory, email: Option<String>, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let email = prompts::prompt_email(email)?;
    let password = prompts::prompt_password("Password")?;

    let user_id = services
        .auth
        .sign_in(&email, &password)
        .await
        .map_err(|e| eyre!("Sign-in failed: {}", e))?;

    output.outcome(
        format!("Signed in as {}", email),
        &json!({"signed_in": true, "user_id": user_id.as_str(), "email": email}),
    );
    Ok(())
}

async fn sign_out(factory: &ServiceFactory, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    if services.auth.current_user_id().is_none() {
        output.outcome("Not signed in", &json!({"signed_in": false}));
        return Ok(());
    }
    services
        .auth
        .sign_out()
        .await
        .map_err(|e| eyre!("Sign-out failed: {}", e))?;
    output.outcome("Signed out", &json!({"signed_in": false}));
    Ok(())
}

async fn status(factory: &ServiceFactory, output: &Output) -> Result<()> {
    let services = connect(factory).await?;
    let user_id = services.auth.current_user_id();
    let email = services.auth.email().await;

    if output.is_human() {
        let mut table = detail_table("Session");
        match &user_id {
            Some(user_id) => {
                table.add_row(vec![Cell::new("User"), Cell::new(user_id.as_str())]);
                table.add_row(vec![
                    Cell::new("Email"),
                    Cell::new(email.as_deref().unwrap_or("-")),
                ]);
            }
            None => {
                table.add_row(vec![Cell::new("Signed out")]);
            }
        }
        table.add_row(vec![
            Cell::new("Credentials"),
            Cell::new(factory.paths().credentials_file().display().to_string()),
        ]);
        output.table(&table);
    } else {
        output.json(&json!({
            "signed_in": user_id.is_some(),
            "user_id": user_id.as_ref().map(|u| u.as_str()),
            "email": email,
        }));
    }
    Ok(())
}
