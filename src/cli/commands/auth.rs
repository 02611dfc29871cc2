use clap::Subcommand;
use serde_json::json;

use crate::auth::{issue_token, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Mint a write token signed with JWT_SECRET")]
    Token {
        #[arg(help = "Login the token is issued to")]
        login: String,
        #[arg(long, help = "Identity provider recorded in the token", default_value = "github")]
        provider: String,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Token { login, provider, hours } => {
            let security = &config::config().security;
            let hours = hours.unwrap_or(security.jwt_expiry_hours);
            let claims = Claims::new(&login, &provider, hours)?;
            let token = issue_token(&claims, &security.jwt_secret)?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    &format!("Token issued to {}", login),
                    Some(json!({ "token": token, "expires_at": claims.exp })),
                ),
                // Bare token so it can be captured with $(catalog auth token ...)
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
