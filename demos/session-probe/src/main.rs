//! Connects to an account service, logs in and reports what happens.
//!
//! ```text
//! session-probe [ENDPOINT] [MAIL] [PASSWORD]
//! ```
//!
//! Missing arguments fall back to `HEARTH_ENDPOINT`, `HEARTH_MAIL` and
//! `HEARTH_PASSWORD`. Runs until Ctrl+C, then logs out.

use hearth::prelude::*;

struct Args {
    endpoint: String,
    mail: String,
    password: String,
}

fn parse_args(
    mut args: impl Iterator<Item = String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Args, String> {
    let mut next = |var: &str| args.next().or_else(|| env(var));
    let endpoint = next("HEARTH_ENDPOINT")
        .unwrap_or_else(|| SessionConfig::DEFAULT_ENDPOINT.to_string());
    let mail = next("HEARTH_MAIL").ok_or("missing MAIL (or HEARTH_MAIL)")?;
    let password = next("HEARTH_PASSWORD").ok_or("missing PASSWORD (or HEARTH_PASSWORD)")?;
    Ok(Args {
        endpoint,
        mail,
        password,
    })
}

fn describe(user: &SessionUser) -> String {
    format!(
        "{} <{}> rank {} | banned from: {} | online on: {} | civs: {:?}",
        user.profile_name,
        user.mail,
        user.rank,
        user.ban_status(),
        user.server_presence(),
        user.allowed_civ,
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    hearth::logging::init(2)?;
    let args = parse_args(std::env::args().skip(1), |var| std::env::var(var).ok())?;

    let client = HearthClientBuilder::new().endpoint(&args.endpoint).build();
    let mut changes = client.on_state_change();
    let mut users = client.on_user_updated();
    let mut events = client.on_event();

    eprintln!("connecting to {}", args.endpoint);
    client.connect().await?;
    let user = client.login(Credentials::new(args.mail, args.password)).await?;
    println!("logged in: {}", describe(&user));

    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                println!("state: {} -> {}", change.old, change.new);
                if change.new == ConnectionState::Offline {
                    break;
                }
            }
            Some(user) = users.recv() => println!("user: {}", describe(&user)),
            Some(event) = events.recv() => println!("event {}: {}", event.event_type, event.payload),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, logging out");
                client.logout().await?;
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
