use std::time::Duration;

use edgeflags::{ClientConfig, EvaluationContext};

pub fn main() -> edgeflags::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("edgeflags=debug"))
        .init();

    let token = std::env::var("EDGEFLAGS_TOKEN").unwrap_or_else(|_| "demo-token".to_owned());
    let base_url =
        std::env::var("EDGEFLAGS_URL").unwrap_or_else(|_| "http://localhost:8080".to_owned());

    let client = ClientConfig::new(token, base_url)
        .context(EvaluationContext::new().user_id("demo-user").plan("pro"))
        .polling_interval(Duration::from_secs(10))
        .debug(true)
        .to_client()?;

    client.on_change(|changes| {
        for change in &changes.flags {
            println!("{}: {:?} -> {:?}", change.key, change.previous, change.current);
        }
    });

    // Blocks until the first fetch completes.
    client.init()?;

    let dark_mode = client
        .flag_or("dark_mode", false)
        .as_bool()
        .unwrap_or(false);
    println!("dark_mode: {dark_mode}");

    // Let the poller pick up a few updates.
    std::thread::sleep(Duration::from_secs(30));

    client.destroy();
    Ok(())
}
