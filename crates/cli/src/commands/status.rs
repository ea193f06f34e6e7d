//! `concierge status` — Show configuration status.

use concierge_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let policies: Vec<String> = config
        .prompt
        .policies
        .iter()
        .map(|p| format!("{p:?}"))
        .collect();

    println!("Concierge Status");
    println!("================");
    println!("  Config dir:      {}", AppConfig::config_dir().display());
    println!("  Provider:        {}", config.default_provider);
    println!("  Model:           {}", config.effective_model());
    println!("  Temperature:     {}", config.default_temperature);
    println!("  API key:         {}", if config.has_api_key() { "configured" } else { "missing" });
    println!("  Knowledge base:  {}", config.knowledge_base.url);
    println!(
        "  Profile service: {}",
        config.profile.url.as_deref().unwrap_or("not configured")
    );
    println!(
        "  Sessions:        {} turns/user, {} users max, idle TTL {}",
        config.session.history_window,
        config.session.max_users,
        match config.session.idle_ttl() {
            Some(ttl) => format!("{}s", ttl.as_secs()),
            None => "off".to_string(),
        }
    );
    println!("  Assistant:       {} ({})", config.prompt.assistant_name, config.prompt.event_name);
    println!("  Policies:        {}", policies.join(", "));
    println!("  Gateway:         {}:{}", config.gateway.host, config.gateway.port);

    let router = concierge_providers::router::build_from_config(&config);
    let mut providers = router.list();
    providers.sort_unstable();
    println!("  Registered:      {}", providers.join(", "));
    match router.default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  Provider health: ✅ reachable"),
            Ok(false) => println!("  Provider health: ⚠️  responded but not healthy"),
            Err(e) => println!("  Provider health: ❌ {e}"),
        },
        None => println!("  Provider health: ❌ no default provider"),
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `concierge onboard` first");
    }

    Ok(())
}
