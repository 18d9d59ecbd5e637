//! `smartday chat`: interactive or single-message chat mode.

use smartday_agent::{ChatInput, ChatService};
use smartday_config::AppConfig;
use smartday_core::message::SessionId;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    preference: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early, give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENAI_API_KEY=sk-...");
        eprintln!("    export SMARTDAY_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }
    if config.tools.tavily_api_key.is_none() {
        eprintln!("  Note: TAVILY_API_KEY is not set, web search will be unavailable.");
    }

    let router = smartday_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;
    let tools = Arc::new(smartday_tools::default_registry(&config.tools));
    let service = ChatService::from_config(provider, tools, &config);

    let input = |text: String| {
        let input = ChatInput::new(text);
        match &preference {
            Some(p) => input.with_preference(p.clone()),
            None => input,
        }
    };

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = service.chat(None, input(msg)).await;
        eprint!("\r              \r");
        println!("{}", reply.text);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        SmartDay ☀️  Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", config.default_provider);
    println!("  Model:      {}", config.models.basic);
    println!("  Timezone:   {}", config.chat.timezone);
    if let Some(p) = &preference {
        println!("  Preference: {p}");
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  '/reset' clears the conversation, 'exit' or Ctrl+C quits.");
    println!();

    let mut session: Option<SessionId> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        match text {
            "" => {}
            "exit" | "quit" => break,
            "/reset" => {
                if let Some(id) = &session {
                    service.sessions().reset(id).await;
                }
                println!("  (conversation cleared)");
            }
            _ => {
                eprint!("  ...");
                let reply = service.chat(session.clone(), input(text.to_string())).await;
                eprint!("\r     \r");
                session = Some(reply.session_id);
                println!();
                for line in reply.text.lines() {
                    println!("  SmartDay > {line}");
                }
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
