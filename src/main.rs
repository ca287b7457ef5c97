use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use obd_chat::app::App;
use obd_chat::config::{Config, Overrides};
use obd_chat::ollama::OllamaClient;
use obd_chat::template::PromptTemplate;
use obd_chat::{handler, logging, tui, ui};

#[derive(Parser)]
#[command(name = "obd-chat", version)]
#[command(about = "Chat with a local model that maps car questions to OBD2 commands")]
struct Cli {
    /// Ollama model to use (saved as the new default)
    #[arg(short, long, env = "OBD_CHAT_MODEL")]
    model: Option<String>,

    /// Base URL of the Ollama server
    #[arg(long, env = "OBD_CHAT_OLLAMA_URL")]
    ollama_url: Option<String>,

    /// JSON diagnostic table replacing the built-in template
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Show the full prompt, template included, in your own messages
    #[arg(long)]
    echo_template: bool,

    /// Print the rendered template and exit
    #[arg(long)]
    print_template: bool,

    /// List models available on the Ollama server and exit
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = logging::init()?;

    let overrides = Overrides {
        model: cli.model,
        ollama_url: cli.ollama_url,
        template_path: cli.template,
        echo_template: cli.echo_template,
    };
    let config = Config::resolve_at(&Config::get_config_path()?, &overrides);

    let template = match &config.template_path {
        Some(path) => PromptTemplate::load(path)
            .with_context(|| format!("Failed to load template from {}", path.display()))?,
        None => PromptTemplate::builtin().context("Built-in template is invalid")?,
    };

    if cli.print_template {
        print!("{}", template.text());
        return Ok(());
    }

    let client = OllamaClient::new(config.ollama_url(), config.model());

    if cli.list_models {
        return list_models(&client).await;
    }

    tracing::info!(
        log = %log_path.display(),
        model = config.model(),
        url = config.ollama_url(),
        "Starting obd-chat"
    );

    run(client, Arc::new(template), &config).await
}

async fn list_models(client: &OllamaClient) -> Result<()> {
    match client.list_models().await {
        Ok(models) if models.is_empty() => {
            println!("No models found. Pull a model with: ollama pull llama3.2");
        }
        Ok(models) => {
            for model in models {
                println!("  • {}", model);
            }
        }
        Err(e) => {
            println!("Error connecting to Ollama: {}", e);
            println!("Make sure Ollama is running: ollama serve");
        }
    }
    Ok(())
}

async fn run(client: OllamaClient, template: Arc<PromptTemplate>, config: &Config) -> Result<()> {
    let model_name = client.model().to_string();
    let (mut app, mut updates) =
        App::new(Arc::new(client), template, &model_name, config.echo_template);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        let mut redraw = true;
        loop {
            if redraw {
                terminal.draw(|frame| ui::render(&mut app, frame))?;
            }

            tokio::select! {
                Some(event) = events.next() => {
                    redraw = handler::needs_redraw(&app, &event);
                    handler::handle_event(&mut app, event)?;
                }
                Some(update) = updates.recv() => {
                    redraw = true;
                    app.on_inference(update);
                }
                else => break,
            }

            if app.should_quit {
                break;
            }
        }
        anyhow::Ok(())
    }
    .await;

    tui::restore()?;
    tracing::info!("Exiting obd-chat");
    result
}
