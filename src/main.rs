#![allow(clippy::manual_unwrap_or_default)]
#![allow(clippy::manual_unwrap_or)]
use codeloom::content_store::{ContentStore, FsContentStore};
use codeloom::history::{init_db, SqliteChatHistory};
use codeloom::openai_client::OpenAiCompatClient;
use codeloom::registry::GenerationRegistry;
use codeloom::session_cache::ModelClients;
use codeloom::str_utils::one_line_preview;
use codeloom::tools::{FileWriteTool, ToolRegistry};
use codeloom::*;

use clap::Parser;
use colored::*;
use futures_util::StreamExt;
use std::io::Write;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_guards = match codeloom::logging::init_tracing(&args.log_dir, args.json_logs) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to initialize logging in {}: {}", args.log_dir.display(), e);
            std::process::exit(1);
        }
    };
    codeloom::logging::setup_panic_hook();

    let gen_type: GenerationType = match args.gen_type.parse() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e.inner.to_string().red());
            std::process::exit(2);
        }
    };

    if args.api_key.is_empty() {
        eprintln!("Error: CODELOOM_API_KEY environment variable is missing or empty.");
        eprintln!("Please set it in your .env file or environment.");
        std::process::exit(1);
    }

    let db = match init_db(&args.database).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e.inner);
            std::process::exit(1);
        }
    };

    let http = match args.http_client() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            eprintln!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let core = args.core_config();
    let store: Arc<dyn ContentStore> = Arc::new(FsContentStore::new());
    let tools = ToolRegistry::new().with_tool(Arc::new(FileWriteTool::new(
        store.clone(),
        core.output_root.clone(),
    )));

    let clients = ModelClients {
        chat: Some(Arc::new(OpenAiCompatClient::new(
            http.clone(),
            args.chat_model_settings(),
        ))),
        tooling: Some(Arc::new(
            OpenAiCompatClient::new(http, args.reasoning_model_settings())
                .with_tools(Arc::new(tools)),
        )),
    };

    let facade = GenerationFacade::new(
        &core,
        Arc::new(GenerationRegistry::standard()),
        Arc::new(SqliteChatHistory::new(db)),
        store,
        clients,
    );
    let app_id = AppId(args.app_id);

    tracing::info!(
        "[⚙️ ] Starting {} generation for app {} (sync={})",
        gen_type,
        app_id,
        args.sync
    );

    let exit_code = if args.sync {
        run_sync(&facade, app_id, &args.message, gen_type).await
    } else {
        run_stream(&facade, app_id, &args.message, gen_type).await
    };

    facade.drain_background_tasks().await;
    if exit_code == 0 && !args.sync && !gen_type.supports_tools() {
        let dir = facade.savers().location(gen_type, app_id);
        println!("{} {}", "Output:".bold(), dir.display());
    }
    drop(log_guards);
    std::process::exit(exit_code);
}

async fn run_sync(
    facade: &GenerationFacade,
    app_id: AppId,
    message: &str,
    gen_type: GenerationType,
) -> i32 {
    match facade.generate(app_id, message, gen_type).await {
        Ok(dir) => {
            println!("{} {}", "Saved to".green().bold(), dir.display());
            0
        }
        Err(e) => {
            eprintln!("{} {}", "Generation failed:".red().bold(), e.inner);
            1
        }
    }
}

async fn run_stream(
    facade: &GenerationFacade,
    app_id: AppId,
    message: &str,
    gen_type: GenerationType,
) -> i32 {
    let mut stream = match facade.generate_stream(app_id, message, gen_type).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {}", "Generation failed:".red().bold(), e.inner);
            return 1;
        }
    };

    let mut stdout = std::io::stdout();
    loop {
        let next = tokio::select! {
            msg = stream.next() => msg,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", "Cancelled.".yellow());
                stream.cancel();
                return 130;
            }
        };

        let msg = match next {
            Some(m) => m,
            None => return 1,
        };

        match msg {
            StreamMessage::AiResponse { data } => {
                print!("{}", data);
                let _ = stdout.flush();
            }
            StreamMessage::ToolRequest { name, arguments, .. } => {
                println!(
                    "\n{} {} {}",
                    "[tool]".cyan().bold(),
                    name.cyan(),
                    one_line_preview(&arguments, 80).dimmed()
                );
            }
            StreamMessage::ToolExecuted { result, .. } => {
                println!("{} {}", "[done]".green(), one_line_preview(&result, 120));
            }
            StreamMessage::Done => {
                println!();
                return 0;
            }
            StreamMessage::Error { message } => {
                eprintln!("\n{} {}", "Error:".red().bold(), message);
                return 1;
            }
        }
    }
}
