use std::{
    io::{self, Write as _},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{load_image, HttpRelayClient, ProcessingState, RemovalSession, SessionEvent};
use shared::error::CLIENT_FALLBACK_MESSAGE;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Remove the background of an image through the relay server")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    relay_url: String,
    /// Image to process; without it nothing is sent.
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let selection = match &args.image {
        Some(path) => Some(
            load_image(path)
                .await
                .with_context(|| format!("failed to read image '{}'", path.display()))?,
        ),
        None => None,
    };

    let session = RemovalSession::new(HttpRelayClient::new(args.relay_url));
    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => render(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let snapshot = session.submit(selection).await;
    let saved = match snapshot.phase {
        ProcessingState::Idle => None,
        ProcessingState::Succeeded => Some(
            session
                .download(&args.output_dir)
                .await
                .context("failed to save processed image")?,
        ),
        ProcessingState::Failed => {
            let message = snapshot
                .error
                .unwrap_or_else(|| CLIENT_FALLBACK_MESSAGE.to_string());
            bail!(message);
        }
        other => bail!("processing ended in unexpected state {other:?}"),
    };

    drop(session);
    let _ = printer.await;

    match saved {
        Some(path) => println!("Imagem salva em {}", path.display()),
        None => println!("Nenhuma imagem selecionada; nada foi enviado."),
    }
    Ok(())
}

fn render(event: &SessionEvent) {
    match event {
        SessionEvent::Progress { value, .. } => {
            print!("\rProcessando... {:>3.0}%", value);
            let _ = io::stdout().flush();
        }
        SessionEvent::StateChanged(snapshot) => match snapshot.phase {
            ProcessingState::Previewing => {
                if let Some(filename) = &snapshot.filename {
                    println!("Enviando {filename}");
                }
            }
            ProcessingState::Succeeded | ProcessingState::Failed => println!(),
            ProcessingState::Idle | ProcessingState::Processing => {}
        },
    }
}
