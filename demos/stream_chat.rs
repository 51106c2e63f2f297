//! Streaming chat example
//!
//! Streams one answer to stdout, reasoning to stderr, and asks for a title at
//! the end. Press Ctrl+C to cancel mid-stream.
//!
//! ```bash
//! CHAT_STREAM_API_KEY=sk-... cargo run --example stream_chat -- "Why is the sky blue?"
//! ```

use anyhow::Context;
use chat_stream::prelude::*;
use chat_stream::sink;
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let prompt = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let prompt = if prompt.is_empty() {
        "Explain Rust ownership in three sentences.".to_string()
    } else {
        prompt
    };

    let options = StreamOptions::from_env().context("invalid stream options")?;
    println!("Model: {}\nEndpoint: {}\n", options.model, options.endpoint);

    let client = ChatClient::new(options).context("failed to build client")?;

    // Cancel the run on Ctrl+C
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut conversation = vec![ChatMessage::user(prompt)];
    let mut shown_reasoning = 0;

    let report = {
        let mut sink = sink::from_fn(|update: &ContentUpdate<'_>| {
            // Reasoning arrives as a snapshot; print only what is new
            if update.reasoning.len() > shown_reasoning {
                eprint!("{}", &update.reasoning[shown_reasoning..]);
                shown_reasoning = update.reasoning.len();
            }
            print!("{}", update.delta);
            let _ = std::io::stdout().flush();
        });
        client
            .stream_chat(conversation.clone(), cancel, &mut sink)
            .await
    };

    println!("\n");
    log::debug!("{:?}", report.stats);

    match report.outcome {
        StreamOutcome::Completed(result) => {
            println!(
                "[{} chars of reasoning, {} chars of answer]",
                result.reasoning.chars().count(),
                result.content.chars().count()
            );
            conversation.push(ChatMessage::assistant(result.content));
            let title = client.generate_title(&conversation).await;
            println!("Title: {}", title);
        }
        StreamOutcome::Cancelled => println!("{}", chat_stream::ABORTED_NOTICE),
        StreamOutcome::Failed(err) => {
            println!("{}", chat_stream::FAILED_NOTICE);
            return Err(err).context("stream failed");
        }
    }

    Ok(())
}
