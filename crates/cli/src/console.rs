//! Development console: stdin lines become inbound events on a synthetic
//! channel and the bot's replies print to stdout.

use {
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::debug,
};

use {
    outpost_channels::{LoopbackHandle, LoopbackInjector},
    outpost_common::InboundEvent,
};

const CONSOLE_CHANNEL: &str = "console";
const CONSOLE_SENDER: &str = "operator";

/// Wire the loopback handle to stdin/stdout. Both halves run on their own
/// tasks for the life of the process.
pub fn attach(handle: LoopbackHandle) {
    let injector = handle.injector();
    tokio::spawn(read_stdin(injector));
    tokio::spawn(print_replies(handle));
}

async fn read_stdin(injector: LoopbackInjector) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event = InboundEvent::new(CONSOLE_CHANNEL, CONSOLE_SENDER, trimmed);
        if injector.inject(event).await.is_err() {
            break;
        }
    }
    debug!("console input closed");
}

async fn print_replies(mut handle: LoopbackHandle) {
    while let Some((_, payload)) = handle.next_reply().await {
        println!("{}", payload.text);
    }
    debug!("console output closed");
}
