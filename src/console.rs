use crate::agent::TradeAgent;
use crate::render::render_text;
use crate::session::SessionContext;
use log::{ error, info };
use std::error::Error;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader };

const INPUT_HINT: &str =
    "Enter your trade execution (market/limit order only) request, e.g. 'Buy 10 shares of AAPL if it drops below $180'.\nCommands: /model <name>, /temperature <x>, /max-tokens <n>, /history, /quit";

#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    Instruction(String),
    Model(String),
    Temperature(f32),
    MaxTokens(u32),
    History,
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse_line(line: &str) -> ConsoleCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleCommand::Empty;
    }
    if !trimmed.starts_with('/') {
        return ConsoleCommand::Instruction(trimmed.to_string());
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    match command {
        "/quit" | "/exit" => ConsoleCommand::Quit,
        "/history" => ConsoleCommand::History,
        "/model" if !arg.is_empty() => ConsoleCommand::Model(arg.to_string()),
        "/temperature" =>
            match arg.parse() {
                Ok(t) => ConsoleCommand::Temperature(t),
                Err(_) => ConsoleCommand::Invalid(format!("not a number: '{}'", arg)),
            }
        "/max-tokens" =>
            match arg.parse() {
                Ok(n) => ConsoleCommand::MaxTokens(n),
                Err(_) => ConsoleCommand::Invalid(format!("not an integer: '{}'", arg)),
            }
        other => ConsoleCommand::Invalid(format!("unknown command '{}'", other)),
    }
}

async fn print_transcript<W>(
    out: &mut W,
    agent: &TradeAgent,
    ctx: &SessionContext
) -> Result<(), Box<dyn Error + Send + Sync>>
    where W: AsyncWrite + Unpin
{
    let rendered = agent.transcript(ctx).await?;
    out.write_all(render_text(&rendered).as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

async fn print_line<W>(out: &mut W, line: &str) -> Result<(), Box<dyn Error + Send + Sync>>
    where W: AsyncWrite + Unpin
{
    out.write_all(format!("{}\n", line).as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Runs one console session over stdin/stdout until EOF or `/quit`.
pub async fn run_console(agent: &TradeAgent) -> Result<(), Box<dyn Error + Send + Sync>> {
    let input = BufReader::new(tokio::io::stdin());
    let mut out = tokio::io::stdout();
    run_session(agent, input, &mut out).await
}

/// Drives one console session over any line source and writer.
pub async fn run_session<R, W>(
    agent: &TradeAgent,
    input: R,
    out: &mut W
) -> Result<(), Box<dyn Error + Send + Sync>>
    where R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin
{
    let mut ctx = agent.open_session(None);
    agent.start_session(&ctx).await?;
    info!("Console session {} started", ctx.key);

    let mut lines = input.lines();

    print_line(out, INPUT_HINT).await?;
    print_transcript(out, agent, &ctx).await?;

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Quit => {
                break;
            }
            ConsoleCommand::History => print_transcript(out, agent, &ctx).await?,
            ConsoleCommand::Invalid(reason) => print_line(out, &reason).await?,
            ConsoleCommand::Model(name) => {
                let msg = match ctx.update_settings(Some(name.as_str()), None, None) {
                    Ok(settings) => format!("model set to {}", settings.model),
                    Err(e) => e.to_string(),
                };
                print_line(out, &msg).await?;
            }
            ConsoleCommand::Temperature(t) => {
                let msg = match ctx.update_settings(None, Some(t), None) {
                    Ok(settings) => format!("temperature set to {}", settings.temperature),
                    Err(e) => e.to_string(),
                };
                print_line(out, &msg).await?;
            }
            ConsoleCommand::MaxTokens(n) => {
                let msg = match ctx.update_settings(None, None, Some(n)) {
                    Ok(settings) => format!("max tokens set to {}", settings.max_tokens),
                    Err(e) => e.to_string(),
                };
                print_line(out, &msg).await?;
            }
            ConsoleCommand::Instruction(instruction) => {
                print_line(out, "Generating execution command ...").await?;
                match agent.process_instruction(&ctx, &instruction).await {
                    Ok(_) => print_transcript(out, agent, &ctx).await?,
                    Err(e) => {
                        error!("Instruction failed: {}", e);
                        print_line(out, &format!("Error: {}", e)).await?;
                    }
                }
            }
        }
    }

    agent.close_session(&ctx).await?;
    info!("Console session {} ended", ctx.key);
    Ok(())
}
