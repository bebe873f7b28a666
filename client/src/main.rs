use clap::Parser;
use client::input::{parse_line, Action, HELP};
use client::network::{ClientError, GameClient};
use client::rendering::render_status;
use log::info;
use shared::GameStatus;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Session id from an earlier run, to get the same seat back
    #[arg(long)]
    session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut client = GameClient::connect(&args.server).await?;
    let session = client.open_session(args.session.as_deref()).await?;
    println!("Session {} (pass --session {} to resume)", session, session);
    println!("{}", HELP);

    let mut last: Option<GameStatus> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            update = client.next_update() => match update {
                Some(status) => {
                    print!("{}", render_status(&status));
                    last = Some(status);
                }
                None => {
                    println!("Disconnected from server");
                    break;
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };

                let action = match parse_line(&line) {
                    Ok(Action::Quit) => break,
                    Ok(Action::Help) => {
                        println!("{}", HELP);
                        continue;
                    }
                    Ok(Action::Show) => {
                        match &last {
                            Some(status) => print!("{}", render_status(status)),
                            None => println!("You are not in a game"),
                        }
                        continue;
                    }
                    Ok(action) => action,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                match perform(&mut client, action).await {
                    Ok(status) => {
                        print!("{}", render_status(&status));
                        last = Some(status);
                    }
                    Err(ClientError::Rejected(message)) => println!("{}", message),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    Ok(())
}

async fn perform(client: &mut GameClient, action: Action) -> Result<GameStatus, ClientError> {
    match action {
        Action::Create { name } => client.create_game(&name).await,
        Action::Join { game_id, name } => client.join_game(&game_id, &name).await,
        Action::Leave => client.leave_game().await,
        Action::Start => client.start_game().await,
        Action::Restart => client.restart_game().await,
        Action::End => client.end_game().await,
        Action::Play { index, wild_color } => client.play_card(index, wild_color).await,
        Action::Draw => client.draw_card().await,
        Action::Done => client.done_drawing().await,
        Action::Show | Action::Help | Action::Quit => Err(ClientError::UnexpectedReply("local command")),
    }
}
