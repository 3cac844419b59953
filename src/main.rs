use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;

use srftp::{Cli, Config, FileSink, Mode, ReceiverSession, Sender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let config = args.config();
    match args.mode {
        Mode::Receive {
            ip,
            port,
            directory,
            ..
        } => receive(SocketAddr::new(ip, port), directory, config).await,
        Mode::Send { ip, port, .. } => send(SocketAddr::new(ip, port), config).await,
    }
}

async fn receive(addr: SocketAddr, directory: PathBuf, config: Config) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    let mut session = ReceiverSession::new(FileSink::new(&directory), config.window_size);

    log::info!(
        "receiver listen on {}, workdir: {}, window: {}",
        socket.local_addr()?,
        directory.display(),
        config.window_size
    );

    tokio::select! {
        res = srftp::serve(&socket, &mut session) => res,
        res = tokio::signal::ctrl_c() => {
            res?;
            log::info!("server successfully shutdown");
            Ok(())
        }
    }
}

async fn send(server: SocketAddr, config: Config) -> anyhow::Result<()> {
    let local: SocketAddr = if server.is_ipv4() {
        "0.0.0.0:0".parse()?
    } else {
        "[::]:0".parse()?
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(server).await?;
    log::info!(
        "sender {} -> {server}, window: {}, timeout: {} ms",
        socket.local_addr()?,
        config.window_size,
        config.timeout.as_millis()
    );

    let mut sender = Sender::new(socket, config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("put") => match words.next() {
                Some(path) => put(&mut sender, path).await?,
                None => println!("Error: invalid format"),
            },
            Some("exit") => return Ok(()),
            Some(_) => println!("Error: invalid command"),
            None => (),
        }
        prompt()?;
    }
    Ok(())
}

/// User mistakes are reported and leave the connection untouched; transfer
/// failures are fatal.
async fn put(sender: &mut Sender<UdpSocket>, path: &str) -> anyhow::Result<()> {
    if let Err(e) = srftp::sync_name(path) {
        println!("Error: {e}");
        return Ok(());
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            println!("Error: {path}: {e}");
            return Ok(());
        }
    };

    let stats = sender.put(path, file).await?;
    let cost = stats.elapsed.as_secs_f64();
    println!(
        "cost: {:.3}s, speed: {:.2} MB/s, retrans: {}",
        cost,
        stats.bytes as f64 / cost / 1024.0 / 1024.0,
        stats.retransmissions
    );
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}
