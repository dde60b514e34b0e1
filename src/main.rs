use clap::{Parser, Subcommand};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "skyjo-combined")]
#[command(about = "Skyjo - Combined server and client launcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server and a number of terminal clients
    Both {
        /// Number of clients to start
        #[arg(short, long, default_value = "2")]
        clients: u32,
        /// Port for the server
        #[arg(short, long, default_value = "9001")]
        port: u16,
    },
    /// Run only the server
    Server {
        /// Port for the server
        #[arg(short, long, default_value = "9001")]
        port: u16,
    },
    /// Run only a terminal client
    Client {
        /// Server websocket URL
        #[arg(short, long, default_value = "ws://127.0.0.1:9001/ws")]
        url: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Both { clients, port } => run_both(clients, port),
        Commands::Server { port } => run_server(port),
        Commands::Client { url } => run_client(&url),
    }
}

fn run_both(clients: u32, port: u16) {
    println!("🚀 Starting Skyjo server + {} clients on port {}", clients, port);

    let server_handle = thread::spawn(move || run_server(port));

    thread::sleep(Duration::from_millis(1500));

    let url = format!("ws://127.0.0.1:{}/ws", port);
    let mut client_handles = Vec::new();
    for i in 1..=clients {
        println!("🎮 Starting client {}...", i);
        let url = url.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(500 * i as u64)); // Stagger client starts
            run_client(&url);
        });
        client_handles.push(handle);
    }

    println!("✅ All processes started. One client hosts, the others join with the room code.");
    println!("Press Ctrl+C to stop.");

    for handle in client_handles {
        let _ = handle.join();
    }
    let _ = server_handle.join();
}

fn run_server(port: u16) {
    let status = Command::new("cargo")
        .args(["run", "-p", "skyjo-server"])
        .env("PORT", port.to_string())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status();
    exit_on_failure("Server", status);
}

fn run_client(url: &str) {
    let status = Command::new("cargo")
        .args(["run", "--bin", "cli_client"])
        .env("SERVER_URL", url)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status();
    exit_on_failure("Client", status);
}

fn exit_on_failure(what: &str, status: std::io::Result<std::process::ExitStatus>) {
    match status {
        Ok(exit_status) if exit_status.success() => {}
        Ok(exit_status) => {
            eprintln!("❌ {} exited with error: {}", what, exit_status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Failed to start {}: {}", what.to_lowercase(), e);
            std::process::exit(1);
        }
    }
}
