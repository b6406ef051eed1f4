//! NestKV CLI Client
//!
//! Command-line interface for interacting with a running NestKV server.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use nestkv::network::Client;
use nestkv::protocol::{Response, Status};

/// NestKV CLI
#[derive(Parser, Debug)]
#[command(name = "nestkv-cli")]
#[command(about = "CLI for the NestKV key-value store")]
struct Args {
    /// Server socket path
    #[arg(short, long, default_value = "/tmp/nestkv.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair (upsert)
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Create a key-value pair; fails if the key exists
    Post {
        /// The key to create
        key: String,

        /// The value to store
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Pause a peer by handle
    Pause {
        /// The handle assigned to the peer at handshake
        handle: u32,
    },

    /// Resume a paused peer by handle
    Resume {
        /// The handle assigned to the peer at handshake
        handle: u32,
    },

    /// Terminate a peer by handle
    Terminate {
        /// The handle assigned to the peer at handshake
        handle: u32,
    },
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.socket, process::id()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("connect failed: {e}");
            process::exit(1);
        }
    };

    let result = match &args.command {
        Commands::Get { key } => client.get(key.as_bytes()),
        Commands::Set { key, value } => client.put(key.as_bytes(), value.as_bytes()),
        Commands::Post { key, value } => client.post(key.as_bytes(), value.as_bytes()),
        Commands::Del { key } => client.delete(key.as_bytes()),
        Commands::Pause { handle } => client.pause(*handle),
        Commands::Resume { handle } => client.resume(*handle),
        Commands::Terminate { handle } => client.terminate(*handle),
    };

    match result {
        Ok(response) => {
            print_response(&response);
            if response.status == Status::Error {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("request failed: {e}");
            process::exit(1);
        }
    }
}

fn print_response(response: &Response) {
    match response.status {
        Status::Ok => match &response.payload {
            Some(payload) => println!("{}", String::from_utf8_lossy(payload)),
            None => println!("OK"),
        },
        Status::NotFound => println!("(not found)"),
        Status::Error => {
            let message = response
                .payload
                .as_ref()
                .map(|m| String::from_utf8_lossy(m).into_owned())
                .unwrap_or_else(|| "unknown error".to_string());
            eprintln!("ERROR: {message}");
        }
    }
}
