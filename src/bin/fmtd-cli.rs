use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fmtd-cli")]
#[command(about = "Command-line client for the format daemon", long_about = None)]
struct Cli {
    #[arg(short, long, env = "FORMAT_DAEMON_URL", default_value = "http://127.0.0.1:7878")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Print the encoding used for a file
    Encoding { path: String },
    /// Format a file
    Format {
        path: String,
        /// Only check that the file is covered
        #[arg(long)]
        dryrun: bool,
        /// Write the formatted content back to the file
        #[arg(long, conflicts_with = "stdin")]
        write: bool,
        /// Read the content from stdin instead of the file
        #[arg(long)]
        stdin: bool,
    },
    /// Stop the daemon
    Stop,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/status")).send().await?;
            let status = res.status();
            if !status.is_success() {
                return fail(status, &res.text().await?);
            }
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Encoding { path } => {
            let res = client
                .get(format!("{base}/encoding"))
                .query(&[("path", &path)])
                .send()
                .await?;
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                return fail(status, &text);
            }
            println!("{text}");
        }
        Commands::Format {
            path,
            dryrun,
            write,
            stdin,
        } => {
            let content = if dryrun {
                Vec::new()
            } else if stdin {
                let mut buf = Vec::new();
                std::io::stdin().read_to_end(&mut buf)?;
                buf
            } else {
                std::fs::read(&path)?
            };

            let mut request = client.post(base).query(&[("path", &path)]);
            if dryrun {
                request = request.query(&[("dryrun", "")]);
            }
            let res = request.body(content).send().await?;
            let status = res.status();
            let body = res.bytes().await?;

            if !status.is_success() {
                return fail(status, &String::from_utf8_lossy(&body));
            }
            if dryrun {
                eprintln!("{path}: covered");
            } else if body.is_empty() {
                eprintln!("{path}: clean");
            } else if write {
                std::fs::write(PathBuf::from(&path), &body)?;
                eprintln!("{path}: formatted");
            } else {
                use std::io::Write;
                std::io::stdout().write_all(&body)?;
            }
        }
        Commands::Stop => {
            let res = client.post(format!("{base}/stop")).send().await?;
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                return fail(status, &text);
            }
            println!("{text}");
        }
    }

    Ok(())
}

fn fail(status: reqwest::StatusCode, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Error: daemon returned status {status}");
    if !text.is_empty() {
        eprintln!("Response: {text}");
    }
    Err(format!("request failed with status {status}").into())
}
