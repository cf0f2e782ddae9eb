use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

use pacmaster::client::{ClientError, GatewayClient};
use pacmaster::payload::{parse, serialize, Format};
use pacmaster::security::Credential;

#[derive(Parser)]
#[command(name = "pacmaster-cli")]
#[command(about = "Command-line client for the pacmaster gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:10033")]
    url: String,

    /// Credentials as user:password.
    #[arg(short = 'a', long, env = "PACMASTER_AUTH")]
    auth: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a route. The body is read from --data, --file, or stdin.
    Call {
        route: String,
        #[arg(short, long)]
        data: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Payload format (json or yaml).
        #[arg(long, default_value = "json")]
        format: Format,
    },
    /// Check gateway liveness
    Health,
    /// List the routes the gateway serves
    Routes,
    /// Convert a payload between JSON and YAML locally
    Convert {
        #[arg(long)]
        from: Format,
        #[arg(long)]
        to: Format,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut client = GatewayClient::new(cli.url);
    if let Some(auth) = &cli.auth {
        let credential = auth
            .split_once(':')
            .map(|(u, p)| Credential::new(u, p))
            .ok_or("--auth must look like user:password")?;
        client = client.with_credentials(credential);
    }

    match cli.command {
        Commands::Call {
            route,
            data,
            file,
            format,
        } => {
            let body = match data {
                Some(data) => data.into_bytes(),
                // Routes without input still take an empty mapping.
                None if file.is_none() && atty_stdin() => b"{}".to_vec(),
                None => read_input(file.as_ref())?,
            };
            let response = client.call(&route, body, format).await?;
            if !response.status.is_success() {
                eprintln!("Error: gateway returned status {}", response.status);
            }
            println!("{}", String::from_utf8_lossy(&response.body).trim_end());
            if !response.status.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Health => print_json(client.health().await)?,
        Commands::Routes => print_json(client.routes().await)?,
        Commands::Convert { from, to, file } => {
            let raw = read_input(file.as_ref())?;
            let payload = parse(&raw, from)?;
            let out = serialize(&payload, to)?;
            println!("{}", String::from_utf8_lossy(&out).trim_end());
        }
    }

    Ok(())
}

fn read_input(file: Option<&PathBuf>) -> Result<Vec<u8>, std::io::Error> {
    match file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn atty_stdin() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}

fn print_json(result: Result<serde_json::Value, ClientError>) -> Result<(), Box<dyn std::error::Error>> {
    let json = result?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
