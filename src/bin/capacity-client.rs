use argh::FromArgs;
use serde_json::json;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5000;

#[derive(FromArgs)]
/// Client for the battery capacity prediction service
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "health" or "predict"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Health(HealthCommand),
    Predict(PredictCommand),
}

#[derive(FromArgs)]
/// Check that the service is running
#[argh(subcommand, name = "health")]
struct HealthCommand {}

#[derive(FromArgs)]
/// Request a capacity prediction
#[argh(subcommand, name = "predict")]
struct PredictCommand {
    /// the cycle index
    #[argh(option, short = 'c')]
    id_cycle: f64,

    /// the measured temperature
    #[argh(option, short = 't')]
    temperature: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Health(_) => {
            let response = client.get(format!("http://{}/", addr)).send().await?;
            let status = response.status();
            println!("{}: {}", status, response.text().await?);
        }
        ClientCommands::Predict(predict_command) => {
            let response = client
                .post(format!("http://{}/predict", addr))
                .json(&json!({
                    "id_cycle": predict_command.id_cycle,
                    "Temperature_measured": predict_command.temperature,
                }))
                .send()
                .await?;

            let result = response.json::<serde_json::Value>().await?;
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
