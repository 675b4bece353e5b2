use std::{env, fs};

use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fido2_verify::{CredentialRequest, ExpectationsInput, Factor, Fido2, OptionsRequest};

/// A response captured from the browser together with what the server expected.
#[derive(Deserialize)]
struct Capture {
    request: CredentialRequest,
    expected: ExpectationsInput,
    #[serde(default = "default_factor")]
    factor: String,
}

fn default_factor() -> String {
    "either".to_string()
}

fn usage() -> ! {
    eprintln!("usage: demo-verify [options | attestation <capture.json> | assertion <capture.json>]");
    std::process::exit(2);
}

fn read_capture(path: &str) -> Result<(Capture, Factor), Box<dyn std::error::Error>> {
    let capture: Capture = serde_json::from_str(&fs::read_to_string(path)?)?;
    let factor = capture.factor.parse::<Factor>()?;
    Ok((capture, factor))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fido2_verify=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let fido2 = Fido2::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["options"] => {
            let request = OptionsRequest::default();
            println!(
                "{}",
                serde_json::to_string_pretty(&fido2.attestation_options(&request)?)?
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&fido2.assertion_options(&request)?)?
            );
        }
        ["attestation", path] => {
            let (capture, factor) = read_capture(path)?;
            let result = fido2.attestation_result(&capture.request, &capture.expected, factor)?;
            tracing::info!("Registration verified with '{}' attestation", result.fmt());
            println!("aaguid:     {}", result.aaguid().unwrap_or_default());
            println!("counter:    {}", result.counter());
            println!("public key:\n{}", result.credential_public_key_pem().unwrap_or_default());
            println!("audit:      {}", serde_json::to_string(&result.audit)?);
        }
        ["assertion", path] => {
            let (capture, factor) = read_capture(path)?;
            let result = fido2.assertion_result(&capture.request, &capture.expected, factor)?;
            tracing::info!("Authentication verified");
            println!("counter:    {}", result.counter());
            println!("flags:      {:?}", result.flags());
            println!("audit:      {}", serde_json::to_string(&result.audit)?);
        }
        _ => usage(),
    }
    Ok(())
}
