use std::path::Path;
use std::process::Command;

use reel_models::Capability;
use reel_providers::{CredentialProvider, CredentialStore};
use reel_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;

    println!(
        "reel-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tool("ffmpeg")?;
    ensure_tool("ffprobe")?;

    let credentials = CredentialStore::from_env();
    for capability in Capability::ALL {
        let usable: Vec<&str> = capability
            .ranking()
            .iter()
            .filter(|p| credentials.has_credential(**p))
            .map(|p| p.as_str())
            .collect();
        if usable.is_empty() {
            println!("reel-selfcheck: {}: no usable provider", capability);
        } else {
            println!("reel-selfcheck: {}: {}", capability, usable.join(", "));
        }
    }

    println!("reel-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let marker = path.join(".selfcheck");
    tokio::fs::write(&marker, b"ok").await?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

fn ensure_tool(name: &str) -> anyhow::Result<()> {
    let output = Command::new(name)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            name,
            output.status
        ));
    }
    Ok(())
}
