#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examchain::run().await {
        eprintln!("examchain fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
