#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = attendease::run().await {
        eprintln!("attendease fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
