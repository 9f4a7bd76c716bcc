#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_engine::run().await {
        eprintln!("exam-engine fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
