#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lumora_lib::run().await
}
