#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lib_summoner::init().await
}
