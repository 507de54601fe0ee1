use aggbook::cli;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    cli::run().await
}
