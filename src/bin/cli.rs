use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    taalsync::cli::run().await
}
