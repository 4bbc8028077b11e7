use feedeskd::{config::Config, logging, predictor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = Config::load();
    predictor::serve(config).await
}
