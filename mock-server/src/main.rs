use mock_server::ServerConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let models = std::env::var("MODELS").unwrap_or_else(|_| "Fruit,Basket".to_string());
    let mut config = ServerConfig::new(models.split(',').map(str::trim).filter(|m| !m.is_empty()));
    if let (Ok(username), Ok(password)) = (std::env::var("API_USERNAME"), std::env::var("API_PASSWORD")) {
        config = config.with_credentials(&username, &password);
    }

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, models = ?config.models, "listening");
    mock_server::run(listener, config).await
}
