#[tokio::main]
async fn main() {
    env_logger::init();
    let addr = std::env::var("SCENE_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:7878".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("bind server address");
    log::info!("scene-server listening on {addr}");
    axum::serve(listener, scene_server::app()).await.expect("serve");
}
