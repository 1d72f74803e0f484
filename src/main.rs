#[tokio::main]
async fn main() {
    if let Err(err) = opsbot::server::run_stdio().await {
        eprintln!("opsbot: {}", err);
        std::process::exit(1);
    }
}
