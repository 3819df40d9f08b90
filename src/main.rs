#[tokio::main]
async fn main() {
    if let Err(e) = arogya_lib::run().await {
        eprintln!("arogya: {e}");
        std::process::exit(1);
    }
}
