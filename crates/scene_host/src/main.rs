//! Binary entry point for the scene host.

#[tokio::main]
async fn main() {
    if let Err(e) = lib_scene_host::init().await {
        eprintln!("❌ Fatal error: {e}");
        std::process::exit(1);
    }
}
