fn main() {
    if let Err(err) = kotiakku_home_api::app::run_service() {
        eprintln!("service startup failed: {err}");
        std::process::exit(1);
    }
}
