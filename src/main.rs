fn main() {
    if let Err(e) = subscription_aggregator_lib::run() {
        eprintln!("アプリケーションの実行中にエラーが発生しました: {}", e.details());
        std::process::exit(1);
    }
}
