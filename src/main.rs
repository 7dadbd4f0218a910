use logfwd::cli::Cli;

#[tokio::main]
async fn main() {
    if let Err(e) = Cli::run().await {
        eprintln!("ERROR");
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
