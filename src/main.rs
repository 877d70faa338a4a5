#[tokio::main]
async fn main() {
    let code = codeartifact_proxy_lib::run().await;
    std::process::exit(code);
}
